//! # Cache System
//!
//! Flat-directory, content-addressed file cache for fetched videos.
//! Committed entries are named `<hex-digest>.mp4`; in-progress downloads
//! live next to them under a `.part` suffix and only ever become visible
//! under the canonical name through an atomic rename.

pub mod key;
pub mod store;

pub use key::derive_key;
pub use store::CacheStore;
