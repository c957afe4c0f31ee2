//! # mp4relay-engine
//!
//! The cache-and-stream engine behind the mp4relay proxy server.
//! A requested video is either streamed straight from a flat on-disk
//! cache (with byte-range support) or fetched from its origin while the
//! bytes are simultaneously relayed to the client and persisted for
//! future requests.
//!
//! ## Features
//!
//! - Content-addressed cache keys (SHA-256 of the source URL)
//! - Atomic staging-file commit, completeness-gated
//! - Least-recently-touched eviction bounded by a byte cap
//! - Fetch-while-relay streaming that survives client disconnects
//! - Per-key single-flight coordination for concurrent cache misses

pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod range;
pub mod singleflight;
pub mod stream;

pub use cache::key::derive_key;
pub use cache::store::CacheStore;
pub use config::FetcherConfig;
pub use error::RelayError;
pub use fetch::{OriginFetcher, OriginResponse, create_client};
pub use range::{RangeError, ServingWindow, resolve_window};
pub use singleflight::KeyLocks;
pub use stream::{CHUNK_SIZE, stream_entry};
