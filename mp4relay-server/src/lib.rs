//! # mp4relay-server
//!
//! HTTP front end for the mp4relay engine: a single GET endpoint that
//! validates the request, consults the on-disk cache and either streams
//! the cached entry (range-aware) or fetches from the origin while
//! relaying and caching in one pass.

pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;
