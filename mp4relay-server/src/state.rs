use std::sync::Arc;

use mp4relay_engine::{CacheStore, KeyLocks, OriginFetcher};

use crate::config::ServerConfig;

/// Shared per-request state handed to the handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<CacheStore>,
    pub fetcher: OriginFetcher,
    pub locks: Arc<KeyLocks>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(store: CacheStore, fetcher: OriginFetcher, config: ServerConfig) -> Self {
        Self {
            store: Arc::new(store),
            fetcher,
            locks: Arc::new(KeyLocks::new()),
            config: Arc::new(config),
        }
    }
}
