//! # Per-key Fetch Coordination
//!
//! Concurrent cache misses for the same URL must not race each other's
//! staging files. Each key hands out one async mutex; misses for that
//! key serialize, and the loser re-checks the cache after acquiring the
//! lock so it is normally served as a hit.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;

/// Map of cache key to its in-flight fetch lock.
///
/// Locks are held through `Arc`s and tracked here as `Weak`s, so a key
/// with no active or waiting fetch costs nothing but a map slot, and
/// dead slots are pruned as the map is used.
#[derive(Debug, Default)]
pub struct KeyLocks {
    inner: Mutex<HashMap<String, Weak<AsyncMutex<()>>>>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the lock for a key, creating it if no fetch is in flight.
    ///
    /// The caller holds the returned `Arc` (and usually its guard) for
    /// the duration of the fetch.
    pub fn lock_for(&self, key: &str) -> Arc<AsyncMutex<()>> {
        let mut map = self.inner.lock();
        map.retain(|_, weak| weak.strong_count() > 0);

        if let Some(existing) = map.get(key).and_then(Weak::upgrade) {
            return existing;
        }

        let fresh = Arc::new(AsyncMutex::new(()));
        map.insert(key.to_string(), Arc::downgrade(&fresh));
        fresh
    }

    #[cfg(test)]
    fn live_count(&self) -> usize {
        let mut map = self.inner.lock();
        map.retain(|_, weak| weak.strong_count() > 0);
        map.len()
    }
}
