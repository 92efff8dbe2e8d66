//! Worker-side cache of recently trained parameters

use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, warn};

struct CacheEntry {
    blob: Vec<u8>,
    last_used: u64,
}

struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    total_size: u64,
    /// Monotonic access counter; larger means more recently used
    tick: u64,
}

/// Bounded in-memory byte cache keyed by params id
///
/// Backs `to_cache_params` proposals and the LOCAL_RECENT fast path: a hit
/// skips the param store round trip. Evicts least-recently-used entries by
/// total size.
pub struct ParamCache {
    /// Maximum total size in bytes
    max_size: u64,
    inner: RwLock<CacheInner>,
}

impl ParamCache {
    /// Create a cache bounded at `max_size` bytes.
    pub fn new(max_size: u64) -> Self {
        Self {
            max_size,
            inner: RwLock::new(CacheInner {
                entries: HashMap::new(),
                total_size: 0,
                tick: 0,
            }),
        }
    }

    /// Insert a blob under `params_id`, evicting least-recently-used entries
    /// until it fits. Blobs larger than the whole cache are not kept.
    pub async fn put(&self, params_id: &str, blob: Vec<u8>) {
        let size = blob.len() as u64;
        if size > self.max_size {
            debug!(
                params_id = params_id,
                size = size,
                "Params blob exceeds cache capacity, not caching"
            );
            return;
        }

        let mut inner = self.inner.write().await;

        if let Some(old) = inner.entries.remove(params_id) {
            inner.total_size -= old.blob.len() as u64;
        }

        while inner.total_size + size > self.max_size {
            let oldest = inner
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(id, _)| id.clone());
            match oldest {
                Some(id) => {
                    if let Some(evicted) = inner.entries.remove(&id) {
                        inner.total_size -= evicted.blob.len() as u64;
                        warn!(params_id = %id, "Evicting params from cache (LRU)");
                    }
                }
                None => break,
            }
        }

        inner.tick += 1;
        let last_used = inner.tick;
        inner.total_size += size;
        inner
            .entries
            .insert(params_id.to_string(), CacheEntry { blob, last_used });

        debug!(params_id = params_id, size = size, "Cached params");
    }

    /// Fetch a blob by id, marking it most recently used.
    pub async fn get(&self, params_id: &str) -> Option<Vec<u8>> {
        let mut inner = self.inner.write().await;
        inner.tick += 1;
        let tick = inner.tick;
        if let Some(entry) = inner.entries.get_mut(params_id) {
            entry.last_used = tick;
            Some(entry.blob.clone())
        } else {
            None
        }
    }

    /// Whether `params_id` is currently cached. Does not affect recency.
    pub async fn contains(&self, params_id: &str) -> bool {
        self.inner.read().await.entries.contains_key(params_id)
    }

    /// Get cache statistics
    pub async fn stats(&self) -> CacheStats {
        let inner = self.inner.read().await;
        CacheStats {
            total_size: inner.total_size,
            max_size: self.max_size,
            entry_count: inner.entries.len(),
            utilization: if self.max_size == 0 {
                0.0
            } else {
                (inner.total_size as f64 / self.max_size as f64) * 100.0
            },
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    /// Current total size in bytes
    pub total_size: u64,
    /// Maximum cache size in bytes
    pub max_size: u64,
    /// Number of cached blobs
    pub entry_count: usize,
    /// Cache utilization percentage
    pub utilization: f64,
}
