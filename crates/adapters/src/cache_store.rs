//! LRU cache store adapter
//!
//! Key -> blob store with a byte-size budget. Entries are immutable once
//! written; least-recently-used entries are evicted once the budget is
//! exceeded.

use async_trait::async_trait;
use ibai_core::{Blob, CacheKey};
use ibai_ports::{CacheStore, CacheStoreError};
use lru::LruCache;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

struct Inner {
    entries: LruCache<String, Blob>,
    total_bytes: u64,
}

/// In-memory cache store with LRU eviction beyond a byte budget
pub struct LruCacheStore {
    inner: Arc<Mutex<Inner>>,
    size_budget_bytes: u64,
}

impl LruCacheStore {
    pub fn new(size_budget_bytes: u64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                entries: LruCache::unbounded(),
                total_bytes: 0,
            })),
            size_budget_bytes,
        }
    }

    pub fn size_budget_bytes(&self) -> u64 {
        self.size_budget_bytes
    }

    /// Current number of entries, for tests and diagnostics.
    pub async fn entry_count(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    pub async fn total_bytes(&self) -> u64 {
        self.inner.lock().await.total_bytes
    }
}

#[async_trait]
impl CacheStore for LruCacheStore {
    async fn lookup(&self, key: &CacheKey) -> Result<Option<Blob>, CacheStoreError> {
        let mut inner = self.inner.lock().await;
        Ok(inner.entries.get(&key.formatted()).cloned())
    }

    async fn store(&self, key: &CacheKey, blob: Blob) -> Result<(), CacheStoreError> {
        let formatted = key.formatted();
        let mut inner = self.inner.lock().await;

        // Immutable once written; concurrent stores under one key are
        // idempotent, content assumed identical when keys match.
        if inner.entries.contains(&formatted) {
            debug!("cache key already present, keeping existing entry: {}", formatted);
            return Ok(());
        }

        let size = blob.byte_size();
        inner.entries.push(formatted.clone(), blob);
        inner.total_bytes += size;

        while inner.total_bytes > self.size_budget_bytes && inner.entries.len() > 1 {
            if let Some((evicted_key, evicted)) = inner.entries.pop_lru() {
                inner.total_bytes -= evicted.byte_size();
                warn!("evicted cache entry beyond size budget: {}", evicted_key);
            } else {
                break;
            }
        }

        debug!(
            "stored cache entry {} ({} bytes, {} total)",
            formatted, size, inner.total_bytes
        );
        Ok(())
    }
}
