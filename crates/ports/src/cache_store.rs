//! Cache Store Port
//!
//! Content-addressed key -> blob store shared read-only across runs matching
//! the same scope. A miss is a normal control-flow branch, not an error.

use async_trait::async_trait;
use ibai_core::{Blob, CacheKey};

/// Cache store error types
#[derive(thiserror::Error, Debug)]
pub enum CacheStoreError {
    #[error("cache store unavailable: {0}")]
    Unavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Cache store port
///
/// Entries are immutable once written under a given key; concurrent stores
/// under the same key are idempotent.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Exact-key lookup. `None` is a miss; no partial or fuzzy matching.
    async fn lookup(&self, key: &CacheKey) -> Result<Option<Blob>, CacheStoreError>;

    /// Store a blob under a key. A second store under an existing key is a
    /// no-op (content is assumed identical when keys match).
    async fn store(&self, key: &CacheKey, blob: Blob) -> Result<(), CacheStoreError>;
}
