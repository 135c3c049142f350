//! Cache key derivation
//!
//! Keys follow `scope:os:input-hash` where the hash covers the declared input
//! files. Exact-key matching only: a changed input hash always produces a new
//! key, never an overwrite.

use crate::blob::Blob;
use serde::{Deserialize, Serialize};

/// Repository + branch lineage a cache entry is shared across - Value Object
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheScope {
    pub repository: String,
    pub branch: String,
}

impl CacheScope {
    pub fn new(repository: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            branch: branch.into(),
        }
    }
}

impl std::fmt::Display for CacheScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.repository, self.branch)
    }
}

/// Content-derived cache key - Value Object
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    scope: String,
    os: String,
    input_hash: String,
}

impl CacheKey {
    /// Derive a key from the declared input files.
    pub fn derive(scope: &CacheScope, os: &str, inputs: &Blob) -> Self {
        Self {
            scope: scope.to_string(),
            os: os.to_string(),
            input_hash: inputs.content_hash().as_str().to_string(),
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn os(&self) -> &str {
        &self.os
    }

    pub fn input_hash(&self) -> &str {
        &self.input_hash
    }

    pub fn formatted(&self) -> String {
        format!("{}:{}:{}", self.scope, self.os, self.input_hash)
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.formatted())
    }
}
