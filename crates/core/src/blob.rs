//! Directory snapshot blobs and content hashing
//!
//! A [`Blob`] is the unit of data moved through the cache store, the artifact
//! store and the publish target: a deterministic snapshot of a directory tree
//! as sorted relative paths mapped to file contents.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Hex-encoded SHA-256 content hash - Value Object
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(String);

impl ContentHash {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix used in URLs and log lines.
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Deterministic directory snapshot: sorted relative path -> file bytes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blob {
    files: BTreeMap<String, Vec<u8>>,
}

impl Blob {
    pub fn new() -> Self {
        Self {
            files: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.files.insert(path.into(), bytes.into());
    }

    pub fn with_file(mut self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(path, bytes);
        self
    }

    pub fn file(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(|b| b.as_slice())
    }

    pub fn files(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.files.iter().map(|(p, b)| (p.as_str(), b.as_slice()))
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(|p| p.as_str())
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Total payload size in bytes, used by the cache store's size budget.
    pub fn byte_size(&self) -> u64 {
        self.files.values().map(|b| b.len() as u64).sum()
    }

    /// Merge another snapshot under a path prefix.
    pub fn merge_under(&mut self, prefix: &str, other: &Blob) {
        for (path, bytes) in other.files() {
            let merged = if prefix.is_empty() {
                path.to_string()
            } else {
                format!("{}/{}", prefix.trim_end_matches('/'), path)
            };
            self.files.insert(merged, bytes.to_vec());
        }
    }

    /// Content hash over the sorted (path, bytes) sequence.
    ///
    /// Identical trees always hash identically regardless of insertion order.
    pub fn content_hash(&self) -> ContentHash {
        let mut hasher = Sha256::new();
        for (path, bytes) in &self.files {
            hasher.update(path.as_bytes());
            hasher.update([0u8]);
            hasher.update((bytes.len() as u64).to_le_bytes());
            hasher.update(bytes);
        }
        ContentHash(hex::encode(hasher.finalize()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_is_order_independent() {
        let mut a = Blob::new();
        a.insert("src/main.rs", b"fn main() {}".to_vec());
        a.insert("Cargo.toml", b"[package]".to_vec());

        let mut b = Blob::new();
        b.insert("Cargo.toml", b"[package]".to_vec());
        b.insert("src/main.rs", b"fn main() {}".to_vec());

        assert_eq!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn test_content_hash_changes_with_content() {
        let a = Blob::new().with_file("index.html", b"v1".to_vec());
        let b = Blob::new().with_file("index.html", b"v2".to_vec());
        assert_ne!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn test_byte_size() {
        let blob = Blob::new()
            .with_file("a", vec![0u8; 10])
            .with_file("b", vec![0u8; 22]);
        assert_eq!(blob.byte_size(), 32);
    }

    #[test]
    fn test_merge_under_prefix() {
        let inner = Blob::new().with_file("dep.txt", b"1.0.0".to_vec());
        let mut outer = Blob::new();
        outer.merge_under("node_modules", &inner);

        assert!(outer.file("node_modules/dep.txt").is_some());
    }
}
