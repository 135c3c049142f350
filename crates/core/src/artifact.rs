//! Run-scoped artifacts
//!
//! An artifact is build output passed between jobs of the same run. It is
//! created by one job, consumed by zero or more downstream jobs, and
//! destroyed at run completion unless the workflow retains it.

use crate::blob::{Blob, ContentHash};
use serde::{Deserialize, Serialize};

/// Named directory snapshot scoped to a single run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub name: String,
    pub blob: Blob,
}

impl Artifact {
    pub fn new(name: impl Into<String>, blob: Blob) -> Self {
        Self {
            name: name.into(),
            blob,
        }
    }

    pub fn content_hash(&self) -> ContentHash {
        self.blob.content_hash()
    }

    pub fn byte_size(&self) -> u64 {
        self.blob.byte_size()
    }
}
