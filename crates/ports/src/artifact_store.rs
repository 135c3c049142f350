//! Artifact Store Port
//!
//! Ephemeral, run-scoped key -> blob store used to pass build output between
//! jobs. Never shared across runs.

use async_trait::async_trait;
use ibai_core::{Artifact, RunId};

/// Artifact store error types
#[derive(thiserror::Error, Debug)]
pub enum ArtifactStoreError {
    /// The consuming job asked for an artifact no upstream job produced.
    #[error("artifact '{name}' not found in run {run}")]
    NotFound { run: RunId, name: String },

    #[error("internal error: {0}")]
    Internal(String),
}

/// Artifact store port
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn put(&self, run: &RunId, artifact: Artifact) -> Result<(), ArtifactStoreError>;

    async fn get(&self, run: &RunId, name: &str) -> Result<Artifact, ArtifactStoreError>;

    async fn list(&self, run: &RunId) -> Result<Vec<String>, ArtifactStoreError>;

    /// Drop every artifact of a run. Called at run completion unless the
    /// workflow retains its artifacts.
    async fn purge(&self, run: &RunId) -> Result<(), ArtifactStoreError>;
}
