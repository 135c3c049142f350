//! In-memory artifact store adapter
//!
//! Strictly run-scoped: two jobs of the same run referencing one name see the
//! same blob; nothing is visible across runs.

use async_trait::async_trait;
use ibai_core::{Artifact, RunId};
use ibai_ports::{ArtifactStore, ArtifactStoreError};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// In-memory artifact store
pub struct InMemoryArtifactStore {
    artifacts: Arc<RwLock<HashMap<RunId, HashMap<String, Artifact>>>>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self {
            artifacts: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryArtifactStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn put(&self, run: &RunId, artifact: Artifact) -> Result<(), ArtifactStoreError> {
        debug!("storing artifact '{}' for run {}", artifact.name, run);
        self.artifacts
            .write()
            .await
            .entry(*run)
            .or_default()
            .insert(artifact.name.clone(), artifact);
        Ok(())
    }

    async fn get(&self, run: &RunId, name: &str) -> Result<Artifact, ArtifactStoreError> {
        self.artifacts
            .read()
            .await
            .get(run)
            .and_then(|scope| scope.get(name))
            .cloned()
            .ok_or_else(|| ArtifactStoreError::NotFound {
                run: *run,
                name: name.to_string(),
            })
    }

    async fn list(&self, run: &RunId) -> Result<Vec<String>, ArtifactStoreError> {
        let mut names: Vec<String> = self
            .artifacts
            .read()
            .await
            .get(run)
            .map(|scope| scope.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        Ok(names)
    }

    async fn purge(&self, run: &RunId) -> Result<(), ArtifactStoreError> {
        if self.artifacts.write().await.remove(run).is_some() {
            debug!("purged artifacts of run {}", run);
        }
        Ok(())
    }
}
