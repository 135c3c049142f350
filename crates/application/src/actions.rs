//! Built-in actions
//!
//! The cache, artifact-upload and artifact-download steps are instances of
//! one capability interface: declared inputs plus execute-in-environment.
//! Each is backed by a port rather than hard-wired into the step runner.

use crate::context::RunContext;
use async_trait::async_trait;
use ibai_core::workflow::{ACTION_CACHE, ACTION_DOWNLOAD_ARTIFACT, ACTION_UPLOAD_ARTIFACT, OUTPUT_CACHE_HIT};
use ibai_core::{Artifact, Blob, CacheKey, DomainError, Result, StepOutcome};
use ibai_ports::{ArtifactStore, ArtifactStoreError, CacheStore, ExecutionEnvironment};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Cache save deferred until the job's last step completed successfully
#[derive(Debug, Clone)]
pub struct DeferredCacheSave {
    pub key: CacheKey,
    pub path: String,
}

/// Mutable per-step state a built-in action may touch
#[derive(Debug, Default)]
pub struct StepSideEffects {
    /// Outputs visible to later step conditions, e.g. `cache-hit`.
    pub outputs: HashMap<String, String>,
    pub deferred_cache_saves: Vec<DeferredCacheSave>,
    pub produced_artifacts: Vec<String>,
    pub log: Vec<String>,
}

/// One built-in action invocation
pub struct ActionInvocation<'a> {
    pub environment: &'a dyn ExecutionEnvironment,
    pub ctx: &'a RunContext,
    /// OS image id of the invoking job, part of the cache key.
    pub os_image: &'a str,
    pub inputs: HashMap<String, String>,
    pub effects: &'a mut StepSideEffects,
}

impl ActionInvocation<'_> {
    fn required_input(&self, name: &str) -> Result<&str> {
        self.inputs
            .get(name)
            .map(|v| v.as_str())
            .ok_or_else(|| {
                DomainError::Configuration(format!("built-in action requires input '{}'", name))
            })
    }
}

/// Capability interface shared by every built-in action
#[async_trait]
pub trait BuiltinAction: Send + Sync {
    fn name(&self) -> &'static str;

    async fn execute(&self, invocation: &mut ActionInvocation<'_>) -> Result<StepOutcome>;
}

/// Dependency cache restore with deferred save on miss
pub struct CacheAction {
    cache: Arc<dyn CacheStore>,
}

#[async_trait]
impl BuiltinAction for CacheAction {
    fn name(&self) -> &'static str {
        ACTION_CACHE
    }

    async fn execute(&self, invocation: &mut ActionInvocation<'_>) -> Result<StepOutcome> {
        let path = invocation.required_input("path")?.to_string();
        let key_files = invocation.required_input("key-files")?.to_string();

        // Hash the declared input files as they exist in the workspace.
        let mut inputs_blob = Blob::new();
        for file in key_files.split(',').map(|f| f.trim()).filter(|f| !f.is_empty()) {
            let snapshot = invocation
                .environment
                .snapshot_files(file)
                .await
                .map_err(|e| DomainError::Configuration(format!("cache key file: {}", e)))?;
            inputs_blob.merge_under(file, &snapshot);
        }

        let key = CacheKey::derive(
            &invocation.ctx.cache_scope(),
            invocation.os_image,
            &inputs_blob,
        );

        let hit = match self.cache.lookup(&key).await {
            Ok(found) => found,
            Err(e) => {
                // An unreachable cache degrades to a miss.
                warn!("cache lookup failed, treating as miss: {}", e);
                None
            }
        };

        match hit {
            Some(blob) => {
                invocation
                    .environment
                    .seed_files(&path, &blob)
                    .await
                    .map_err(|e| DomainError::Infrastructure(e.to_string()))?;
                invocation
                    .effects
                    .outputs
                    .insert(OUTPUT_CACHE_HIT.to_string(), "true".to_string());
                invocation
                    .effects
                    .log
                    .push(format!("cache restored: {}", key));
            }
            None => {
                invocation
                    .effects
                    .outputs
                    .insert(OUTPUT_CACHE_HIT.to_string(), "false".to_string());
                invocation
                    .effects
                    .deferred_cache_saves
                    .push(DeferredCacheSave { key: key.clone(), path });
                invocation.effects.log.push(format!("cache miss: {}", key));
            }
        }
        Ok(StepOutcome::Succeeded)
    }
}

/// Store a workspace directory as a run-scoped artifact
pub struct UploadArtifactAction {
    artifacts: Arc<dyn ArtifactStore>,
}

#[async_trait]
impl BuiltinAction for UploadArtifactAction {
    fn name(&self) -> &'static str {
        ACTION_UPLOAD_ARTIFACT
    }

    async fn execute(&self, invocation: &mut ActionInvocation<'_>) -> Result<StepOutcome> {
        let name = invocation.required_input("name")?.to_string();
        let path = invocation.required_input("path")?.to_string();

        let blob = invocation
            .environment
            .snapshot_files(&path)
            .await
            .map_err(|e| DomainError::Infrastructure(e.to_string()))?;

        let artifact = Artifact::new(name.clone(), blob);
        self.artifacts
            .put(&invocation.ctx.run_id, artifact)
            .await
            .map_err(|e| DomainError::Infrastructure(e.to_string()))?;

        info!(
            "uploaded artifact '{}' from '{}' (run {})",
            name, path, invocation.ctx.run_id
        );
        invocation.effects.produced_artifacts.push(name.clone());
        invocation
            .effects
            .log
            .push(format!("uploaded artifact '{}'", name));
        Ok(StepOutcome::Succeeded)
    }
}

/// Materialize an upstream job's artifact into the workspace
pub struct DownloadArtifactAction {
    artifacts: Arc<dyn ArtifactStore>,
}

#[async_trait]
impl BuiltinAction for DownloadArtifactAction {
    fn name(&self) -> &'static str {
        ACTION_DOWNLOAD_ARTIFACT
    }

    async fn execute(&self, invocation: &mut ActionInvocation<'_>) -> Result<StepOutcome> {
        let name = invocation.required_input("name")?.to_string();
        let path = invocation.required_input("path")?.to_string();

        let artifact = match self.artifacts.get(&invocation.ctx.run_id, &name).await {
            Ok(artifact) => artifact,
            Err(ArtifactStoreError::NotFound { .. }) => {
                // Ordering violation the static check could not see.
                return Err(DomainError::Configuration(format!(
                    "artifact '{}' consumed before it was produced",
                    name
                )));
            }
            Err(e) => return Err(DomainError::Infrastructure(e.to_string())),
        };

        invocation
            .environment
            .seed_files(&path, &artifact.blob)
            .await
            .map_err(|e| DomainError::Infrastructure(e.to_string()))?;

        invocation
            .effects
            .log
            .push(format!("downloaded artifact '{}' into '{}'", name, path));
        Ok(StepOutcome::Succeeded)
    }
}

/// Registry of built-in actions keyed by name
pub struct ActionRegistry {
    actions: HashMap<&'static str, Arc<dyn BuiltinAction>>,
}

impl ActionRegistry {
    pub fn new(cache: Arc<dyn CacheStore>, artifacts: Arc<dyn ArtifactStore>) -> Self {
        let mut actions: HashMap<&'static str, Arc<dyn BuiltinAction>> = HashMap::new();
        actions.insert(ACTION_CACHE, Arc::new(CacheAction { cache }));
        actions.insert(
            ACTION_UPLOAD_ARTIFACT,
            Arc::new(UploadArtifactAction {
                artifacts: artifacts.clone(),
            }),
        );
        actions.insert(
            ACTION_DOWNLOAD_ARTIFACT,
            Arc::new(DownloadArtifactAction { artifacts }),
        );
        Self { actions }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn BuiltinAction>> {
        self.actions.get(name).cloned()
    }
}
