//! Run context
//!
//! Per-run configuration resolved once at submission time and threaded
//! through the job graph engine and step runner: no ambient globals. Secrets
//! are resolved here and live only as entries of the run's environment map.

use ibai_core::deployment::RunAuthorization;
use ibai_core::{CacheScope, DomainError, Event, Result, RunId, WorkflowDefinition};
use ibai_ports::SecretStore;
use std::collections::HashMap;
use std::sync::Arc;

/// Immutable per-run execution context
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: RunId,
    pub repository: String,
    pub branch: String,
    /// Workflow environment with resolved secrets merged in.
    pub env: HashMap<String, String>,
    pub authorization: RunAuthorization,
}

impl RunContext {
    /// Resolve a context for one run: workflow env plus secrets, resolved
    /// exactly once. A missing secret fails run creation.
    pub async fn resolve(
        run_id: RunId,
        workflow: &WorkflowDefinition,
        event: &Event,
        secret_store: &Arc<dyn SecretStore>,
    ) -> Result<Self> {
        let mut env = workflow.env.clone();

        let secrets = secret_store
            .resolve(&workflow.secrets)
            .await
            .map_err(|e| DomainError::Configuration(format!("secret resolution failed: {}", e)))?;
        for (name, value) in secrets {
            env.insert(name, value.expose().to_string());
        }

        Ok(Self {
            run_id,
            repository: event.repository.clone(),
            branch: event.branch().to_string(),
            env,
            authorization: RunAuthorization::from_permissions(&workflow.permissions),
        })
    }

    /// Cache scope of this run: repository plus branch lineage.
    pub fn cache_scope(&self) -> CacheScope {
        CacheScope::new(self.repository.clone(), self.branch.clone())
    }
}
