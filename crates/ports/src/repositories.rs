//! Run and Workflow Repository Ports

use async_trait::async_trait;
use ibai_core::{Run, RunId, WorkflowDefinition, WorkflowId};

/// Repository error types
#[derive(thiserror::Error, Debug)]
pub enum RepositoryError {
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Run repository port
#[async_trait]
pub trait RunRepository: Send + Sync {
    async fn save_run(&self, run: &Run) -> Result<(), RepositoryError>;

    async fn get_run(&self, id: &RunId) -> Result<Option<Run>, RepositoryError>;

    async fn get_runs_by_workflow(
        &self,
        workflow_id: &WorkflowId,
    ) -> Result<Vec<Run>, RepositoryError>;
}

/// Workflow repository port
#[async_trait]
pub trait WorkflowRepository: Send + Sync {
    async fn save_workflow(&self, workflow: &WorkflowDefinition) -> Result<(), RepositoryError>;

    async fn get_workflow(
        &self,
        id: &WorkflowId,
    ) -> Result<Option<WorkflowDefinition>, RepositoryError>;

    async fn get_all_workflows(&self) -> Result<Vec<WorkflowDefinition>, RepositoryError>;

    async fn delete_workflow(&self, id: &WorkflowId) -> Result<(), RepositoryError>;
}
