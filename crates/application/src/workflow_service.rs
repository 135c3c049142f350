//! Workflow registry service
//!
//! Register, fetch, list and delete workflow definitions. Definitions are
//! validated on registration so a broken graph never reaches the engine.

use ibai_core::{DomainError, Result, WorkflowDefinition, WorkflowId};
use ibai_ports::{EventPublisher, SystemEvent, WorkflowRepository};
use std::sync::Arc;
use tracing::info;

/// Workflow registry service
pub struct WorkflowService<W, E>
where
    W: WorkflowRepository + Send + Sync,
    E: EventPublisher + Send + Sync,
{
    workflow_repo: Arc<W>,
    event_bus: Arc<E>,
}

impl<W, E> WorkflowService<W, E>
where
    W: WorkflowRepository + Send + Sync,
    E: EventPublisher + Send + Sync,
{
    pub fn new(workflow_repo: Arc<W>, event_bus: Arc<E>) -> Self {
        Self {
            workflow_repo,
            event_bus,
        }
    }

    /// Validate and persist a workflow definition.
    pub async fn register(&self, workflow: WorkflowDefinition) -> Result<WorkflowDefinition> {
        info!("registering workflow '{}'", workflow.name);
        workflow.validate()?;

        self.workflow_repo
            .save_workflow(&workflow)
            .await
            .map_err(|e| DomainError::Infrastructure(format!("failed to save workflow: {}", e)))?;

        self.event_bus
            .publish(SystemEvent::WorkflowRegistered {
                workflow_id: workflow.id,
            })
            .await
            .map_err(|e| DomainError::Infrastructure(format!("failed to publish event: {}", e)))?;

        info!("workflow registered: {}", workflow.id);
        Ok(workflow)
    }

    pub async fn get_workflow(&self, id: &WorkflowId) -> Result<Option<WorkflowDefinition>> {
        self.workflow_repo
            .get_workflow(id)
            .await
            .map_err(|e| DomainError::Infrastructure(format!("failed to get workflow: {}", e)))
    }

    pub async fn list_workflows(&self) -> Result<Vec<WorkflowDefinition>> {
        self.workflow_repo
            .get_all_workflows()
            .await
            .map_err(|e| DomainError::Infrastructure(format!("failed to list workflows: {}", e)))
    }

    pub async fn delete_workflow(&self, id: &WorkflowId) -> Result<()> {
        self.workflow_repo
            .delete_workflow(id)
            .await
            .map_err(|e| DomainError::Infrastructure(format!("failed to delete workflow: {}", e)))?;

        self.event_bus
            .publish(SystemEvent::WorkflowDeleted { workflow_id: *id })
            .await
            .map_err(|e| DomainError::Infrastructure(format!("failed to publish event: {}", e)))?;

        info!("workflow deleted: {}", id);
        Ok(())
    }
}
