//! In-Memory Repository Implementations

use async_trait::async_trait;
use ibai_core::{Run, RunId, WorkflowDefinition, WorkflowId};
use ibai_ports::{RepositoryError, RunRepository, WorkflowRepository};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory run repository
pub struct InMemoryRunRepository {
    runs: Arc<RwLock<HashMap<RunId, Run>>>,
}

impl InMemoryRunRepository {
    pub fn new() -> Self {
        Self {
            runs: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryRunRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RunRepository for InMemoryRunRepository {
    async fn save_run(&self, run: &Run) -> Result<(), RepositoryError> {
        self.runs.write().await.insert(run.id, run.clone());
        Ok(())
    }

    async fn get_run(&self, id: &RunId) -> Result<Option<Run>, RepositoryError> {
        Ok(self.runs.read().await.get(id).cloned())
    }

    async fn get_runs_by_workflow(
        &self,
        workflow_id: &WorkflowId,
    ) -> Result<Vec<Run>, RepositoryError> {
        Ok(self
            .runs
            .read()
            .await
            .values()
            .filter(|r| &r.workflow_id == workflow_id)
            .cloned()
            .collect())
    }
}

/// In-memory workflow repository
pub struct InMemoryWorkflowRepository {
    workflows: Arc<RwLock<HashMap<WorkflowId, WorkflowDefinition>>>,
}

impl InMemoryWorkflowRepository {
    pub fn new() -> Self {
        Self {
            workflows: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryWorkflowRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkflowRepository for InMemoryWorkflowRepository {
    async fn save_workflow(&self, workflow: &WorkflowDefinition) -> Result<(), RepositoryError> {
        self.workflows
            .write()
            .await
            .insert(workflow.id, workflow.clone());
        Ok(())
    }

    async fn get_workflow(
        &self,
        id: &WorkflowId,
    ) -> Result<Option<WorkflowDefinition>, RepositoryError> {
        Ok(self.workflows.read().await.get(id).cloned())
    }

    async fn get_all_workflows(&self) -> Result<Vec<WorkflowDefinition>, RepositoryError> {
        Ok(self.workflows.read().await.values().cloned().collect())
    }

    async fn delete_workflow(&self, id: &WorkflowId) -> Result<(), RepositoryError> {
        self.workflows.write().await.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ibai_core::trigger::TriggerSpec;
    use ibai_core::workflow::{JobSpec, Step};
    use ibai_core::{Event, EventKind};

    fn workflow() -> WorkflowDefinition {
        WorkflowDefinition::new(
            "ci",
            TriggerSpec::new(),
            vec![JobSpec::new("test", "ubuntu-24.04").with_step(Step::command("t", "true"))],
        )
    }

    #[tokio::test]
    async fn test_run_round_trip() {
        let repo = InMemoryRunRepository::new();
        let workflow = workflow();
        let run = Run::new(&workflow, Event::new(EventKind::Push, "acme/site", "main"));

        repo.save_run(&run).await.unwrap();
        let loaded = repo.get_run(&run.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, run.id);

        let by_workflow = repo.get_runs_by_workflow(&workflow.id).await.unwrap();
        assert_eq!(by_workflow.len(), 1);
    }

    #[tokio::test]
    async fn test_workflow_round_trip_and_delete() {
        let repo = InMemoryWorkflowRepository::new();
        let workflow = workflow();

        repo.save_workflow(&workflow).await.unwrap();
        assert!(repo.get_workflow(&workflow.id).await.unwrap().is_some());
        assert_eq!(repo.get_all_workflows().await.unwrap().len(), 1);

        repo.delete_workflow(&workflow.id).await.unwrap();
        assert!(repo.get_workflow(&workflow.id).await.unwrap().is_none());
    }
}
