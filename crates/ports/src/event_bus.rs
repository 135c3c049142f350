//! Event Bus Port - in-memory event communication
//!
//! Every observable state change of the orchestrator is published here so
//! that terminal run and job states stay visible to the embedding host.

use async_trait::async_trait;
use ibai_core::{GateStatus, JobId, JobStatus, RunId, RunStatus, StepOutcome, WorkflowId};

/// System events emitted by the orchestration services
#[derive(Debug, Clone)]
pub enum SystemEvent {
    /// Workflow definition registered
    WorkflowRegistered { workflow_id: WorkflowId },

    /// Workflow definition deleted
    WorkflowDeleted { workflow_id: WorkflowId },

    /// Trigger accepted an event and a run was created
    RunAccepted {
        run_id: RunId,
        workflow_id: WorkflowId,
    },

    /// Run moved to running
    RunStarted { run_id: RunId },

    /// Run reached a terminal state
    RunCompleted { run_id: RunId, status: RunStatus },

    /// Job moved to running
    JobStarted { run_id: RunId, job_id: JobId },

    /// Job reached a terminal state
    JobCompleted {
        run_id: RunId,
        job_id: JobId,
        status: JobStatus,
    },

    /// A step finished inside a job
    StepFinished {
        run_id: RunId,
        job_id: JobId,
        step: String,
        outcome: StepOutcome,
    },

    /// An artifact was stored for a run
    ArtifactStored { run_id: RunId, name: String },

    /// A cache entry was written
    CacheStored { key: String },

    /// A deployment was published (or reused for identical content)
    DeploymentPublished {
        environment: String,
        url: String,
        reused: bool,
    },

    /// A quality gate verdict was posted to a change request
    QualityGateReported {
        change_request: u64,
        status: GateStatus,
    },
}

/// Event bus error types
#[derive(thiserror::Error, Debug)]
pub enum EventBusError {
    #[error("Bus full (capacity: {0})")]
    Full(usize),

    #[error("Subscriber dropped")]
    Dropped,

    #[error("Channel closed")]
    Closed,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Event publisher port
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: SystemEvent) -> Result<(), EventBusError>;

    async fn publish_batch(&self, events: Vec<SystemEvent>) -> Result<(), EventBusError> {
        for event in events {
            self.publish(event).await?;
        }
        Ok(())
    }
}

/// Event receiver wrapper
#[derive(Debug)]
pub struct EventReceiver {
    pub receiver: tokio::sync::broadcast::Receiver<SystemEvent>,
}

impl EventReceiver {
    pub async fn recv(&mut self) -> Result<SystemEvent, EventBusError> {
        self.receiver
            .recv()
            .await
            .map_err(|_| EventBusError::Dropped)
    }

    pub fn try_recv(&mut self) -> Result<SystemEvent, EventBusError> {
        self.receiver.try_recv().map_err(|_| EventBusError::Dropped)
    }
}

/// Event subscriber port
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    async fn subscribe(&self) -> Result<EventReceiver, EventBusError>;
}
