//! Domain Core - Business Logic and Shared Types
//!
//! This crate contains the domain entities, value objects and pure domain
//! services of the workflow orchestration core. It performs no IO.

pub mod artifact;
pub mod blob;
pub mod cache;
pub mod deployment;
pub mod error;
pub mod event;
pub mod quality;
pub mod run;
pub mod trigger;
pub mod workflow;

pub use crate::error::DomainError;
pub use chrono::{DateTime, Utc};
pub use uuid::Uuid;

// Re-export all types for easy importing
pub use crate::artifact::Artifact;
pub use crate::blob::{Blob, ContentHash};
pub use crate::cache::{CacheKey, CacheScope};
pub use crate::deployment::{DeploymentRecord, EnvironmentName, RunAuthorization};
pub use crate::event::{ChangeRequestId, Event, EventKind};
pub use crate::quality::{Finding, GateStatus, Report, Severity};
pub use crate::run::{JobResult, JobStatus, Run, RunId, RunStatus, StepOutcome, StepReport};
pub use crate::trigger::{TriggerDecision, TriggerEvaluator, TriggerRejection, TriggerSpec};
pub use crate::workflow::{
    ActionInput, CompositeAction, Condition, JobId, JobSpec, Permissions, Step,
    WorkflowDefinition, WorkflowId,
};

// Domain result type
pub type Result<T> = std::result::Result<T, DomainError>;
