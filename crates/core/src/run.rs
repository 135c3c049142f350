//! Run aggregate
//!
//! One instantiation of a workflow definition triggered by one event. The run
//! exclusively owns its per-job results; terminal run and job states stay
//! visible together with their full step-level reports.

use crate::event::Event;
use crate::workflow::{JobId, WorkflowDefinition, WorkflowId};
use crate::{DomainError, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Run identifier - Value Object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Run status - Value Object (Enum)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Job status - Value Object (Enum)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::Skipped => "SKIPPED",
            Self::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Failed | Self::Skipped | Self::Cancelled
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of a single executed step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepOutcome {
    Succeeded,
    Failed,
    Skipped,
}

impl StepOutcome {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::Skipped => "SKIPPED",
        }
    }
}

impl std::fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Step-level report kept on the job result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepReport {
    pub name: String,
    pub outcome: StepOutcome,
    pub exit_code: Option<i32>,
    pub log: Vec<String>,
    /// Failure of a best-effort step is recorded but never fails the job.
    pub best_effort: bool,
}

impl StepReport {
    pub fn new(name: impl Into<String>, outcome: StepOutcome) -> Self {
        Self {
            name: name.into(),
            outcome,
            exit_code: None,
            log: vec![],
            best_effort: false,
        }
    }

    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = Some(code);
        self
    }

    pub fn with_log(mut self, log: Vec<String>) -> Self {
        self.log = log;
        self
    }

    pub fn as_best_effort(mut self) -> Self {
        self.best_effort = true;
        self
    }
}

/// Per-job execution result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    pub job_id: JobId,
    pub status: JobStatus,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub steps: Vec<StepReport>,
    pub produced_artifacts: Vec<String>,
    pub produced_cache_keys: Vec<String>,
    /// Diagnostic pointing at the first failing step.
    pub failure: Option<String>,
}

impl JobResult {
    pub fn new(job_id: JobId) -> Self {
        Self {
            job_id,
            status: JobStatus::Pending,
            started_at: None,
            completed_at: None,
            steps: vec![],
            produced_artifacts: vec![],
            produced_cache_keys: vec![],
            failure: None,
        }
    }

    pub fn start(&mut self) {
        self.status = JobStatus::Running;
        self.started_at = Some(chrono::Utc::now());
    }

    pub fn succeed(&mut self) {
        self.status = JobStatus::Succeeded;
        self.completed_at = Some(chrono::Utc::now());
    }

    pub fn fail(&mut self, diagnostic: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.completed_at = Some(chrono::Utc::now());
        self.failure = Some(diagnostic.into());
    }

    pub fn skip(&mut self) {
        self.status = JobStatus::Skipped;
        self.completed_at = Some(chrono::Utc::now());
    }

    pub fn cancel(&mut self) {
        self.status = JobStatus::Cancelled;
        self.completed_at = Some(chrono::Utc::now());
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Run aggregate root
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: RunId,
    pub workflow_id: WorkflowId,
    pub event: Event,
    pub status: RunStatus,
    pub jobs: Vec<JobResult>,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Run {
    /// Create a pending run with one pending job result per workflow job.
    pub fn new(workflow: &WorkflowDefinition, event: Event) -> Self {
        Self {
            id: RunId::new(),
            workflow_id: workflow.id,
            event,
            status: RunStatus::Pending,
            jobs: workflow
                .jobs
                .iter()
                .map(|j| JobResult::new(j.id.clone()))
                .collect(),
            started_at: chrono::Utc::now(),
            completed_at: None,
        }
    }

    pub fn start(&mut self) -> Result<()> {
        if self.status != RunStatus::Pending {
            return Err(DomainError::invalid_state_transition(
                self.status.as_str(),
                RunStatus::Running.as_str(),
            ));
        }
        self.status = RunStatus::Running;
        Ok(())
    }

    /// Settle the run from its job results: failed if any job failed,
    /// succeeded once every job is terminal.
    pub fn finish(&mut self) -> Result<()> {
        if self.status.is_terminal() {
            return Err(DomainError::invalid_state_transition(
                self.status.as_str(),
                "terminal",
            ));
        }
        if let Some(open) = self.jobs.iter().find(|j| !j.is_terminal()) {
            return Err(DomainError::Validation(format!(
                "cannot finish run with non-terminal job '{}'",
                open.job_id
            )));
        }

        let any_failed = self.jobs.iter().any(|j| j.status == JobStatus::Failed);
        self.status = if any_failed {
            RunStatus::Failed
        } else {
            RunStatus::Succeeded
        };
        self.completed_at = Some(chrono::Utc::now());
        Ok(())
    }

    /// Cancel the run: every non-terminal job transitions to cancelled.
    pub fn cancel(&mut self) -> Result<()> {
        if self.status.is_terminal() {
            return Err(DomainError::invalid_state_transition(
                self.status.as_str(),
                RunStatus::Cancelled.as_str(),
            ));
        }
        for job in self.jobs.iter_mut().filter(|j| !j.is_terminal()) {
            job.cancel();
        }
        self.status = RunStatus::Cancelled;
        self.completed_at = Some(chrono::Utc::now());
        Ok(())
    }

    pub fn job_result(&self, id: &JobId) -> Option<&JobResult> {
        self.jobs.iter().find(|j| &j.job_id == id)
    }

    pub fn job_result_mut(&mut self, id: &JobId) -> Option<&mut JobResult> {
        self.jobs.iter_mut().find(|j| &j.job_id == id)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn duration(&self) -> Option<chrono::Duration> {
        self.completed_at.map(|done| done - self.started_at)
    }
}
