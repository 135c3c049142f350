//! Workflow Definition aggregate
//!
//! A workflow is a declarative job graph: jobs with `needs` dependency edges,
//! each job an ordered step sequence. Definitions are immutable once a run
//! starts; all static checks live in [`WorkflowDefinition::validate`].

use crate::trigger::TriggerSpec;
use crate::{DomainError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Workflow identifier - Value Object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkflowId(pub Uuid);

impl WorkflowId {
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

impl Default for WorkflowId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job identifier within a workflow - Value Object
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Built-in action names, implemented over the capability ports.
pub const ACTION_CACHE: &str = "cache";
pub const ACTION_UPLOAD_ARTIFACT: &str = "upload-artifact";
pub const ACTION_DOWNLOAD_ARTIFACT: &str = "download-artifact";

/// Output key set by the cache action: "true" on hit, "false" on miss.
pub const OUTPUT_CACHE_HIT: &str = "cache-hit";

pub fn is_builtin_action(name: &str) -> bool {
    matches!(
        name,
        ACTION_CACHE | ACTION_UPLOAD_ARTIFACT | ACTION_DOWNLOAD_ARTIFACT
    )
}

/// Declared input schema of a built-in action.
pub fn builtin_action_inputs(name: &str) -> Option<Vec<ActionInput>> {
    match name {
        ACTION_CACHE => Some(vec![
            ActionInput::required("path"),
            ActionInput::required("key-files"),
        ]),
        ACTION_UPLOAD_ARTIFACT | ACTION_DOWNLOAD_ARTIFACT => Some(vec![
            ActionInput::required("name"),
            ActionInput::required("path"),
        ]),
        _ => None,
    }
}

/// Step condition, evaluated against prior step outcomes in the same job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Condition {
    /// Run only when a prior step exposed the given output value,
    /// e.g. the cache step reported `cache-hit == "false"`.
    OutputEquals {
        step: String,
        output: String,
        value: String,
    },
    /// Run even after an earlier step failed the job.
    OnFailure,
}

/// One executable action within a job - Value Object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Step {
    /// Shell command executed in the job's environment.
    Command {
        name: String,
        run: String,
        #[serde(default)]
        env: HashMap<String, String>,
        #[serde(default)]
        condition: Option<Condition>,
        #[serde(default)]
        continue_on_error: bool,
    },
    /// Reference to a composite or built-in action with named inputs.
    Action {
        name: String,
        uses: String,
        #[serde(default)]
        with: HashMap<String, String>,
        #[serde(default)]
        condition: Option<Condition>,
        #[serde(default)]
        continue_on_error: bool,
    },
}

impl Step {
    pub fn command(name: impl Into<String>, run: impl Into<String>) -> Self {
        Self::Command {
            name: name.into(),
            run: run.into(),
            env: HashMap::new(),
            condition: None,
            continue_on_error: false,
        }
    }

    pub fn action(
        name: impl Into<String>,
        uses: impl Into<String>,
        with: Vec<(&str, &str)>,
    ) -> Self {
        Self::Action {
            name: name.into(),
            uses: uses.into(),
            with: with
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            condition: None,
            continue_on_error: false,
        }
    }

    pub fn with_condition(mut self, cond: Condition) -> Self {
        match &mut self {
            Self::Command { condition, .. } | Self::Action { condition, .. } => {
                *condition = Some(cond)
            }
        }
        self
    }

    /// Mark the step best-effort: its failure is recorded but never fails the job.
    pub fn best_effort(mut self) -> Self {
        match &mut self {
            Self::Command {
                continue_on_error, ..
            }
            | Self::Action {
                continue_on_error, ..
            } => *continue_on_error = true,
        }
        self
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Command { name, .. } | Self::Action { name, .. } => name,
        }
    }

    pub fn condition(&self) -> Option<&Condition> {
        match self {
            Self::Command { condition, .. } | Self::Action { condition, .. } => condition.as_ref(),
        }
    }

    pub fn continue_on_error(&self) -> bool {
        match self {
            Self::Command {
                continue_on_error, ..
            }
            | Self::Action {
                continue_on_error, ..
            } => *continue_on_error,
        }
    }
}

/// Declared input of a composite action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionInput {
    pub name: String,
    pub required: bool,
    pub default: Option<String>,
}

impl ActionInput {
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: true,
            default: None,
        }
    }

    pub fn optional(name: impl Into<String>, default: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: false,
            default: Some(default.into()),
        }
    }
}

/// Reusable named step sequence with an input schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeAction {
    pub name: String,
    pub description: Option<String>,
    pub inputs: Vec<ActionInput>,
    pub steps: Vec<Step>,
}

impl CompositeAction {
    pub fn new(name: impl Into<String>, inputs: Vec<ActionInput>, steps: Vec<Step>) -> Self {
        Self {
            name: name.into(),
            description: None,
            inputs,
            steps,
        }
    }
}

/// Environments a run is authorized to deploy to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    #[serde(default)]
    pub deploy_environments: Vec<String>,
}

/// Job within a workflow: dependency edges plus an ordered step sequence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    pub id: JobId,
    #[serde(default)]
    pub needs: Vec<JobId>,
    /// Execution environment descriptor, e.g. an OS image id.
    pub runs_on: String,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    pub steps: Vec<Step>,
}

impl JobSpec {
    pub fn new(id: impl Into<String>, runs_on: impl Into<String>) -> Self {
        Self {
            id: JobId::new(id),
            needs: vec![],
            runs_on: runs_on.into(),
            timeout_ms: None,
            env: HashMap::new(),
            steps: vec![],
        }
    }

    pub fn with_need(mut self, id: impl Into<String>) -> Self {
        self.needs.push(JobId::new(id));
        self
    }

    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

/// Workflow aggregate root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub id: WorkflowId,
    pub name: String,
    pub trigger: TriggerSpec,
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Secret names resolved once per run and injected into the environment.
    #[serde(default)]
    pub secrets: Vec<String>,
    #[serde(default)]
    pub permissions: Permissions,
    /// Workflow-scoped composite action registry, keyed by action name.
    #[serde(default)]
    pub actions: HashMap<String, CompositeAction>,
    pub jobs: Vec<JobSpec>,
    /// Keep run artifacts after the run completes.
    #[serde(default)]
    pub retain_artifacts: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl WorkflowDefinition {
    pub fn new(name: impl Into<String>, trigger: TriggerSpec, jobs: Vec<JobSpec>) -> Self {
        Self {
            id: WorkflowId::new(),
            name: name.into(),
            trigger,
            env: HashMap::new(),
            secrets: vec![],
            permissions: Permissions::default(),
            actions: HashMap::new(),
            jobs,
            retain_artifacts: false,
            created_at: chrono::Utc::now(),
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_secret(mut self, name: impl Into<String>) -> Self {
        self.secrets.push(name.into());
        self
    }

    pub fn with_permissions(mut self, permissions: Permissions) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn with_action(mut self, action: CompositeAction) -> Self {
        self.actions.insert(action.name.clone(), action);
        self
    }

    pub fn with_retained_artifacts(mut self) -> Self {
        self.retain_artifacts = true;
        self
    }

    pub fn job(&self, id: &JobId) -> Option<&JobSpec> {
        self.jobs.iter().find(|j| &j.id == id)
    }

    /// All jobs reachable through `needs` edges from the given job.
    pub fn transitive_needs(&self, id: &JobId) -> HashSet<JobId> {
        let mut seen = HashSet::new();
        let mut stack: Vec<JobId> = self
            .job(id)
            .map(|j| j.needs.clone())
            .unwrap_or_default();

        while let Some(dep) = stack.pop() {
            if seen.insert(dep.clone()) {
                if let Some(job) = self.job(&dep) {
                    stack.extend(job.needs.iter().cloned());
                }
            }
        }
        seen
    }

    /// Validate the definition. Every violation is a configuration error
    /// with a diagnostic pointing at the offending declaration.
    pub fn validate(&self) -> Result<()> {
        if self.jobs.is_empty() {
            return Err(DomainError::Configuration(format!(
                "workflow '{}' declares no jobs",
                self.name
            )));
        }

        self.trigger.validate()?;

        let mut ids = HashSet::new();
        for job in &self.jobs {
            if job.id.as_str().trim().is_empty() {
                return Err(DomainError::Configuration(
                    "job id must not be empty".to_string(),
                ));
            }
            if !ids.insert(job.id.clone()) {
                return Err(DomainError::Configuration(format!(
                    "duplicate job id '{}'",
                    job.id
                )));
            }
        }

        for job in &self.jobs {
            for dep in &job.needs {
                if dep == &job.id {
                    return Err(DomainError::Configuration(format!(
                        "job '{}' depends on itself",
                        job.id
                    )));
                }
                if !ids.contains(dep) {
                    return Err(DomainError::Configuration(format!(
                        "job '{}' needs undefined job '{}'",
                        job.id, dep
                    )));
                }
            }
        }

        self.check_acyclic()?;

        for job in &self.jobs {
            for step in &job.steps {
                self.validate_step(&job.id, step)?;
            }
        }

        for action in self.actions.values() {
            for step in &action.steps {
                if let Step::Action { uses, .. } = step {
                    if !is_builtin_action(uses) {
                        return Err(DomainError::Configuration(format!(
                            "composite action '{}' references '{}': composites may only invoke built-in actions",
                            action.name, uses
                        )));
                    }
                }
            }
        }

        self.check_artifact_ordering()?;

        Ok(())
    }

    fn validate_step(&self, job_id: &JobId, step: &Step) -> Result<()> {
        let Step::Action {
            name, uses, with, ..
        } = step
        else {
            return Ok(());
        };

        if let Some(inputs) = builtin_action_inputs(uses) {
            for input in &inputs {
                if input.required && input.default.is_none() && !with.contains_key(&input.name) {
                    return Err(DomainError::Configuration(format!(
                        "step '{}' in job '{}': built-in action '{}' requires input '{}'",
                        name, job_id, uses, input.name
                    )));
                }
            }
            return Ok(());
        }

        let Some(action) = self.actions.get(uses) else {
            return Err(DomainError::Configuration(format!(
                "step '{}' in job '{}' references unknown action '{}'",
                name, job_id, uses
            )));
        };

        for input in &action.inputs {
            if input.required && input.default.is_none() && !with.contains_key(&input.name) {
                return Err(DomainError::Configuration(format!(
                    "step '{}' in job '{}': action '{}' requires input '{}'",
                    name, job_id, uses, input.name
                )));
            }
        }
        Ok(())
    }

    /// DFS cycle check over the `needs` graph.
    fn check_acyclic(&self) -> Result<()> {
        fn visit(
            node: &JobId,
            workflow: &WorkflowDefinition,
            visited: &mut HashSet<JobId>,
            rec_stack: &mut Vec<JobId>,
        ) -> Result<()> {
            if rec_stack.contains(node) {
                let mut cycle: Vec<&str> = rec_stack.iter().map(|j| j.as_str()).collect();
                cycle.push(node.as_str());
                return Err(DomainError::Configuration(format!(
                    "cyclic `needs` dependency: {}",
                    cycle.join(" -> ")
                )));
            }
            if visited.contains(node) {
                return Ok(());
            }

            rec_stack.push(node.clone());
            if let Some(job) = workflow.job(node) {
                for dep in &job.needs {
                    visit(dep, workflow, visited, rec_stack)?;
                }
            }
            rec_stack.pop();
            visited.insert(node.clone());
            Ok(())
        }

        let mut visited = HashSet::new();
        for job in &self.jobs {
            visit(&job.id, self, &mut visited, &mut Vec::new())?;
        }
        Ok(())
    }

    /// Statically reject artifacts consumed with no producing transitive
    /// dependency. Only literal artifact names are checked here; names
    /// produced by input substitution surface as runtime failures instead.
    fn check_artifact_ordering(&self) -> Result<()> {
        let mut produced_by: HashMap<&str, Vec<&JobId>> = HashMap::new();
        for job in &self.jobs {
            for name in literal_artifact_names(&job.steps, ACTION_UPLOAD_ARTIFACT) {
                produced_by.entry(name).or_default().push(&job.id);
            }
        }

        for job in &self.jobs {
            let upstream = self.transitive_needs(&job.id);
            for name in literal_artifact_names(&job.steps, ACTION_DOWNLOAD_ARTIFACT) {
                let satisfied = produced_by
                    .get(name)
                    .map(|producers| producers.iter().any(|p| upstream.contains(p)))
                    .unwrap_or(false);
                if !satisfied {
                    return Err(DomainError::Configuration(format!(
                        "job '{}' downloads artifact '{}' but no job it needs uploads it",
                        job.id, name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Topologically partition jobs into levels. All jobs in a level are
    /// independent of each other and may run concurrently.
    pub fn execution_levels(&self) -> Result<Vec<Vec<JobId>>> {
        let mut indegree: HashMap<&JobId, usize> = self
            .jobs
            .iter()
            .map(|j| (&j.id, j.needs.len()))
            .collect();
        let mut dependents: HashMap<&JobId, Vec<&JobId>> = HashMap::new();
        for job in &self.jobs {
            for dep in &job.needs {
                dependents.entry(dep).or_default().push(&job.id);
            }
        }

        let mut levels: Vec<Vec<JobId>> = Vec::new();
        let mut ready: Vec<&JobId> = self
            .jobs
            .iter()
            .filter(|j| j.needs.is_empty())
            .map(|j| &j.id)
            .collect();
        let mut placed = 0usize;

        while !ready.is_empty() {
            let mut next: Vec<&JobId> = Vec::new();
            for id in &ready {
                if let Some(children) = dependents.get(*id) {
                    for child in children {
                        let count = indegree
                            .get_mut(*child)
                            .ok_or_else(|| {
                                DomainError::Configuration(format!("unknown job '{}'", child))
                            })?;
                        *count -= 1;
                        if *count == 0 {
                            next.push(*child);
                        }
                    }
                }
            }
            placed += ready.len();
            levels.push(ready.iter().map(|id| (*id).clone()).collect());
            ready = next;
        }

        if placed != self.jobs.len() {
            return Err(DomainError::Configuration(
                "cyclic `needs` dependency in workflow".to_string(),
            ));
        }
        Ok(levels)
    }
}

fn literal_artifact_names<'a>(steps: &'a [Step], action: &str) -> Vec<&'a str> {
    steps
        .iter()
        .filter_map(|step| match step {
            Step::Action { uses, with, .. } if uses.as_str() == action => with
                .get("name")
                .filter(|v| !v.contains("${{"))
                .map(|v| v.as_str()),
            _ => None,
        })
        .collect()
}
