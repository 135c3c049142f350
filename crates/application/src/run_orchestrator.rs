//! Run Orchestrator
//!
//! The job graph engine: validates a workflow definition, evaluates its
//! trigger against the inbound event, and drives one run to a terminal state.
//! Jobs whose dependencies succeeded launch concurrently; failure propagates
//! forward as skips; cancellation abandons in-flight environments.

use crate::context::RunContext;
use crate::step_runner::{JobExecution, StepRunner};
use ibai_core::trigger::{TriggerDecision, TriggerEvaluator, TriggerRejection};
use ibai_core::{
    DomainError, Event, JobId, JobStatus, Result, Run, RunId, WorkflowDefinition, WorkflowId,
};
use ibai_ports::{
    ArtifactStore, CacheStore, EnvironmentProvisioner, EventPublisher, RunRepository, SecretStore,
    SystemEvent,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Configuration for the run orchestrator
#[derive(Debug, Clone)]
pub struct RunOrchestratorConfig {
    pub max_concurrent_jobs: usize,
    pub default_job_timeout_ms: u64,
}

impl Default for RunOrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 8,
            default_job_timeout_ms: 3_600_000,
        }
    }
}

/// Outcome of submitting an event against a workflow
#[derive(Debug)]
pub enum RunSubmission {
    /// A run was created and is executing in the background.
    Accepted { run_id: RunId },
    /// The trigger filter rejected the event; no run exists.
    Rejected { reason: TriggerRejection },
}

/// Run Orchestrator service
pub struct RunOrchestrator<R, E, P>
where
    R: RunRepository + Send + Sync + 'static,
    E: EventPublisher + Send + Sync + 'static,
    P: EnvironmentProvisioner + Send + Sync + 'static,
{
    run_repo: Arc<R>,
    event_bus: Arc<E>,
    provisioner: Arc<P>,
    secret_store: Arc<dyn SecretStore>,
    artifact_store: Arc<dyn ArtifactStore>,
    step_runner: Arc<StepRunner>,
    config: RunOrchestratorConfig,
    job_semaphore: Arc<Semaphore>,
    cancellations: Arc<Mutex<HashMap<RunId, watch::Sender<bool>>>>,
}

impl<R, E, P> RunOrchestrator<R, E, P>
where
    R: RunRepository + Send + Sync + 'static,
    E: EventPublisher + Send + Sync + 'static,
    P: EnvironmentProvisioner + Send + Sync + 'static,
{
    pub fn new(
        run_repo: Arc<R>,
        event_bus: Arc<E>,
        provisioner: Arc<P>,
        secret_store: Arc<dyn SecretStore>,
        cache_store: Arc<dyn CacheStore>,
        artifact_store: Arc<dyn ArtifactStore>,
        config: RunOrchestratorConfig,
    ) -> Self {
        let step_runner = Arc::new(StepRunner::new(cache_store, artifact_store.clone()));
        Self {
            run_repo,
            event_bus,
            provisioner,
            secret_store,
            artifact_store,
            step_runner,
            job_semaphore: Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1))),
            config,
            cancellations: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Evaluate the trigger and, when accepted, create and execute a run.
    ///
    /// A trigger rejection is a normal outcome, not an error; the run is
    /// simply never created.
    pub async fn submit(
        &self,
        workflow: WorkflowDefinition,
        event: Event,
    ) -> Result<RunSubmission> {
        match TriggerEvaluator::evaluate(&workflow.trigger, &event) {
            TriggerDecision::Rejected(reason) => {
                info!(
                    "event {} on '{}' rejected for workflow '{}': {}",
                    event.kind, event.ref_name, workflow.name, reason
                );
                return Ok(RunSubmission::Rejected { reason });
            }
            TriggerDecision::Accepted => {}
        }

        workflow.validate()?;

        let run = Run::new(&workflow, event.clone());
        let run_id = run.id;
        let ctx = RunContext::resolve(run_id, &workflow, &event, &self.secret_store).await?;

        self.run_repo
            .save_run(&run)
            .await
            .map_err(|e| DomainError::Infrastructure(format!("failed to save run: {}", e)))?;
        self.event_bus
            .publish(SystemEvent::RunAccepted {
                run_id,
                workflow_id: workflow.id,
            })
            .await
            .map_err(|e| DomainError::Infrastructure(format!("failed to publish event: {}", e)))?;

        let (cancel_tx, cancel_rx) = watch::channel(false);
        self.cancellations.lock().await.insert(run_id, cancel_tx);

        let run_repo = self.run_repo.clone();
        let event_bus = self.event_bus.clone();
        let provisioner = self.provisioner.clone();
        let artifact_store = self.artifact_store.clone();
        let step_runner = self.step_runner.clone();
        let config = self.config.clone();
        let semaphore = self.job_semaphore.clone();
        let cancellations = self.cancellations.clone();
        let workflow = Arc::new(workflow);

        tokio::spawn(async move {
            Self::execute_run_async(
                run_repo,
                event_bus,
                provisioner,
                artifact_store,
                step_runner,
                workflow,
                ctx,
                run_id,
                config,
                cancel_rx,
                semaphore,
            )
            .await;
            cancellations.lock().await.remove(&run_id);
        });

        info!("run {} accepted and started", run_id);
        Ok(RunSubmission::Accepted { run_id })
    }

    /// Cancel a running run. In-flight jobs are abandoned; partially written
    /// store entries are treated as absent.
    pub async fn cancel_run(&self, run_id: &RunId) -> Result<()> {
        let cancellations = self.cancellations.lock().await;
        let sender = cancellations
            .get(run_id)
            .ok_or_else(|| DomainError::NotFound(format!("run {} is not active", run_id)))?;
        sender
            .send(true)
            .map_err(|_| DomainError::Infrastructure("cancellation channel closed".to_string()))?;
        info!("cancellation requested for run {}", run_id);
        Ok(())
    }

    pub async fn get_run(&self, run_id: &RunId) -> Result<Option<Run>> {
        self.run_repo
            .get_run(run_id)
            .await
            .map_err(|e| DomainError::Infrastructure(format!("failed to get run: {}", e)))
    }

    pub async fn get_runs_for_workflow(&self, workflow_id: &WorkflowId) -> Result<Vec<Run>> {
        self.run_repo
            .get_runs_by_workflow(workflow_id)
            .await
            .map_err(|e| DomainError::Infrastructure(format!("failed to list runs: {}", e)))
    }

    /// Internal async execution of one run to a terminal state.
    #[allow(clippy::too_many_arguments)]
    async fn execute_run_async(
        run_repo: Arc<R>,
        event_bus: Arc<E>,
        provisioner: Arc<P>,
        artifact_store: Arc<dyn ArtifactStore>,
        step_runner: Arc<StepRunner>,
        workflow: Arc<WorkflowDefinition>,
        ctx: RunContext,
        run_id: RunId,
        config: RunOrchestratorConfig,
        mut cancel_rx: watch::Receiver<bool>,
        semaphore: Arc<Semaphore>,
    ) {
        let mut run = match run_repo.get_run(&run_id).await {
            Ok(Some(run)) => run,
            Ok(None) => {
                error!("run not found: {}", run_id);
                return;
            }
            Err(e) => {
                error!("failed to load run {}: {}", run_id, e);
                return;
            }
        };

        if let Err(e) = run.start() {
            error!("failed to start run {}: {}", run_id, e);
            return;
        }
        save(&run_repo, &run).await;
        publish(&event_bus, SystemEvent::RunStarted { run_id }).await;

        let levels = match workflow.execution_levels() {
            Ok(levels) => levels,
            Err(e) => {
                // Unreachable after validation, but never executes a job on it.
                error!("run {} has an unschedulable graph: {}", run_id, e);
                return;
            }
        };

        let mut status_map: HashMap<JobId, JobStatus> = HashMap::new();
        let mut cancelled = *cancel_rx.borrow();

        'levels: for level in levels {
            if cancelled {
                break 'levels;
            }

            let mut joinset: JoinSet<(JobId, JobExecution)> = JoinSet::new();

            for job_id in level {
                let Some(job) = workflow.job(&job_id) else {
                    continue;
                };

                let deps_succeeded = job.needs.iter().all(|dep| {
                    matches!(status_map.get(dep), Some(JobStatus::Succeeded))
                });
                if !deps_succeeded {
                    // Failure propagates forward: descendants never run.
                    if let Some(result) = run.job_result_mut(&job_id) {
                        result.skip();
                    }
                    status_map.insert(job_id.clone(), JobStatus::Skipped);
                    save(&run_repo, &run).await;
                    publish(
                        &event_bus,
                        SystemEvent::JobCompleted {
                            run_id,
                            job_id: job_id.clone(),
                            status: JobStatus::Skipped,
                        },
                    )
                    .await;
                    continue;
                }

                if let Some(result) = run.job_result_mut(&job_id) {
                    result.start();
                }
                status_map.insert(job_id.clone(), JobStatus::Running);
                save(&run_repo, &run).await;
                publish(
                    &event_bus,
                    SystemEvent::JobStarted {
                        run_id,
                        job_id: job_id.clone(),
                    },
                )
                .await;

                let job = job.clone();
                let workflow = workflow.clone();
                let ctx = ctx.clone();
                let provisioner = provisioner.clone();
                let step_runner = step_runner.clone();
                let semaphore = semaphore.clone();
                let timeout_ms = job.timeout_ms.unwrap_or(config.default_job_timeout_ms);

                joinset.spawn(async move {
                    let _permit = match semaphore.acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => {
                            return (
                                job.id.clone(),
                                JobExecution::failed("scheduler shut down".to_string()),
                            );
                        }
                    };

                    let environment = match provisioner.acquire(&job.runs_on).await {
                        Ok(environment) => environment,
                        Err(e) => {
                            return (job.id.clone(), JobExecution::failed(e.to_string()));
                        }
                    };

                    let budget = tokio::time::Duration::from_millis(timeout_ms);
                    let execution = match tokio::time::timeout(
                        budget,
                        step_runner.run_job(environment.as_ref(), &ctx, &job, &workflow.actions),
                    )
                    .await
                    {
                        Ok(execution) => execution,
                        Err(_) => JobExecution::failed(format!(
                            "job timed out after {} ms",
                            timeout_ms
                        )),
                    };

                    (job.id.clone(), execution)
                });
            }

            // Drain the level, reacting to cancellation mid-flight.
            loop {
                tokio::select! {
                    joined = joinset.join_next() => match joined {
                        None => break,
                        Some(Ok((job_id, execution))) => {
                            status_map.insert(job_id.clone(), execution.status);
                            if let Some(result) = run.job_result_mut(&job_id) {
                                result.steps = execution.steps.clone();
                                result.produced_artifacts = execution.produced_artifacts.clone();
                                result.produced_cache_keys = execution.produced_cache_keys.clone();
                                match execution.status {
                                    JobStatus::Failed => result.fail(
                                        execution
                                            .failure
                                            .clone()
                                            .unwrap_or_else(|| "job failed".to_string()),
                                    ),
                                    _ => result.succeed(),
                                }
                            }
                            save(&run_repo, &run).await;
                            for step in &execution.steps {
                                publish(
                                    &event_bus,
                                    SystemEvent::StepFinished {
                                        run_id,
                                        job_id: job_id.clone(),
                                        step: step.name.clone(),
                                        outcome: step.outcome,
                                    },
                                )
                                .await;
                            }
                            publish(
                                &event_bus,
                                SystemEvent::JobCompleted {
                                    run_id,
                                    job_id,
                                    status: execution.status,
                                },
                            )
                            .await;
                        }
                        Some(Err(e)) => {
                            if !e.is_cancelled() {
                                error!("job task panicked in run {}: {}", run_id, e);
                            }
                        }
                    },
                    changed = cancel_rx.changed() => {
                        if changed.is_ok() && *cancel_rx.borrow() && !cancelled {
                            cancelled = true;
                            warn!("run {} cancelled, abandoning in-flight jobs", run_id);
                            joinset.abort_all();
                        }
                    }
                }
            }

            if cancelled {
                break 'levels;
            }
        }

        if cancelled {
            if let Err(e) = run.cancel() {
                error!("failed to cancel run {}: {}", run_id, e);
            }
        } else if let Err(e) = run.finish() {
            error!("failed to finish run {}: {}", run_id, e);
        }
        save(&run_repo, &run).await;
        publish(
            &event_bus,
            SystemEvent::RunCompleted {
                run_id,
                status: run.status,
            },
        )
        .await;

        // Artifacts are destroyed at run completion unless retained.
        if !workflow.retain_artifacts {
            if let Err(e) = artifact_store.purge(&run_id).await {
                warn!("failed to purge artifacts of run {}: {}", run_id, e);
            }
        }

        info!("run {} completed with status {}", run_id, run.status);
    }
}

async fn save<R: RunRepository>(run_repo: &Arc<R>, run: &Run) {
    if let Err(e) = run_repo.save_run(run).await {
        error!("failed to persist run {}: {}", run.id, e);
    }
}

async fn publish<E: EventPublisher>(event_bus: &Arc<E>, event: SystemEvent) {
    if let Err(e) = event_bus.publish(event).await {
        warn!("failed to publish event: {}", e);
    }
}
