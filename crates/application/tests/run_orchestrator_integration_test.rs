//! End-to-end orchestration tests over the in-memory adapters and the local
//! process execution environment.

use ibai_adapters::{
    InMemoryArtifactStore, InMemoryBus, InMemoryRunRepository, LocalProcessProvisioner,
    LruCacheStore, StaticSecretStore,
};
use ibai_application::{RunOrchestrator, RunOrchestratorConfig, RunSubmission};
use ibai_core::trigger::{TriggerRejection, TriggerSpec};
use ibai_core::workflow::{
    ActionInput, CompositeAction, Condition, JobSpec, Step, ACTION_DOWNLOAD_ARTIFACT,
    ACTION_UPLOAD_ARTIFACT,
};
use ibai_core::{
    DomainError, Event, EventKind, JobId, JobStatus, Run, RunId, RunStatus, StepOutcome,
    WorkflowDefinition,
};
use ibai_ports::{ArtifactStore, CacheStore, SecretStore};
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    orchestrator: RunOrchestrator<InMemoryRunRepository, InMemoryBus, LocalProcessProvisioner>,
    artifacts: Arc<InMemoryArtifactStore>,
}

fn harness() -> Harness {
    let run_repo = Arc::new(InMemoryRunRepository::new());
    let event_bus = Arc::new(InMemoryBus::new(1024));
    let provisioner = Arc::new(LocalProcessProvisioner::new());
    let secret_store: Arc<dyn SecretStore> = Arc::new(StaticSecretStore::empty());
    let cache_store: Arc<dyn CacheStore> = Arc::new(LruCacheStore::new(64 * 1024 * 1024));
    let artifacts = Arc::new(InMemoryArtifactStore::new());
    let artifact_store: Arc<dyn ArtifactStore> = artifacts.clone();

    let orchestrator = RunOrchestrator::new(
        run_repo,
        event_bus,
        provisioner,
        secret_store,
        cache_store,
        artifact_store,
        RunOrchestratorConfig {
            max_concurrent_jobs: 4,
            default_job_timeout_ms: 30_000,
        },
    );

    Harness {
        orchestrator,
        artifacts,
    }
}

fn push_event() -> Event {
    Event::new(EventKind::Push, "acme/site", "refs/heads/main")
        .with_changed_paths(vec!["src/app.js".to_string()])
        .with_commit_message("feat: wire up pipeline")
}

async fn submit(harness: &Harness, workflow: WorkflowDefinition, event: Event) -> RunId {
    match harness.orchestrator.submit(workflow, event).await.unwrap() {
        RunSubmission::Accepted { run_id } => run_id,
        RunSubmission::Rejected { reason } => panic!("unexpected rejection: {}", reason),
    }
}

async fn wait_for_run(harness: &Harness, run_id: &RunId) -> Run {
    for _ in 0..300 {
        if let Some(run) = harness.orchestrator.get_run(run_id).await.unwrap() {
            if run.is_terminal() {
                return run;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("run {} did not reach a terminal state", run_id);
}

fn ci_workflow() -> WorkflowDefinition {
    WorkflowDefinition::new(
        "react-ci",
        TriggerSpec::new()
            .with_branches(vec!["main".to_string(), "feature/*".to_string()])
            .with_paths_ignore(vec!["README.md".to_string()])
            .with_skip_marker("[skip ci]"),
        vec![
            JobSpec::new("test", "ubuntu-24.04")
                .with_step(Step::command(
                    "checkout",
                    "printf '{\"lockfileVersion\":3}' > package-lock.json",
                ))
                .with_step(Step::action(
                    "restore deps",
                    "cache",
                    vec![("path", "node_modules"), ("key-files", "package-lock.json")],
                ))
                .with_step(
                    Step::command(
                        "install deps",
                        "mkdir -p node_modules && printf '1.0.0' > node_modules/dep.txt",
                    )
                    .with_condition(Condition::OutputEquals {
                        step: "restore deps".to_string(),
                        output: "cache-hit".to_string(),
                        value: "false".to_string(),
                    }),
                )
                .with_step(Step::command("unit tests", "test -f node_modules/dep.txt")),
            JobSpec::new("build", "ubuntu-24.04")
                .with_need("test")
                .with_step(Step::command(
                    "build site",
                    "mkdir -p dist && printf '<html/>' > dist/index.html",
                ))
                .with_step(Step::action(
                    "store site",
                    ACTION_UPLOAD_ARTIFACT,
                    vec![("name", "site"), ("path", "dist")],
                )),
            JobSpec::new("verify", "ubuntu-24.04")
                .with_need("build")
                .with_step(Step::action(
                    "fetch site",
                    ACTION_DOWNLOAD_ARTIFACT,
                    vec![("name", "site"), ("path", "site")],
                ))
                .with_step(Step::command("smoke test", "test -f site/index.html")),
        ],
    )
}

#[tokio::test]
async fn test_pipeline_succeeds_with_cache_miss_then_hit() {
    let harness = harness();

    let first = submit(&harness, ci_workflow(), push_event()).await;
    let first_run = wait_for_run(&harness, &first).await;
    assert_eq!(first_run.status, RunStatus::Succeeded);
    assert!(first_run
        .jobs
        .iter()
        .all(|j| j.status == JobStatus::Succeeded));

    let test_job = first_run.job_result(&JobId::new("test")).unwrap();
    let restore = test_job
        .steps
        .iter()
        .find(|s| s.name == "restore deps")
        .unwrap();
    assert!(restore.log.iter().any(|l| l.contains("cache miss")));
    let install = test_job
        .steps
        .iter()
        .find(|s| s.name == "install deps")
        .unwrap();
    assert_eq!(install.outcome, StepOutcome::Succeeded);
    assert!(!test_job.produced_cache_keys.is_empty());

    // Same branch, same lockfile: the second run restores instead of installing.
    let second = submit(&harness, ci_workflow(), push_event()).await;
    let second_run = wait_for_run(&harness, &second).await;
    assert_eq!(second_run.status, RunStatus::Succeeded);

    let test_job = second_run.job_result(&JobId::new("test")).unwrap();
    let restore = test_job
        .steps
        .iter()
        .find(|s| s.name == "restore deps")
        .unwrap();
    assert!(restore.log.iter().any(|l| l.contains("cache restored")));
    let install = test_job
        .steps
        .iter()
        .find(|s| s.name == "install deps")
        .unwrap();
    assert_eq!(install.outcome, StepOutcome::Skipped);
}

#[tokio::test]
async fn test_jobs_start_only_after_needs_are_terminal() {
    let harness = harness();
    let run_id = submit(&harness, ci_workflow(), push_event()).await;
    let run = wait_for_run(&harness, &run_id).await;

    let test_job = run.job_result(&JobId::new("test")).unwrap();
    let build_job = run.job_result(&JobId::new("build")).unwrap();
    let verify_job = run.job_result(&JobId::new("verify")).unwrap();

    assert!(build_job.started_at.unwrap() >= test_job.completed_at.unwrap());
    assert!(verify_job.started_at.unwrap() >= build_job.completed_at.unwrap());
    assert_eq!(build_job.produced_artifacts, vec!["site".to_string()]);
}

#[tokio::test]
async fn test_failure_skips_transitive_descendants() {
    let harness = harness();
    let workflow = WorkflowDefinition::new(
        "ci",
        TriggerSpec::new(),
        vec![
            JobSpec::new("test", "ubuntu-24.04")
                .with_step(Step::command("unit tests", "exit 1")),
            JobSpec::new("build", "ubuntu-24.04")
                .with_need("test")
                .with_step(Step::command("build", "true")),
            JobSpec::new("deploy", "ubuntu-24.04")
                .with_need("build")
                .with_step(Step::command("deploy", "true")),
            JobSpec::new("lint", "ubuntu-24.04").with_step(Step::command("lint", "true")),
        ],
    );

    let run_id = submit(&harness, workflow, push_event()).await;
    let run = wait_for_run(&harness, &run_id).await;

    assert_eq!(run.status, RunStatus::Failed);
    let test_job = run.job_result(&JobId::new("test")).unwrap();
    assert_eq!(test_job.status, JobStatus::Failed);
    assert_eq!(
        test_job.failure.as_deref(),
        Some("step 'unit tests' failed")
    );
    assert_eq!(
        run.job_result(&JobId::new("build")).unwrap().status,
        JobStatus::Skipped
    );
    assert_eq!(
        run.job_result(&JobId::new("deploy")).unwrap().status,
        JobStatus::Skipped
    );
    // Independent branches still complete.
    assert_eq!(
        run.job_result(&JobId::new("lint")).unwrap().status,
        JobStatus::Succeeded
    );
}

#[tokio::test]
async fn test_best_effort_step_failure_is_recorded_but_non_fatal() {
    let harness = harness();
    let workflow = WorkflowDefinition::new(
        "ci",
        TriggerSpec::new(),
        vec![JobSpec::new("test", "ubuntu-24.04")
            .with_step(Step::command("flaky probe", "exit 1").best_effort())
            .with_step(Step::command("unit tests", "true"))],
    );

    let run_id = submit(&harness, workflow, push_event()).await;
    let run = wait_for_run(&harness, &run_id).await;

    assert_eq!(run.status, RunStatus::Succeeded);
    let job = run.job_result(&JobId::new("test")).unwrap();
    assert_eq!(job.status, JobStatus::Succeeded);

    let probe = job.steps.iter().find(|s| s.name == "flaky probe").unwrap();
    assert_eq!(probe.outcome, StepOutcome::Failed);
    assert!(probe.best_effort);
    let tests = job.steps.iter().find(|s| s.name == "unit tests").unwrap();
    assert_eq!(tests.outcome, StepOutcome::Succeeded);
}

#[tokio::test]
async fn test_job_timeout_fails_the_job() {
    let harness = harness();
    let workflow = WorkflowDefinition::new(
        "ci",
        TriggerSpec::new(),
        vec![JobSpec::new("slow", "ubuntu-24.04")
            .with_timeout_ms(300)
            .with_step(Step::command("hang", "sleep 5"))],
    );

    let run_id = submit(&harness, workflow, push_event()).await;
    let run = wait_for_run(&harness, &run_id).await;

    assert_eq!(run.status, RunStatus::Failed);
    let job = run.job_result(&JobId::new("slow")).unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.failure.as_deref().unwrap().contains("timed out"));
}

#[tokio::test]
async fn test_cancellation_abandons_in_flight_jobs() {
    let harness = harness();
    let workflow = WorkflowDefinition::new(
        "ci",
        TriggerSpec::new(),
        vec![
            JobSpec::new("slow", "ubuntu-24.04").with_step(Step::command("hang", "sleep 10")),
            JobSpec::new("after", "ubuntu-24.04")
                .with_need("slow")
                .with_step(Step::command("noop", "true")),
        ],
    );

    let run_id = submit(&harness, workflow, push_event()).await;
    tokio::time::sleep(Duration::from_millis(300)).await;
    harness.orchestrator.cancel_run(&run_id).await.unwrap();

    let run = wait_for_run(&harness, &run_id).await;
    assert_eq!(run.status, RunStatus::Cancelled);
    assert!(run
        .jobs
        .iter()
        .all(|j| j.status == JobStatus::Cancelled));
    assert!(run.duration().unwrap() < chrono::Duration::seconds(10));

    // A finished run is no longer cancellable.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(matches!(
        harness.orchestrator.cancel_run(&run_id).await,
        Err(DomainError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_trigger_rejection_creates_no_run() {
    let harness = harness();
    let workflow = ci_workflow();
    let workflow_id = workflow.id;
    let event = push_event().with_commit_message("fix typo [skip ci]");

    match harness.orchestrator.submit(workflow, event).await.unwrap() {
        RunSubmission::Rejected { reason } => {
            assert_eq!(reason, TriggerRejection::SkipMarker);
        }
        RunSubmission::Accepted { .. } => panic!("skip marker must reject the event"),
    }

    assert!(harness
        .orchestrator
        .get_runs_for_workflow(&workflow_id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_cyclic_workflow_never_executes_a_job() {
    let harness = harness();
    let workflow = WorkflowDefinition::new(
        "ci",
        TriggerSpec::new(),
        vec![
            JobSpec::new("a", "ubuntu-24.04")
                .with_need("b")
                .with_step(Step::command("noop", "true")),
            JobSpec::new("b", "ubuntu-24.04")
                .with_need("a")
                .with_step(Step::command("noop", "true")),
        ],
    );
    let workflow_id = workflow.id;

    let err = harness
        .orchestrator
        .submit(workflow, push_event())
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Configuration(_)));

    assert!(harness
        .orchestrator
        .get_runs_for_workflow(&workflow_id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_artifacts_are_destroyed_at_run_completion_unless_retained() {
    let harness = harness();

    let ephemeral = ci_workflow();
    let run_id = submit(&harness, ephemeral, push_event()).await;
    wait_for_run(&harness, &run_id).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(harness.artifacts.list(&run_id).await.unwrap().is_empty());

    let retained = ci_workflow().with_retained_artifacts();
    let run_id = submit(&harness, retained, push_event()).await;
    wait_for_run(&harness, &run_id).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(
        harness.artifacts.list(&run_id).await.unwrap(),
        vec!["site".to_string()]
    );
}

#[tokio::test]
async fn test_artifact_consumed_before_produced_fails_at_runtime() {
    let harness = harness();

    // The artifact name flows through a composite input, so the static
    // ordering check cannot see it; the consuming job fails at runtime.
    let fetch = CompositeAction::new(
        "fetch-artifact",
        vec![ActionInput::required("artifact")],
        vec![Step::action(
            "download",
            ACTION_DOWNLOAD_ARTIFACT,
            vec![("name", "${{ inputs.artifact }}"), ("path", "out")],
        )],
    );
    let workflow = WorkflowDefinition::new(
        "ci",
        TriggerSpec::new(),
        vec![JobSpec::new("consume", "ubuntu-24.04").with_step(Step::action(
            "fetch",
            "fetch-artifact",
            vec![("artifact", "never-produced")],
        ))],
    )
    .with_action(fetch);

    let run_id = submit(&harness, workflow, push_event()).await;
    let run = wait_for_run(&harness, &run_id).await;

    assert_eq!(run.status, RunStatus::Failed);
    let job = run.job_result(&JobId::new("consume")).unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    let download = job.steps.iter().find(|s| s.name == "fetch/download").unwrap();
    assert!(download
        .log
        .iter()
        .any(|l| l.contains("consumed before it was produced")));
}

#[tokio::test]
async fn test_composite_action_expands_with_inputs() {
    let harness = harness();

    let setup = CompositeAction::new(
        "write-banner",
        vec![
            ActionInput::required("text"),
            ActionInput::optional("file", "banner.txt"),
        ],
        vec![
            Step::command(
                "write",
                "printf '${{ inputs.text }}' > ${{ inputs.file }}",
            ),
            Step::command("check", "grep -q '${{ inputs.text }}' ${{ inputs.file }}"),
        ],
    );
    let workflow = WorkflowDefinition::new(
        "ci",
        TriggerSpec::new(),
        vec![JobSpec::new("banner", "ubuntu-24.04").with_step(Step::action(
            "banner",
            "write-banner",
            vec![("text", "hello")],
        ))],
    )
    .with_action(setup);

    let run_id = submit(&harness, workflow, push_event()).await;
    let run = wait_for_run(&harness, &run_id).await;

    assert_eq!(run.status, RunStatus::Succeeded);
    let job = run.job_result(&JobId::new("banner")).unwrap();
    let names: Vec<&str> = job.steps.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["banner/write", "banner/check"]);
}
