//! Step Runner
//!
//! Executes a job's step sequence strictly in order inside one disposable
//! execution environment. Composite action references are expanded inline
//! with input substitution; conditions are evaluated against the outcomes and
//! outputs of prior steps in the same job; the first failing step aborts the
//! remainder unless marked best-effort.

use crate::actions::{ActionRegistry, ActionInvocation, DeferredCacheSave, StepSideEffects};
use crate::context::RunContext;
use ibai_core::workflow::{is_builtin_action, CompositeAction, Condition, JobSpec, Step};
use ibai_core::{DomainError, JobStatus, StepOutcome, StepReport};
use ibai_ports::{ArtifactStore, CacheStore, ExecutionEnvironment};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of running one job's step sequence
#[derive(Debug)]
pub struct JobExecution {
    pub status: JobStatus,
    pub steps: Vec<StepReport>,
    pub produced_artifacts: Vec<String>,
    pub produced_cache_keys: Vec<String>,
    /// Diagnostic pointing at the first failing step.
    pub failure: Option<String>,
}

impl JobExecution {
    /// A job that could not start at all (provisioning, timeout).
    pub fn failed(diagnostic: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Failed,
            steps: vec![],
            produced_artifacts: vec![],
            produced_cache_keys: vec![],
            failure: Some(diagnostic.into()),
        }
    }
}

enum ResolvedKind {
    Command { run: String, env: HashMap<String, String> },
    Builtin { uses: String, with: HashMap<String, String> },
}

struct ResolvedStep {
    name: String,
    kind: ResolvedKind,
    condition: Option<Condition>,
    continue_on_error: bool,
}

/// Step Runner service
pub struct StepRunner {
    cache: Arc<dyn CacheStore>,
    registry: ActionRegistry,
}

impl StepRunner {
    pub fn new(cache: Arc<dyn CacheStore>, artifacts: Arc<dyn ArtifactStore>) -> Self {
        let registry = ActionRegistry::new(cache.clone(), artifacts);
        Self { cache, registry }
    }

    /// Run a job's steps in the given environment.
    pub async fn run_job(
        &self,
        environment: &dyn ExecutionEnvironment,
        ctx: &RunContext,
        job: &JobSpec,
        actions: &HashMap<String, CompositeAction>,
    ) -> JobExecution {
        let resolved = match expand_steps(&job.steps, actions) {
            Ok(steps) => steps,
            Err(e) => return JobExecution::failed(e.to_string()),
        };

        let mut reports: Vec<StepReport> = Vec::new();
        let mut outputs: HashMap<String, HashMap<String, String>> = HashMap::new();
        let mut deferred_saves: Vec<DeferredCacheSave> = Vec::new();
        let mut produced_artifacts: Vec<String> = Vec::new();
        let mut job_failed = false;
        let mut failure: Option<String> = None;

        for step in &resolved {
            if !should_run(step.condition.as_ref(), job_failed, &outputs) {
                debug!("skipping step '{}' in job '{}'", step.name, job.id);
                reports.push(StepReport::new(&step.name, StepOutcome::Skipped));
                continue;
            }

            let report = match &step.kind {
                ResolvedKind::Command { run, env } => {
                    let mut merged = ctx.env.clone();
                    merged.extend(job.env.clone());
                    merged.extend(env.clone());
                    match environment.run_command(run, &merged).await {
                        Ok(outcome) => {
                            let step_outcome = if outcome.success() {
                                StepOutcome::Succeeded
                            } else {
                                StepOutcome::Failed
                            };
                            StepReport::new(&step.name, step_outcome)
                                .with_exit_code(outcome.exit_code)
                                .with_log(outcome.log_lines())
                        }
                        Err(e) => StepReport::new(&step.name, StepOutcome::Failed)
                            .with_log(vec![e.to_string()]),
                    }
                }
                ResolvedKind::Builtin { uses, with } => {
                    let Some(action) = self.registry.get(uses) else {
                        // Unreachable once the workflow validated.
                        reports.push(
                            StepReport::new(&step.name, StepOutcome::Failed)
                                .with_log(vec![format!("unknown built-in action '{}'", uses)]),
                        );
                        job_failed = true;
                        failure.get_or_insert(format!("step '{}' failed", step.name));
                        continue;
                    };

                    let mut effects = StepSideEffects::default();
                    let mut invocation = ActionInvocation {
                        environment,
                        ctx,
                        os_image: &job.runs_on,
                        inputs: with.clone(),
                        effects: &mut effects,
                    };
                    let outcome = action.execute(&mut invocation).await;

                    deferred_saves.append(&mut effects.deferred_cache_saves);
                    produced_artifacts.append(&mut effects.produced_artifacts);
                    outputs.insert(step.name.clone(), effects.outputs.clone());

                    match outcome {
                        Ok(step_outcome) => {
                            StepReport::new(&step.name, step_outcome).with_log(effects.log)
                        }
                        Err(e) => {
                            let mut log = effects.log;
                            log.push(e.to_string());
                            StepReport::new(&step.name, StepOutcome::Failed).with_log(log)
                        }
                    }
                }
            };

            let report = if step.continue_on_error {
                report.as_best_effort()
            } else {
                report
            };

            if report.outcome == StepOutcome::Failed {
                if step.continue_on_error {
                    info!(
                        "best-effort step '{}' failed in job '{}', continuing",
                        step.name, job.id
                    );
                } else {
                    job_failed = true;
                    failure.get_or_insert(format!("step '{}' failed", step.name));
                }
            }

            reports.push(report);
        }

        // Cache entries are created only after the job's steps completed
        // without failing the job; a failed job's partial state stays absent.
        let mut produced_cache_keys = Vec::new();
        if !job_failed {
            for save in deferred_saves {
                match environment.snapshot_files(&save.path).await {
                    Ok(blob) => match self.cache.store(&save.key, blob).await {
                        Ok(()) => {
                            info!("stored cache entry {}", save.key);
                            produced_cache_keys.push(save.key.formatted());
                        }
                        Err(e) => warn!("cache store failed for {}: {}", save.key, e),
                    },
                    Err(e) => warn!(
                        "cache save skipped, path '{}' not capturable: {}",
                        save.path, e
                    ),
                }
            }
        }

        JobExecution {
            status: if job_failed {
                JobStatus::Failed
            } else {
                JobStatus::Succeeded
            },
            steps: reports,
            produced_artifacts,
            produced_cache_keys,
            failure,
        }
    }
}

fn should_run(
    condition: Option<&Condition>,
    job_failed: bool,
    outputs: &HashMap<String, HashMap<String, String>>,
) -> bool {
    match condition {
        None => !job_failed,
        Some(Condition::OnFailure) => job_failed,
        Some(Condition::OutputEquals { step, output, value }) => {
            !job_failed
                && outputs
                    .get(step)
                    .and_then(|o| o.get(output))
                    .map(|v| v == value)
                    .unwrap_or(false)
        }
    }
}

/// Expand composite references inline; other steps pass through unchanged.
fn expand_steps(
    steps: &[Step],
    actions: &HashMap<String, CompositeAction>,
) -> ibai_core::Result<Vec<ResolvedStep>> {
    let mut resolved = Vec::new();
    for step in steps {
        match step {
            Step::Command {
                name,
                run,
                env,
                condition,
                continue_on_error,
            } => resolved.push(ResolvedStep {
                name: name.clone(),
                kind: ResolvedKind::Command {
                    run: run.clone(),
                    env: env.clone(),
                },
                condition: condition.clone(),
                continue_on_error: *continue_on_error,
            }),
            Step::Action {
                name,
                uses,
                with,
                condition,
                continue_on_error,
            } => {
                if is_builtin_action(uses) {
                    resolved.push(ResolvedStep {
                        name: name.clone(),
                        kind: ResolvedKind::Builtin {
                            uses: uses.clone(),
                            with: with.clone(),
                        },
                        condition: condition.clone(),
                        continue_on_error: *continue_on_error,
                    });
                    continue;
                }

                let action = actions.get(uses).ok_or_else(|| {
                    DomainError::Configuration(format!("unknown action '{}'", uses))
                })?;
                let inputs = resolve_inputs(action, with)?;

                for inner in &action.steps {
                    let inner_name = format!("{}/{}", name, inner.name());
                    let condition = inner
                        .condition()
                        .cloned()
                        .or_else(|| condition.clone());
                    let continue_on_error = inner.continue_on_error() || *continue_on_error;

                    match inner {
                        Step::Command { run, env, .. } => resolved.push(ResolvedStep {
                            name: inner_name,
                            kind: ResolvedKind::Command {
                                run: substitute(run, &inputs),
                                env: env
                                    .iter()
                                    .map(|(k, v)| (k.clone(), substitute(v, &inputs)))
                                    .collect(),
                            },
                            condition,
                            continue_on_error,
                        }),
                        Step::Action { uses, with, .. } => resolved.push(ResolvedStep {
                            name: inner_name,
                            kind: ResolvedKind::Builtin {
                                uses: uses.clone(),
                                with: with
                                    .iter()
                                    .map(|(k, v)| (k.clone(), substitute(v, &inputs)))
                                    .collect(),
                            },
                            condition,
                            continue_on_error,
                        }),
                    }
                }
            }
        }
    }
    Ok(resolved)
}

/// Merge provided inputs over declared defaults; missing required inputs are
/// a configuration error.
fn resolve_inputs(
    action: &CompositeAction,
    with: &HashMap<String, String>,
) -> ibai_core::Result<HashMap<String, String>> {
    let mut inputs = HashMap::new();
    for input in &action.inputs {
        match with.get(&input.name) {
            Some(value) => {
                inputs.insert(input.name.clone(), value.clone());
            }
            None => match &input.default {
                Some(default) => {
                    inputs.insert(input.name.clone(), default.clone());
                }
                None if input.required => {
                    return Err(DomainError::Configuration(format!(
                        "action '{}' requires input '{}'",
                        action.name, input.name
                    )));
                }
                None => {}
            },
        }
    }
    Ok(inputs)
}

/// Replace `${{ inputs.<name> }}` placeholders.
fn substitute(template: &str, inputs: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("${{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 3..];
        match after.find("}}") {
            Some(end) => {
                let expr = after[..end].trim();
                if let Some(name) = expr.strip_prefix("inputs.") {
                    match inputs.get(name.trim()) {
                        Some(value) => out.push_str(value),
                        None => {}
                    }
                } else {
                    // Unknown expression namespaces pass through verbatim.
                    out.push_str(&rest[start..start + 3 + end + 2]);
                }
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ibai_core::workflow::ActionInput;

    #[test]
    fn test_substitute_inputs() {
        let mut inputs = HashMap::new();
        inputs.insert("node-version".to_string(), "20".to_string());

        assert_eq!(
            substitute("install node ${{ inputs.node-version }}", &inputs),
            "install node 20"
        );
        assert_eq!(
            substitute("${{inputs.node-version}}", &inputs),
            "20"
        );
        assert_eq!(substitute("no placeholders", &inputs), "no placeholders");
    }

    #[test]
    fn test_resolve_inputs_applies_defaults() {
        let action = CompositeAction::new(
            "setup-node",
            vec![
                ActionInput::required("node-version"),
                ActionInput::optional("registry", "https://registry.npmjs.org"),
            ],
            vec![],
        );
        let mut with = HashMap::new();
        with.insert("node-version".to_string(), "22".to_string());

        let inputs = resolve_inputs(&action, &with).unwrap();
        assert_eq!(inputs["node-version"], "22");
        assert_eq!(inputs["registry"], "https://registry.npmjs.org");
    }

    #[test]
    fn test_resolve_inputs_rejects_missing_required() {
        let action = CompositeAction::new(
            "setup-node",
            vec![ActionInput::required("node-version")],
            vec![],
        );
        assert!(resolve_inputs(&action, &HashMap::new()).is_err());
    }

    #[test]
    fn test_should_run_conditions() {
        let mut outputs: HashMap<String, HashMap<String, String>> = HashMap::new();
        outputs
            .entry("restore deps".to_string())
            .or_default()
            .insert("cache-hit".to_string(), "false".to_string());

        assert!(should_run(None, false, &outputs));
        assert!(!should_run(None, true, &outputs));
        assert!(should_run(Some(&Condition::OnFailure), true, &outputs));
        assert!(!should_run(Some(&Condition::OnFailure), false, &outputs));

        let on_miss = Condition::OutputEquals {
            step: "restore deps".to_string(),
            output: "cache-hit".to_string(),
            value: "false".to_string(),
        };
        assert!(should_run(Some(&on_miss), false, &outputs));

        let on_hit = Condition::OutputEquals {
            step: "restore deps".to_string(),
            output: "cache-hit".to_string(),
            value: "true".to_string(),
        };
        assert!(!should_run(Some(&on_hit), false, &outputs));
    }

    #[test]
    fn test_expand_composite_steps_with_prefixed_names() {
        let action = CompositeAction::new(
            "setup-node",
            vec![ActionInput::required("node-version")],
            vec![Step::command(
                "install",
                "install node ${{ inputs.node-version }}",
            )],
        );
        let mut actions = HashMap::new();
        actions.insert("setup-node".to_string(), action);

        let steps = vec![Step::action(
            "node",
            "setup-node",
            vec![("node-version", "20")],
        )];
        let resolved = expand_steps(&steps, &actions).unwrap();

        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].name, "node/install");
        match &resolved[0].kind {
            ResolvedKind::Command { run, .. } => assert_eq!(run, "install node 20"),
            _ => panic!("expected command"),
        }
    }
}
