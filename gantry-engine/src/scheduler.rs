//! Pipeline scheduler
//!
//! `submit` evaluates every pipeline trigger against an incoming event and
//! creates one pending [`Run`] per match; `drive` executes the resulting
//! build to completion. Eligibility follows the dependency graph: a run is
//! dispatched only once every scheduled upstream run is terminal, and all
//! state transitions for a build go through its single mutex-guarded state
//! so a run is never dispatched twice.
//!
//! Triggers with a `status` clause are deferred at submit time and
//! re-evaluated at eligibility against the aggregate outcome of the run's
//! transitive upstreams; a mismatch records the run as Skipped without
//! executing a step.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{Semaphore, mpsc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use gantry_core::domain::event::{BuildStatus, EventContext};
use gantry_core::domain::pipeline::{EnvValue, FailurePolicy, PipelineDefinition, Step};
use gantry_core::domain::run::{Run, RunStatus, StepOutcome, StepResult, StepStatus};

use crate::error::EngineError;
use crate::executor::{StepExecutor, StepRequest, VolumeRef};
use crate::graph::PipelineGraph;
use crate::secrets::{SecretError, SecretStore};
use crate::sink::RunSink;

/// All runs created for one event
pub struct Build {
    event: EventContext,
    state: Mutex<BuildState>,
    cancelled: AtomicBool,
}

struct BuildState {
    /// Pipeline names in definition order, for stable reporting
    order: Vec<String>,
    runs: HashMap<String, Run>,
}

impl Build {
    pub fn event(&self) -> &EventContext {
        &self.event
    }

    /// Snapshot of every run, in definition order
    pub fn runs(&self) -> Vec<Run> {
        let state = self.state.lock().unwrap();
        state
            .order
            .iter()
            .filter_map(|name| state.runs.get(name).cloned())
            .collect()
    }

    /// Snapshot of one run by pipeline name
    pub fn run(&self, pipeline: &str) -> Option<Run> {
        self.state.lock().unwrap().runs.get(pipeline).cloned()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Aborts the build: every pending run becomes Cancelled immediately,
    /// running runs stop before their next step, and nothing new is
    /// dispatched afterwards.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);

        let mut state = self.state.lock().unwrap();
        for run in state.runs.values_mut() {
            if run.status == RunStatus::Pending {
                run.status = RunStatus::Cancelled;
                run.finished_at = Some(chrono::Utc::now());
            }
        }
        info!("build cancelled");
    }

    /// True once every run is in a terminal state
    pub fn is_complete(&self) -> bool {
        let state = self.state.lock().unwrap();
        state.runs.values().all(|r| r.status.is_terminal())
    }

    /// Failure if any run executed and failed, success otherwise
    pub fn aggregate_status(&self) -> BuildStatus {
        let state = self.state.lock().unwrap();
        aggregate_of(&state, None)
    }
}

/// Aggregate status over a subset of runs (or all runs when `names` is None)
fn aggregate_of(state: &BuildState, names: Option<&HashSet<String>>) -> BuildStatus {
    let failed = state.runs.values().any(|run| {
        names.is_none_or(|set| set.contains(&run.pipeline))
            && run.build_status() == Some(BuildStatus::Failure)
    });
    if failed {
        BuildStatus::Failure
    } else {
        BuildStatus::Success
    }
}

/// Schedules and drives pipeline runs for incoming events
pub struct Scheduler {
    pipelines: Vec<PipelineDefinition>,
    graph: PipelineGraph,
    executor: Arc<dyn StepExecutor>,
    secrets: Arc<dyn SecretStore>,
    sinks: Vec<Arc<dyn RunSink>>,
    max_parallel_runs: usize,
}

impl Scheduler {
    /// Creates a scheduler over a validated configuration
    ///
    /// Graph validation happens here: a cycle or an unknown `depends_on`
    /// name rejects the whole configuration before any run can exist.
    pub fn new(
        pipelines: Vec<PipelineDefinition>,
        executor: Arc<dyn StepExecutor>,
        secrets: Arc<dyn SecretStore>,
    ) -> Result<Self, EngineError> {
        let graph = PipelineGraph::build(&pipelines)?;
        Ok(Self {
            pipelines,
            graph,
            executor,
            secrets,
            sinks: Vec::new(),
            max_parallel_runs: 4,
        })
    }

    pub fn with_sink(mut self, sink: Arc<dyn RunSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn with_max_parallel_runs(mut self, max: usize) -> Self {
        self.max_parallel_runs = max.max(1);
        self
    }

    pub fn pipelines(&self) -> &[PipelineDefinition] {
        &self.pipelines
    }

    pub fn graph(&self) -> &PipelineGraph {
        &self.graph
    }

    /// Creates the build for an event: one pending run per pipeline whose
    /// trigger matches. A trigger mismatch is a no-op, not an error.
    /// Status clauses are deferred until the upstream outcome is known.
    pub fn submit(&self, event: EventContext) -> Arc<Build> {
        let mut order = Vec::new();
        let mut runs = HashMap::new();

        for pipeline in &self.pipelines {
            if pipeline.trigger.matches_ignoring_status(&event) {
                debug!(pipeline = %pipeline.name, "trigger matched");
                order.push(pipeline.name.clone());
                runs.insert(pipeline.name.clone(), Run::pending(&pipeline.name));
            } else {
                debug!(pipeline = %pipeline.name, "trigger mismatch, not scheduling");
            }
        }

        info!(
            event = %event.event,
            build = event.build_number,
            pipelines = order.len(),
            "build submitted"
        );

        Arc::new(Build {
            event,
            state: Mutex::new(BuildState { order, runs }),
            cancelled: AtomicBool::new(false),
        })
    }

    /// Drives a build until every run is terminal
    pub async fn drive(&self, build: &Arc<Build>) {
        let semaphore = Arc::new(Semaphore::new(self.max_parallel_runs));
        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<()>();
        let mut in_flight = 0usize;
        let mut published = HashSet::new();

        loop {
            let progressed = self.dispatch_round(build, &semaphore, &done_tx, &mut in_flight);
            self.publish_terminal(build, &mut published).await;

            if in_flight == 0 && build.is_complete() {
                break;
            }
            if progressed {
                // A self-skip may have unlocked further downstream runs
                continue;
            }
            if in_flight > 0 {
                if done_rx.recv().await.is_some() {
                    in_flight -= 1;
                }
            } else {
                // Nothing running and nothing dispatchable; with a
                // validated acyclic graph this only happens on
                // cancellation.
                break;
            }
        }

        self.publish_terminal(build, &mut published).await;
    }

    /// Convenience: submit an event and drive it to completion
    pub async fn execute(&self, event: EventContext) -> Arc<Build> {
        let build = self.submit(event);
        self.drive(&build).await;
        build
    }

    /// One pass over pending runs: self-skip status-gated runs whose
    /// clause does not match, dispatch the rest. All transitions happen
    /// under the build state lock.
    fn dispatch_round(
        &self,
        build: &Arc<Build>,
        semaphore: &Arc<Semaphore>,
        done_tx: &mpsc::UnboundedSender<()>,
        in_flight: &mut usize,
    ) -> bool {
        let mut to_execute: Vec<(PipelineDefinition, Uuid, BuildStatus)> = Vec::new();
        let mut progressed = false;

        {
            let mut state = build.state.lock().unwrap();

            for pipeline in &self.pipelines {
                let Some(run) = state.runs.get(&pipeline.name) else {
                    continue;
                };
                if run.status != RunStatus::Pending {
                    continue;
                }

                // Upstreams without a run for this event are vacuously
                // satisfied; scheduled upstreams must all be terminal.
                let ready = self.graph.upstreams(&pipeline.name).iter().all(|up| {
                    state
                        .runs
                        .get(*up)
                        .is_none_or(|r| r.status.is_terminal())
                });
                if !ready {
                    continue;
                }

                let closure = self.graph.upstream_closure(&pipeline.name);
                let aggregate = aggregate_of(&state, Some(&closure));

                if pipeline.trigger.has_status_clause()
                    && !pipeline.trigger.status_matches(Some(aggregate))
                {
                    if let Some(run) = state.runs.get_mut(&pipeline.name) {
                        run.status = RunStatus::Skipped;
                        run.finished_at = Some(chrono::Utc::now());
                    }
                    info!(
                        pipeline = %pipeline.name,
                        upstream = %aggregate,
                        "status gate did not match, run skipped"
                    );
                    progressed = true;
                    continue;
                }

                if let Some(run) = state.runs.get_mut(&pipeline.name) {
                    run.status = RunStatus::Running;
                    run.started_at = Some(chrono::Utc::now());
                    to_execute.push((pipeline.clone(), run.id, aggregate));
                    progressed = true;
                }
            }
        }

        for (pipeline, run_id, aggregate) in to_execute {
            *in_flight += 1;
            let task = RunTask {
                executor: Arc::clone(&self.executor),
                secrets: Arc::clone(&self.secrets),
                build: Arc::clone(build),
                dispatch_ctx: build.event.with_status(aggregate),
                pipeline,
                run_id,
            };
            let semaphore = Arc::clone(semaphore);
            let done_tx = done_tx.clone();
            tokio::spawn(async move {
                // Permit bounds run concurrency; the run is already marked
                // Running so it cannot be dispatched again.
                let _permit = semaphore.acquire_owned().await;
                task.execute().await;
                let _ = done_tx.send(());
            });
        }

        progressed
    }

    /// Publishes newly terminal runs to every registered sink
    ///
    /// Sink failures are logged and isolated; they never alter the run's
    /// recorded status.
    async fn publish_terminal(&self, build: &Arc<Build>, published: &mut HashSet<String>) {
        if self.sinks.is_empty() {
            return;
        }

        let terminal: Vec<Run> = {
            let state = build.state.lock().unwrap();
            state
                .order
                .iter()
                .filter(|name| !published.contains(*name))
                .filter_map(|name| state.runs.get(name))
                .filter(|run| run.status.is_terminal())
                .cloned()
                .collect()
        };

        for run in terminal {
            published.insert(run.pipeline.clone());
            for sink in &self.sinks {
                if let Err(e) = sink.publish(&run, &build.event).await {
                    warn!(
                        sink = sink.name(),
                        pipeline = %run.pipeline,
                        "sink failed (run status unaffected): {e}"
                    );
                }
            }
        }
    }
}

/// One dispatched run, executing its steps serially in declared order
struct RunTask {
    executor: Arc<dyn StepExecutor>,
    secrets: Arc<dyn SecretStore>,
    build: Arc<Build>,
    /// Event context carrying the upstream aggregate status
    dispatch_ctx: EventContext,
    pipeline: PipelineDefinition,
    run_id: Uuid,
}

impl RunTask {
    async fn execute(self) {
        let mut outcomes: Vec<StepOutcome> = Vec::new();
        let mut run_failed = false;
        let mut cancelled = false;

        for step in &self.pipeline.steps {
            if self.build.is_cancelled() {
                cancelled = true;
                outcomes.push(StepOutcome::cancelled(&step.name));
                continue;
            }

            let status_now = if run_failed {
                BuildStatus::Failure
            } else {
                self.dispatch_ctx.status.unwrap_or(BuildStatus::Success)
            };
            let step_ctx = self.dispatch_ctx.with_status(status_now);

            if run_failed {
                // The run is halted; only steps that explicitly match the
                // failure status (notify-style steps) still execute.
                if !(step.when.has_status_clause() && step.when.matches(&step_ctx)) {
                    outcomes.push(StepOutcome::skipped(&step.name));
                    continue;
                }
            } else if !step.when.matches(&step_ctx) {
                debug!(
                    pipeline = %self.pipeline.name,
                    step = %step.name,
                    "when clause did not match, step skipped"
                );
                outcomes.push(StepOutcome::skipped(&step.name));
                continue;
            }

            let outcome = self.run_one_step(step).await;
            let failed = outcome.status == StepStatus::Failure;
            outcomes.push(outcome);

            if failed {
                match step.failure {
                    FailurePolicy::Ignore => {
                        debug!(
                            pipeline = %self.pipeline.name,
                            step = %step.name,
                            "step failed but is failure-ignorable"
                        );
                    }
                    FailurePolicy::Propagate => run_failed = true,
                }
            }
        }

        let final_status = if cancelled {
            RunStatus::Cancelled
        } else if run_failed {
            RunStatus::Failure
        } else {
            RunStatus::Success
        };

        {
            let mut state = self.build.state.lock().unwrap();
            if let Some(run) = state.runs.get_mut(&self.pipeline.name) {
                run.steps = outcomes;
                run.status = final_status;
                run.finished_at = Some(chrono::Utc::now());
            }
        }

        info!(pipeline = %self.pipeline.name, status = %final_status, "run finished");
    }

    async fn run_one_step(&self, step: &Step) -> StepOutcome {
        let (environment, secret_values) = match resolve_environment(&*self.secrets, step) {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!(
                    pipeline = %self.pipeline.name,
                    step = %step.name,
                    "secret resolution failed: {e}"
                );
                return StepOutcome {
                    step: step.name.clone(),
                    status: StepStatus::Failure,
                    result: None,
                    error: Some(e.to_string()),
                };
            }
        };

        let request = StepRequest {
            run_id: self.run_id,
            pipeline: self.pipeline.name.clone(),
            step: step.name.clone(),
            image: step.image.clone(),
            commands: step.commands.clone(),
            environment,
            settings: step.settings.clone(),
            volumes: self
                .pipeline
                .volumes
                .iter()
                .map(|v| VolumeRef {
                    name: v.name.clone(),
                })
                .collect(),
            event: self.dispatch_ctx.clone(),
        };

        info!(
            pipeline = %self.pipeline.name,
            step = %step.name,
            image = %step.image,
            "executing step"
        );

        match self.executor.run_step(&request).await {
            Ok(mut result) => {
                scrub_output(&mut result, &secret_values);
                let status = if result.success() {
                    StepStatus::Success
                } else {
                    StepStatus::Failure
                };
                StepOutcome {
                    step: step.name.clone(),
                    status,
                    result: Some(result),
                    error: None,
                }
            }
            Err(e) => StepOutcome {
                step: step.name.clone(),
                status: StepStatus::Failure,
                result: None,
                error: Some(e.to_string()),
            },
        }
    }
}

/// Resolves a step's environment, returning the flattened map plus the
/// secret values that went into it (for output scrubbing)
fn resolve_environment(
    secrets: &dyn SecretStore,
    step: &Step,
) -> Result<(BTreeMap<String, String>, Vec<String>), SecretError> {
    let mut environment = BTreeMap::new();
    let mut secret_values = Vec::new();

    for (key, value) in &step.environment {
        match value {
            EnvValue::Literal(v) => {
                environment.insert(key.clone(), v.clone());
            }
            EnvValue::Secret { from_secret } => {
                let resolved = secrets.resolve(from_secret)?;
                secret_values.push(resolved.clone());
                environment.insert(key.clone(), resolved);
            }
        }
    }

    Ok((environment, secret_values))
}

/// Replaces resolved secret values in captured output
fn scrub_output(result: &mut StepResult, secret_values: &[String]) {
    for value in secret_values {
        if value.is_empty() {
            continue;
        }
        result.stdout = result.stdout.replace(value, "********");
        result.stderr = result.stderr.replace(value, "********");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::executor::ExecutorError;
    use crate::secrets::StaticSecretStore;
    use crate::sink::SinkError;
    use async_trait::async_trait;
    use gantry_core::config;
    use gantry_core::domain::event::EventKind;

    /// Test executor with per-step scripted failures and delays; records
    /// every executed step as "pipeline/step" in dispatch order.
    #[derive(Default)]
    struct ScriptedExecutor {
        fail: HashSet<(String, String)>,
        delays: HashMap<(String, String), u64>,
        echo_env: bool,
        log: Mutex<Vec<String>>,
    }

    impl ScriptedExecutor {
        fn fail_step(mut self, pipeline: &str, step: &str) -> Self {
            self.fail.insert((pipeline.to_string(), step.to_string()));
            self
        }

        fn delay_step(mut self, pipeline: &str, step: &str, ms: u64) -> Self {
            self.delays
                .insert((pipeline.to_string(), step.to_string()), ms);
            self
        }

        fn echo_env(mut self) -> Self {
            self.echo_env = true;
            self
        }

        fn executed(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl StepExecutor for ScriptedExecutor {
        async fn run_step(&self, request: &StepRequest) -> Result<StepResult, ExecutorError> {
            let key = (request.pipeline.clone(), request.step.clone());
            self.log
                .lock()
                .unwrap()
                .push(format!("{}/{}", request.pipeline, request.step));

            if let Some(ms) = self.delays.get(&key) {
                tokio::time::sleep(std::time::Duration::from_millis(*ms)).await;
            }

            let stdout = if self.echo_env {
                request
                    .environment
                    .values()
                    .cloned()
                    .collect::<Vec<_>>()
                    .join("\n")
            } else {
                String::new()
            };

            Ok(StepResult {
                exit_code: if self.fail.contains(&key) { 1 } else { 0 },
                stdout,
                stderr: String::new(),
                duration_ms: 1,
            })
        }
    }

    struct FailingSink {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl RunSink for FailingSink {
        fn name(&self) -> &str {
            "failing"
        }

        async fn publish(&self, run: &Run, _event: &EventContext) -> Result<(), SinkError> {
            self.calls.lock().unwrap().push(run.pipeline.clone());
            Err("webhook unreachable".into())
        }
    }

    fn push_event(branch: &str) -> EventContext {
        EventContext {
            event: EventKind::Push,
            branch: Some(branch.to_string()),
            git_ref: Some(format!("refs/heads/{}", branch)),
            commit_sha: "abc123".to_string(),
            author: "alice".to_string(),
            build_number: 42,
            repo_owner: "acme".to_string(),
            repo_name: "widget".to_string(),
            cron: None,
            status: None,
        }
    }

    fn tag_event(tag: &str) -> EventContext {
        EventContext {
            event: EventKind::Tag,
            branch: None,
            git_ref: Some(format!("refs/tags/{}", tag)),
            commit_sha: "abc123".to_string(),
            author: "alice".to_string(),
            build_number: 43,
            repo_owner: "acme".to_string(),
            repo_name: "widget".to_string(),
            cron: None,
            status: None,
        }
    }

    fn scheduler(yaml: &str, executor: Arc<ScriptedExecutor>) -> Scheduler {
        let pipelines = config::load_str(yaml).unwrap();
        Scheduler::new(
            pipelines,
            executor,
            Arc::new(StaticSecretStore::default()),
        )
        .unwrap()
    }

    const CHECKS_AND_HANDLERS: &str = r#"
kind: pipeline
name: pre-checks
steps:
  - name: fmt
    image: rust:1.77
    commands: [cargo fmt --all -- --check]
  - name: audit
    image: rust:1.77
    commands: [cargo audit]
trigger:
  branch: [master]
  event: [push]
---
kind: pipeline
name: failed-pre-checks
depends_on: [pre-checks]
trigger:
  status: [failure]
steps:
  - name: notify
    image: plugins/slack
---
kind: pipeline
name: passed-pre-checks
depends_on: [pre-checks]
trigger:
  status: [success]
steps:
  - name: notify
    image: plugins/slack
"#;

    #[tokio::test]
    async fn test_single_pipeline_runs_steps_in_order() {
        let executor = Arc::new(ScriptedExecutor::default());
        let yaml = r#"
kind: pipeline
name: cargo-test
steps:
  - name: build
    image: rust:1.77
  - name: test
    image: rust:1.77
"#;
        let sched = scheduler(yaml, Arc::clone(&executor));
        let build = sched.execute(push_event("master")).await;

        let run = build.run("cargo-test").unwrap();
        assert_eq!(run.status, RunStatus::Success);
        assert_eq!(executor.executed(), vec!["cargo-test/build", "cargo-test/test"]);
        assert!(run.started_at.is_some() && run.finished_at.is_some());
    }

    #[tokio::test]
    async fn test_downstream_waits_for_upstream_terminal() {
        let executor = Arc::new(ScriptedExecutor::default().delay_step("a", "one", 30));
        let yaml = r#"
kind: pipeline
name: a
steps:
  - name: one
    image: alpine:3.19
---
kind: pipeline
name: b
depends_on: [a]
steps:
  - name: one
    image: alpine:3.19
"#;
        let sched = scheduler(yaml, Arc::clone(&executor));
        let build = sched.execute(push_event("master")).await;

        assert_eq!(build.run("a").unwrap().status, RunStatus::Success);
        assert_eq!(build.run("b").unwrap().status, RunStatus::Success);
        // b dispatched strictly after a finished
        assert_eq!(executor.executed(), vec!["a/one", "b/one"]);
    }

    #[tokio::test]
    async fn test_failure_handler_self_skips_on_green_build() {
        let executor = Arc::new(ScriptedExecutor::default());
        let sched = scheduler(CHECKS_AND_HANDLERS, Arc::clone(&executor));
        let build = sched.execute(push_event("master")).await;

        assert_eq!(build.run("pre-checks").unwrap().status, RunStatus::Success);
        // Scheduled, then self-skipped: its notify step never executed
        let failed = build.run("failed-pre-checks").unwrap();
        assert_eq!(failed.status, RunStatus::Skipped);
        assert!(failed.steps.is_empty());
        assert_eq!(
            build.run("passed-pre-checks").unwrap().status,
            RunStatus::Success
        );
        assert!(!executor.executed().contains(&"failed-pre-checks/notify".to_string()));
    }

    #[tokio::test]
    async fn test_failure_handler_runs_on_red_build() {
        let executor =
            Arc::new(ScriptedExecutor::default().fail_step("pre-checks", "audit"));
        let sched = scheduler(CHECKS_AND_HANDLERS, Arc::clone(&executor));
        let build = sched.execute(push_event("master")).await;

        assert_eq!(build.run("pre-checks").unwrap().status, RunStatus::Failure);
        assert_eq!(
            build.run("failed-pre-checks").unwrap().status,
            RunStatus::Success
        );
        assert_eq!(
            build.run("passed-pre-checks").unwrap().status,
            RunStatus::Skipped
        );
        assert!(executor.executed().contains(&"failed-pre-checks/notify".to_string()));
        assert_eq!(build.aggregate_status(), BuildStatus::Failure);
    }

    #[tokio::test]
    async fn test_trigger_mismatch_creates_no_run() {
        let executor = Arc::new(ScriptedExecutor::default());
        let yaml = r#"
kind: pipeline
name: push-only
trigger:
  event: [push]
steps:
  - name: build
    image: rust:1.77
---
kind: pipeline
name: release
trigger:
  ref: [refs/tags/v*]
steps:
  - name: package
    image: rust:1.77
"#;
        let sched = scheduler(yaml, Arc::clone(&executor));
        let build = sched.execute(tag_event("v1.0.0")).await;

        // Push pipelines are entirely unscheduled for a tag event
        assert!(build.run("push-only").is_none());
        assert_eq!(build.run("release").unwrap().status, RunStatus::Success);
        assert_eq!(executor.executed(), vec!["release/package"]);
    }

    #[tokio::test]
    async fn test_step_when_mismatch_is_skipped_not_failed() {
        let executor = Arc::new(ScriptedExecutor::default());
        let yaml = r#"
kind: pipeline
name: build
steps:
  - name: compile
    image: rust:1.77
  - name: publish
    image: rust:1.77
    when:
      branch: [release/*]
"#;
        let sched = scheduler(yaml, Arc::clone(&executor));
        let build = sched.execute(push_event("master")).await;

        let run = build.run("build").unwrap();
        assert_eq!(run.status, RunStatus::Success);
        assert_eq!(run.steps[1].status, StepStatus::Skipped);
        assert_eq!(executor.executed(), vec!["build/compile"]);
    }

    #[tokio::test]
    async fn test_step_failure_halts_run_except_failure_steps() {
        let executor = Arc::new(ScriptedExecutor::default().fail_step("ci", "build"));
        let yaml = r#"
kind: pipeline
name: ci
steps:
  - name: build
    image: rust:1.77
  - name: test
    image: rust:1.77
  - name: notify-failure
    image: plugins/slack
    when:
      status: [failure]
"#;
        let sched = scheduler(yaml, Arc::clone(&executor));
        let build = sched.execute(push_event("master")).await;

        let run = build.run("ci").unwrap();
        assert_eq!(run.status, RunStatus::Failure);
        assert_eq!(run.steps[0].status, StepStatus::Failure);
        // Halted step is skipped, the explicit failure step still runs
        assert_eq!(run.steps[1].status, StepStatus::Skipped);
        assert_eq!(run.steps[2].status, StepStatus::Success);
        assert_eq!(executor.executed(), vec!["ci/build", "ci/notify-failure"]);
    }

    #[tokio::test]
    async fn test_ignorable_failure_keeps_run_green() {
        let executor = Arc::new(ScriptedExecutor::default().fail_step("ci", "lint"));
        let yaml = r#"
kind: pipeline
name: ci
steps:
  - name: lint
    image: rust:1.77
    failure: ignore
  - name: build
    image: rust:1.77
"#;
        let sched = scheduler(yaml, Arc::clone(&executor));
        let build = sched.execute(push_event("master")).await;

        let run = build.run("ci").unwrap();
        assert_eq!(run.status, RunStatus::Success);
        assert_eq!(run.steps[0].status, StepStatus::Failure);
        assert_eq!(run.steps[1].status, StepStatus::Success);
    }

    #[tokio::test]
    async fn test_cancel_prevents_downstream_start() {
        let executor = Arc::new(
            ScriptedExecutor::default().delay_step("cargo-test", "test", 200),
        );
        let yaml = r#"
kind: pipeline
name: cargo-test
steps:
  - name: test
    image: rust:1.77
  - name: report
    image: rust:1.77
---
kind: pipeline
name: package
depends_on: [cargo-test]
steps:
  - name: pack
    image: rust:1.77
---
kind: pipeline
name: publish
depends_on: [cargo-test, package]
steps:
  - name: push
    image: rust:1.77
"#;
        let sched = Arc::new(scheduler(yaml, Arc::clone(&executor)));
        let build = sched.submit(push_event("master"));

        let driver = {
            let sched = Arc::clone(&sched);
            let build = Arc::clone(&build);
            tokio::spawn(async move { sched.drive(&build).await })
        };

        // Let cargo-test start its first (slow) step, then abort
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        build.cancel();
        driver.await.unwrap();

        let cargo_test = build.run("cargo-test").unwrap();
        assert_eq!(cargo_test.status, RunStatus::Cancelled);
        assert_eq!(cargo_test.steps[1].status, StepStatus::Cancelled);

        assert_eq!(build.run("package").unwrap().status, RunStatus::Cancelled);
        assert_eq!(build.run("publish").unwrap().status, RunStatus::Cancelled);
        assert!(!executor.executed().contains(&"package/pack".to_string()));
        assert!(!executor.executed().contains(&"publish/push".to_string()));
    }

    #[tokio::test]
    async fn test_secret_resolution_failure_fails_step() {
        let executor = Arc::new(ScriptedExecutor::default());
        let yaml = r#"
kind: pipeline
name: deploy
steps:
  - name: upload
    image: plugins/s3
    environment:
      AWS_SECRET_ACCESS_KEY:
        from_secret: aws_secret
"#;
        let sched = scheduler(yaml, Arc::clone(&executor));
        let build = sched.execute(push_event("master")).await;

        let run = build.run("deploy").unwrap();
        assert_eq!(run.status, RunStatus::Failure);
        assert_eq!(run.steps[0].status, StepStatus::Failure);
        assert!(run.steps[0].error.as_deref().unwrap().contains("aws_secret"));
        // The executor was never reached
        assert!(executor.executed().is_empty());
    }

    #[tokio::test]
    async fn test_secret_values_scrubbed_from_output() {
        let executor = Arc::new(ScriptedExecutor::default().echo_env());
        let yaml = r#"
kind: pipeline
name: deploy
steps:
  - name: upload
    image: plugins/s3
    environment:
      AWS_SECRET_ACCESS_KEY:
        from_secret: aws_secret
"#;
        let pipelines = config::load_str(yaml).unwrap();
        let mut secrets = StaticSecretStore::default();
        secrets.insert("aws_secret", "hunter2-credential");
        let sched =
            Scheduler::new(pipelines, Arc::clone(&executor) as _, Arc::new(secrets)).unwrap();
        let build = sched.execute(push_event("master")).await;

        let run = build.run("deploy").unwrap();
        assert_eq!(run.status, RunStatus::Success);
        let stdout = &run.steps[0].result.as_ref().unwrap().stdout;
        assert!(!stdout.contains("hunter2-credential"));
        assert!(stdout.contains("********"));
    }

    #[tokio::test]
    async fn test_sink_failure_does_not_alter_run_status() {
        let executor = Arc::new(ScriptedExecutor::default());
        let sink = Arc::new(FailingSink {
            calls: Mutex::new(Vec::new()),
        });
        let yaml = "kind: pipeline\nname: ci\nsteps:\n  - name: build\n    image: rust:1.77\n";
        let pipelines = config::load_str(yaml).unwrap();
        let sched = Scheduler::new(
            pipelines,
            Arc::clone(&executor) as _,
            Arc::new(StaticSecretStore::default()),
        )
        .unwrap()
        .with_sink(Arc::clone(&sink) as _);

        let build = sched.execute(push_event("master")).await;

        assert_eq!(build.run("ci").unwrap().status, RunStatus::Success);
        // Invoked exactly once for the terminal run
        assert_eq!(sink.calls.lock().unwrap().as_slice(), ["ci"]);
    }

    #[tokio::test]
    async fn test_cyclic_configuration_rejected_before_runs() {
        let yaml = r#"
kind: pipeline
name: a
depends_on: [b]
---
kind: pipeline
name: b
depends_on: [a]
"#;
        let pipelines = config::load_str(yaml).unwrap();
        let err = Scheduler::new(
            pipelines,
            Arc::new(ScriptedExecutor::default()),
            Arc::new(StaticSecretStore::default()),
        )
        .err()
        .unwrap();
        assert!(matches!(err, EngineError::CyclicDependency(_)));
    }
}
