//! Run command handler
//!
//! Loads the pipeline configuration, wires up an executor and the
//! configured sinks, then drives the whole event to completion.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use colored::*;
use tracing::info;

use gantry_core::config;
use gantry_core::domain::run::{Run, RunStatus, StepStatus};
use gantry_engine::executor::{DryRunExecutor, StepExecutor};
use gantry_engine::scheduler::Scheduler;
use gantry_engine::secrets::SecretStore;
use gantry_engine::sink::RunSink;
use gantry_notify::{ArtifactStoreSink, WebhookSink};
use gantry_runner::podman::{PodmanConfig, PodmanExecutor, check_podman_available};
use gantry_runner::secrets::EnvSecretStore;

pub struct RunOptions {
    pub config: PathBuf,
    pub event: crate::event::EventArgs,
    pub no_exec: bool,
    pub workspace: Option<PathBuf>,
    pub step_timeout: u64,
    pub webhook: Option<String>,
    pub message: Option<String>,
    pub artifact_dir: Option<PathBuf>,
    pub artifact_endpoint: Option<String>,
    pub json: bool,
}

pub async fn handle_run(opts: RunOptions) -> Result<()> {
    let pipelines = config::load_path(&opts.config)
        .with_context(|| format!("Failed to load {}", opts.config.display()))?;

    let executor: Arc<dyn StepExecutor> = if opts.no_exec {
        Arc::new(DryRunExecutor)
    } else {
        check_podman_available()?;
        let mut config = PodmanConfig::default();
        if let Some(base) = &opts.workspace {
            config.base_dir = base.clone();
        }
        config.step_timeout = Duration::from_secs(opts.step_timeout);
        Arc::new(PodmanExecutor::new(config))
    };
    let secrets: Arc<dyn SecretStore> = Arc::new(EnvSecretStore::new());

    let mut scheduler =
        Scheduler::new(pipelines, executor, secrets).context("Configuration rejected")?;

    if let Some(url) = &opts.webhook {
        let template = opts
            .message
            .as_deref()
            .unwrap_or(WebhookSink::DEFAULT_TEMPLATE);
        let sink: Arc<dyn RunSink> = Arc::new(WebhookSink::new(url.clone(), template));
        scheduler = scheduler.with_sink(sink);
    }
    if let (Some(dir), Some(endpoint)) = (&opts.artifact_dir, &opts.artifact_endpoint) {
        let sink: Arc<dyn RunSink> = Arc::new(ArtifactStoreSink::new(endpoint.clone(), dir.clone()));
        scheduler = scheduler.with_sink(sink);
    }

    let ctx = opts.event.to_context();
    info!(
        event = %ctx.event,
        repo = %ctx.repo_slug(),
        build = ctx.build_number,
        "Starting build"
    );

    let build = scheduler.execute(ctx).await;
    let runs = build.runs();

    if opts.json {
        println!("{}", serde_json::to_string_pretty(&runs)?);
    } else {
        print_summary(&runs);
    }

    if runs.iter().any(|r| r.status == RunStatus::Failure) {
        bail!("Build failed");
    }
    Ok(())
}

fn print_summary(runs: &[Run]) {
    if runs.is_empty() {
        println!("{}", "No pipelines matched this event".yellow());
        return;
    }

    for run in runs {
        let status = match run.status {
            RunStatus::Success => run.status.to_string().green().bold(),
            RunStatus::Failure => run.status.to_string().red().bold(),
            RunStatus::Cancelled => run.status.to_string().yellow().bold(),
            _ => run.status.to_string().dimmed(),
        };
        println!("{} {}", run.pipeline.bold(), status);

        for outcome in &run.steps {
            let marker = match outcome.status {
                StepStatus::Success => "✓".green(),
                StepStatus::Failure => "✗".red(),
                StepStatus::Skipped => "-".dimmed(),
                StepStatus::Cancelled => "!".yellow(),
            };
            let duration = outcome
                .result
                .as_ref()
                .map(|r| format!(" ({} ms)", r.duration_ms))
                .unwrap_or_default();
            match &outcome.error {
                Some(error) => println!("  {} {}: {}", marker, outcome.step, error),
                None => println!("  {} {}{}", marker, outcome.step, duration),
            }
        }
    }
}
