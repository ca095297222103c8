//! Podman step executor
//!
//! Runs each step in its own fresh container:
//! - `podman run --rm` with the pipeline workspace mounted at /workspace
//!   and each named volume at /vol/<name>
//! - command list executed through `sh -ec`, so the first non-zero exit
//!   aborts the remaining commands of the step
//! - steps without commands run the image's own entrypoint with their
//!   `settings` exposed as PLUGIN_* environment variables
//! - wall-clock timeout per step; a timeout surfaces as exit code 124

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, info, warn};

use gantry_core::domain::run::StepResult;
use gantry_engine::{ExecutorError, StepExecutor, StepRequest};

use crate::workspace::EventWorkspace;

// podman itself failed (image missing, daemonless runtime error), as
// opposed to the step's own command exiting non-zero
const PODMAN_ERROR_EXIT: i32 = 125;

/// Checks that podman is installed and responding
pub fn check_podman_available() -> Result<()> {
    let output = std::process::Command::new("podman")
        .arg("--version")
        .output()
        .context("Failed to execute 'podman --version'. Is podman installed?")?;

    if !output.status.success() {
        anyhow::bail!("Podman is not working correctly");
    }

    let version = String::from_utf8_lossy(&output.stdout);
    info!("Podman is available: {}", version.trim());

    Ok(())
}

/// Executor configuration
#[derive(Debug, Clone)]
pub struct PodmanConfig {
    /// Base directory for per-event workspaces and volumes
    pub base_dir: PathBuf,
    /// Wall-clock limit per step
    pub step_timeout: Duration,
    /// Container runtime binary
    pub binary: String,
}

impl Default for PodmanConfig {
    fn default() -> Self {
        Self {
            base_dir: std::env::temp_dir().join("gantry"),
            step_timeout: Duration::from_secs(1800),
            binary: "podman".to_string(),
        }
    }
}

/// Container-backed step executor
pub struct PodmanExecutor {
    config: PodmanConfig,
}

impl PodmanExecutor {
    pub fn new(config: PodmanConfig) -> Self {
        Self { config }
    }

    async fn remove_container(&self, name: &str) {
        let result = tokio::process::Command::new(&self.config.binary)
            .arg("rm")
            .arg("-f")
            .arg(name)
            .output()
            .await;

        if let Err(e) = result {
            warn!("Failed to remove container {}: {}", name, e);
        }
    }
}

#[async_trait]
impl StepExecutor for PodmanExecutor {
    async fn run_step(&self, request: &StepRequest) -> Result<StepResult, ExecutorError> {
        let workspace = EventWorkspace::new(&self.config.base_dir, &request.event)?;
        let work_dir = workspace.pipeline_dir(&request.pipeline)?;
        let container_name = container_name(request);

        let mut command = tokio::process::Command::new(&self.config.binary);
        command
            .arg("run")
            .arg("--rm")
            .arg("--name")
            .arg(&container_name)
            .arg("-v")
            .arg(format!("{}:/workspace", work_dir.display()))
            .arg("-w")
            .arg("/workspace");

        for volume in &request.volumes {
            let dir = workspace.volume_dir(&volume.name)?;
            command
                .arg("-v")
                .arg(format!("{}:/vol/{}", dir.display(), volume.name));
        }

        // Values may contain resolved secrets and must not be logged
        for (key, value) in &request.environment {
            command.arg("-e").arg(format!("{}={}", key, value));
        }
        for (key, value) in settings_env(&request.settings) {
            command.arg("-e").arg(format!("{}={}", key, value));
        }

        if request.commands.is_empty() {
            // Plugin-style step: the image's entrypoint does the work
            command.arg(&request.image);
        } else {
            command
                .arg("--entrypoint")
                .arg("/bin/sh")
                .arg(&request.image)
                .arg("-ec")
                .arg(request.commands.join("\n"));
        }

        debug!(
            "Starting container {} for step {}/{} (image: {})",
            container_name, request.pipeline, request.step, request.image
        );

        let started = Instant::now();
        let output = match tokio::time::timeout(self.config.step_timeout, command.output()).await {
            Ok(result) => result.map_err(|e| ExecutorError::Launch {
                image: request.image.clone(),
                message: e.to_string(),
            })?,
            Err(_) => {
                warn!(
                    "Step {}/{} timed out after {:?}, removing container {}",
                    request.pipeline, request.step, self.config.step_timeout, container_name
                );
                self.remove_container(&container_name).await;

                return Ok(StepResult {
                    exit_code: 124,
                    stdout: String::new(),
                    stderr: format!(
                        "step timed out after {} seconds",
                        self.config.step_timeout.as_secs()
                    ),
                    duration_ms: started.elapsed().as_millis() as u64,
                });
            }
        };

        let exit_code = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if exit_code == PODMAN_ERROR_EXIT {
            return Err(ExecutorError::Launch {
                image: request.image.clone(),
                message: stderr.trim().to_string(),
            });
        }

        debug!(
            "Step {}/{} finished: exit_code={}, stdout_len={}, stderr_len={}",
            request.pipeline,
            request.step,
            exit_code,
            stdout.len(),
            stderr.len()
        );

        Ok(StepResult {
            exit_code,
            stdout,
            stderr,
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }
}

/// Stable per-step container name
fn container_name(request: &StepRequest) -> String {
    let step: String = request
        .step
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    format!("gantry-{}-{}", request.run_id, step)
}

/// Flattens plugin `settings` into PLUGIN_* environment variables
///
/// Scalars are stringified; sequences of scalars become comma-joined
/// lists. Nested mappings are skipped with a warning.
fn settings_env(
    settings: &std::collections::BTreeMap<String, serde_yaml::Value>,
) -> Vec<(String, String)> {
    let mut env = Vec::new();

    for (key, value) in settings {
        let name = format!("PLUGIN_{}", key.to_uppercase());
        match scalar(value) {
            Some(v) => env.push((name, v)),
            None => match value {
                serde_yaml::Value::Sequence(items) => {
                    let joined: Vec<String> = items.iter().filter_map(scalar).collect();
                    env.push((name, joined.join(",")));
                }
                _ => warn!("Skipping non-scalar plugin setting '{}'", key),
            },
        }
    }

    env
}

fn scalar(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
