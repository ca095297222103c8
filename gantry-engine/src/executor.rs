//! Executor seam
//!
//! The scheduler hands each executable step to a [`StepExecutor`] and
//! records the returned [`StepResult`]. A non-zero exit code is a normal
//! result; [`ExecutorError`] is reserved for infrastructure failures
//! (container could not start, runtime missing), which the scheduler
//! records as a failed step with an error message.

use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use gantry_core::domain::event::EventContext;
use gantry_core::domain::run::StepResult;

/// Errors from the execution environment itself
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("failed to launch container for image '{image}': {message}")]
    Launch { image: String, message: String },

    #[error("i/o failure during step execution: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Named scratch volume to mount into the step's environment
///
/// The executor owns the mapping from volume name to backing directory;
/// volumes with the same name within one event share storage. Concurrent
/// writers are a configuration responsibility (sequence pipelines via
/// `depends_on`), not enforced here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeRef {
    pub name: String,
}

/// Everything the executor needs to run one step
///
/// Environment values arrive fully resolved; secret references have
/// already been exchanged for their values and must not be logged.
#[derive(Debug, Clone)]
pub struct StepRequest {
    pub run_id: Uuid,
    pub pipeline: String,
    pub step: String,
    pub image: String,
    /// Commands run sequentially in one environment; the first non-zero
    /// exit aborts the remainder of the list
    pub commands: Vec<String>,
    pub environment: BTreeMap<String, String>,
    /// Opaque plugin settings, passed through unmodified
    pub settings: BTreeMap<String, serde_yaml::Value>,
    pub volumes: Vec<VolumeRef>,
    pub event: EventContext,
}

/// Runs one step in an isolated environment
#[async_trait]
pub trait StepExecutor: Send + Sync {
    async fn run_step(&self, request: &StepRequest) -> Result<StepResult, ExecutorError>;
}

/// Executor that succeeds every step without running anything
///
/// Used by `gantry plan`-style dry runs and by scheduler tests.
#[derive(Debug, Default)]
pub struct DryRunExecutor;

#[async_trait]
impl StepExecutor for DryRunExecutor {
    async fn run_step(&self, request: &StepRequest) -> Result<StepResult, ExecutorError> {
        Ok(StepResult {
            exit_code: 0,
            stdout: format!(
                "dry-run: {}/{} ({} command(s))\n",
                request.pipeline,
                request.step,
                request.commands.len()
            ),
            stderr: String::new(),
            duration_ms: 0,
        })
    }
}
