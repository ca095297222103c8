//! Gantry Engine
//!
//! The pipeline scheduler: resolves inter-pipeline `depends_on` edges into
//! a validated DAG, evaluates triggers against incoming events, drives
//! eligible runs to completion through a pluggable [`executor::StepExecutor`],
//! and publishes terminal runs to registered [`sink::RunSink`]s.
//!
//! Execution isolation (containers), secret backends, and notification
//! delivery live behind trait seams; this crate owns only the scheduling
//! semantics.

pub mod error;
pub mod executor;
pub mod graph;
pub mod scheduler;
pub mod secrets;
pub mod sink;

pub use error::EngineError;
pub use executor::{DryRunExecutor, ExecutorError, StepExecutor, StepRequest, VolumeRef};
pub use scheduler::{Build, Scheduler};
pub use secrets::{SecretError, SecretStore, StaticSecretStore};
pub use sink::{RunSink, SinkError};
