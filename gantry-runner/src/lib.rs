//! Gantry Runner
//!
//! The execution side of the engine: a [`gantry_engine::StepExecutor`]
//! backed by the podman CLI (one fresh container per step), per-event
//! workspace and named volume directories on the host, and a secret store
//! that reads from the process environment.

pub mod podman;
pub mod secrets;
pub mod workspace;

pub use podman::{PodmanConfig, PodmanExecutor, check_podman_available};
pub use secrets::EnvSecretStore;
pub use workspace::EventWorkspace;
