//! Run sink seam
//!
//! Sinks observe runs as they reach a terminal state: chat notifications,
//! artifact uploads, package publishing. The scheduler invokes every
//! registered sink exactly once per terminal run and logs sink failures
//! without ever altering the run's recorded status.

use async_trait::async_trait;

use gantry_core::domain::event::EventContext;
use gantry_core::domain::run::Run;

pub type SinkError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[async_trait]
pub trait RunSink: Send + Sync {
    /// Human-readable sink name, used in log output
    fn name(&self) -> &str;

    async fn publish(&self, run: &Run, event: &EventContext) -> Result<(), SinkError>;
}
