//! Gantry Notify
//!
//! Sinks for terminal pipeline runs: chat webhook notifications with
//! rendered message templates, and artifact upload to an HTTP object
//! store. Sinks implement [`gantry_engine::RunSink`]; the scheduler
//! isolates their failures from run status.
//!
//! # Example
//!
//! ```no_run
//! use gantry_notify::WebhookSink;
//!
//! let sink = WebhookSink::new(
//!     "https://hooks.example.com/services/T000/B000/XXXX",
//!     WebhookSink::DEFAULT_TEMPLATE,
//! );
//! ```

pub mod artifact;
pub mod error;
pub mod template;
pub mod webhook;

pub use artifact::ArtifactStoreSink;
pub use error::{NotifyError, Result};
pub use webhook::WebhookSink;
