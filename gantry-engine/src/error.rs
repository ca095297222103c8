//! Engine error taxonomy
//!
//! Configuration-level problems (cycles, dangling dependency names) are
//! fatal and abort the whole scheduling attempt before any run exists. A
//! trigger mismatch is not an error; it simply produces no run.

use thiserror::Error;

use gantry_core::config::ConfigError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A `depends_on` entry names a pipeline with no definition
    #[error("pipeline '{from}' depends on unknown pipeline '{to}'")]
    DependencyUnmet { from: String, to: String },

    /// The pipeline dependency graph is not acyclic
    #[error("pipeline dependency graph contains a cycle through '{0}'")]
    CyclicDependency(String),
}
