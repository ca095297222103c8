//! Configuration loading
//!
//! A configuration file is a YAML stream of pipeline documents (or a single
//! document holding a list of pipelines). Loading validates each document
//! and the set as a whole; graph-level validation (unknown `depends_on`
//! names, cycles) lives in the engine, next to the graph it protects.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::domain::pipeline::PipelineDefinition;

/// Errors raised while loading or validating a configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("duplicate pipeline name: {0}")]
    DuplicatePipeline(String),

    #[error("pipeline '{pipeline}': duplicate step name: {step}")]
    DuplicateStep { pipeline: String, step: String },

    #[error("pipeline '{pipeline}': {message}")]
    Invalid { pipeline: String, message: String },
}

/// Loads and validates a configuration file from disk
pub fn load_path(path: impl AsRef<Path>) -> Result<Vec<PipelineDefinition>, ConfigError> {
    let path = path.as_ref();
    let input = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_str(&input)
}

/// Loads and validates a configuration from a YAML string
pub fn load_str(input: &str) -> Result<Vec<PipelineDefinition>, ConfigError> {
    let mut pipelines = Vec::new();

    for document in serde_yaml::Deserializer::from_str(input) {
        let value = serde_yaml::Value::deserialize(document)?;

        // Empty documents (e.g. a trailing `---`) are tolerated
        if matches!(value, serde_yaml::Value::Null) {
            continue;
        }

        match value {
            serde_yaml::Value::Sequence(items) => {
                for item in items {
                    pipelines.push(serde_yaml::from_value(item)?);
                }
            }
            other => pipelines.push(serde_yaml::from_value(other)?),
        }
    }

    validate(&pipelines)?;
    Ok(pipelines)
}

/// Serializes pipelines back into a multi-document YAML stream
///
/// Field order is serde-defined, not input-defined; values round-trip
/// exactly because empty/default fields are skipped on both sides.
pub fn to_yaml(pipelines: &[PipelineDefinition]) -> Result<String, ConfigError> {
    let mut out = String::new();
    for pipeline in pipelines {
        out.push_str("---\n");
        out.push_str(&serde_yaml::to_string(pipeline)?);
    }
    Ok(out)
}

fn validate(pipelines: &[PipelineDefinition]) -> Result<(), ConfigError> {
    let mut names = HashSet::new();

    for pipeline in pipelines {
        if pipeline.name.trim().is_empty() {
            return Err(ConfigError::Invalid {
                pipeline: pipeline.name.clone(),
                message: "pipeline name must not be empty".to_string(),
            });
        }

        if pipeline.kind != "pipeline" {
            return Err(ConfigError::Invalid {
                pipeline: pipeline.name.clone(),
                message: format!("unsupported document kind '{}'", pipeline.kind),
            });
        }

        if !names.insert(pipeline.name.clone()) {
            return Err(ConfigError::DuplicatePipeline(pipeline.name.clone()));
        }

        let mut step_names = HashSet::new();
        for step in &pipeline.steps {
            if step.name.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    pipeline: pipeline.name.clone(),
                    message: "step name must not be empty".to_string(),
                });
            }

            if step.image.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    pipeline: pipeline.name.clone(),
                    message: format!("step '{}' has no image", step.name),
                });
            }

            if !step_names.insert(step.name.clone()) {
                return Err(ConfigError::DuplicateStep {
                    pipeline: pipeline.name.clone(),
                    step: step.name.clone(),
                });
            }
        }
    }

    Ok(())
}
