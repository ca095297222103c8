//! Pipeline domain types
//!
//! These structs double as the on-disk YAML form: a configuration file is a
//! stream of pipeline documents, each deserializing into a
//! [`PipelineDefinition`]. Serialization skips empty/default fields so a
//! load → re-serialize round trip stays value-exact.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::trigger::Conditions;

/// One pipeline document from the configuration
///
/// Immutable after load; runs reference definitions by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineDefinition {
    /// Document kind, always "pipeline"
    pub kind: String,
    /// Execution backend tag (e.g. "docker")
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clone: Option<CloneSettings>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<Step>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<VolumeDecl>,
    #[serde(default, skip_serializing_if = "Conditions::is_empty")]
    pub trigger: Conditions,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

impl PipelineDefinition {
    /// Looks up a declared volume by name
    pub fn volume(&self, name: &str) -> Option<&VolumeDecl> {
        self.volumes.iter().find(|v| v.name == name)
    }
}

/// Clone behaviour for the pipeline workspace
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CloneSettings {
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub disable: bool,
}

/// One unit of command execution inside a pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub name: String,
    /// Container image reference
    pub image: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, EnvValue>,
    #[serde(default, skip_serializing_if = "Conditions::is_empty")]
    pub when: Conditions,
    /// Opaque plugin settings, passed through to the executor as-is
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub settings: BTreeMap<String, serde_yaml::Value>,
    #[serde(default, skip_serializing_if = "FailurePolicy::is_propagate")]
    pub failure: FailurePolicy,
}

/// Environment binding: a literal value or a secret reference
///
/// Secret references are resolved at dispatch time and must never be
/// written back to disk or into logs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnvValue {
    Literal(String),
    Secret { from_secret: String },
}

/// What a failing step does to the rest of its run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Failure marks the run failed and halts remaining steps
    #[default]
    Propagate,
    /// Failure is recorded but the run continues with its previous status
    Ignore,
}

impl FailurePolicy {
    pub fn is_propagate(&self) -> bool {
        matches!(self, FailurePolicy::Propagate)
    }
}

/// Named scratch volume shared between steps (and, via `depends_on`
/// sequencing, between pipelines) of one event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeDecl {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp: Option<TempVolume>,
}

/// Empty marker mapping for temp volumes (`temp: {}`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TempVolume {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_value_literal_and_secret() {
        let yaml = "RUST_BACKTRACE: '1'\nAWS_SECRET_ACCESS_KEY:\n  from_secret: aws_secret\n";
        let env: BTreeMap<String, EnvValue> = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(
            env.get("RUST_BACKTRACE"),
            Some(&EnvValue::Literal("1".to_string()))
        );
        assert_eq!(
            env.get("AWS_SECRET_ACCESS_KEY"),
            Some(&EnvValue::Secret {
                from_secret: "aws_secret".to_string()
            })
        );
    }

    #[test]
    fn test_failure_policy_parses_ignore() {
        let yaml = "name: notify\nimage: plugins/slack\nfailure: ignore\n";
        let step: Step = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(step.failure, FailurePolicy::Ignore);

        let yaml = "name: build\nimage: rust:1.77\n";
        let step: Step = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(step.failure, FailurePolicy::Propagate);
    }

    #[test]
    fn test_step_serialization_skips_defaults() {
        let step = Step {
            name: "build".to_string(),
            image: "rust:1.77".to_string(),
            commands: vec!["cargo build".to_string()],
            environment: BTreeMap::new(),
            when: Conditions::default(),
            settings: BTreeMap::new(),
            failure: FailurePolicy::Propagate,
        };

        let yaml = serde_yaml::to_string(&step).unwrap();
        assert!(!yaml.contains("environment"));
        assert!(!yaml.contains("when"));
        assert!(!yaml.contains("failure"));
    }
}
