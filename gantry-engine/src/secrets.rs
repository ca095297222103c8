//! Secret store seam
//!
//! Steps reference secrets by name (`from_secret`); the scheduler resolves
//! them at dispatch time through a [`SecretStore`]. Resolved values are
//! injected into the step environment and scrubbed from captured output;
//! they are never written back into configuration or logs. A resolution
//! failure fails the step the same way a command failure does.

use std::collections::BTreeMap;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("secret '{0}' is not defined")]
    NotFound(String),

    #[error("secret store unavailable: {0}")]
    Unavailable(String),
}

pub trait SecretStore: Send + Sync {
    fn resolve(&self, name: &str) -> Result<String, SecretError>;
}

/// In-memory secret store
///
/// Useful for tests and for small single-host deployments where secrets
/// are loaded from the environment at startup.
#[derive(Debug, Default)]
pub struct StaticSecretStore {
    values: BTreeMap<String, String>,
}

impl StaticSecretStore {
    pub fn new(values: BTreeMap<String, String>) -> Self {
        Self { values }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }
}

impl SecretStore for StaticSecretStore {
    fn resolve(&self, name: &str) -> Result<String, SecretError> {
        self.values
            .get(name)
            .cloned()
            .ok_or_else(|| SecretError::NotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_store_resolves_known_names() {
        let mut store = StaticSecretStore::default();
        store.insert("slack_webhook", "https://hooks.example.com/x");

        assert_eq!(
            store.resolve("slack_webhook").unwrap(),
            "https://hooks.example.com/x"
        );
        assert!(matches!(
            store.resolve("missing").unwrap_err(),
            SecretError::NotFound(name) if name == "missing"
        ));
    }
}
