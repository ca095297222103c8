//! Environment-backed secret store
//!
//! Secrets are provided to the gantry process as environment variables
//! with a fixed prefix: the reference `from_secret: slack_webhook` resolves
//! from `GANTRY_SECRET_SLACK_WEBHOOK`. Values are handed to the engine at
//! dispatch time and are never logged here.

use gantry_engine::{SecretError, SecretStore};

pub struct EnvSecretStore {
    prefix: String,
}

impl EnvSecretStore {
    pub fn new() -> Self {
        Self {
            prefix: "GANTRY_SECRET_".to_string(),
        }
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    fn var_name(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name.to_uppercase())
    }
}

impl Default for EnvSecretStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SecretStore for EnvSecretStore {
    fn resolve(&self, name: &str) -> Result<String, SecretError> {
        std::env::var(self.var_name(name)).map_err(|_| SecretError::NotFound(name.to_string()))
    }
}
