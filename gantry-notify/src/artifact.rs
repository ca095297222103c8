//! Artifact store sink
//!
//! Uploads the files of a configured directory to an HTTP object store
//! after a successful run, one PUT per file under
//! `<endpoint>/<build_number>/<filename>`. Runs that did not succeed
//! publish nothing.

use std::path::PathBuf;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info};

use gantry_core::domain::event::EventContext;
use gantry_core::domain::run::{Run, RunStatus};
use gantry_engine::{RunSink, SinkError};

use crate::error::NotifyError;

pub struct ArtifactStoreSink {
    endpoint: String,
    source_dir: PathBuf,
    client: Client,
}

impl ArtifactStoreSink {
    pub fn new(endpoint: impl Into<String>, source_dir: impl Into<PathBuf>) -> Self {
        let endpoint = endpoint.into();
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            source_dir: source_dir.into(),
            client: Client::new(),
        }
    }

    fn object_url(&self, build_number: u64, file_name: &str) -> String {
        format!("{}/{}/{}", self.endpoint, build_number, file_name)
    }
}

#[async_trait]
impl RunSink for ArtifactStoreSink {
    fn name(&self) -> &str {
        "artifact-store"
    }

    async fn publish(&self, run: &Run, event: &EventContext) -> Result<(), SinkError> {
        if run.status != RunStatus::Success {
            debug!(
                pipeline = %run.pipeline,
                status = %run.status,
                "run not successful, skipping artifact upload"
            );
            return Ok(());
        }

        let mut entries = match tokio::fs::read_dir(&self.source_dir).await {
            Ok(entries) => entries,
            // No artifact directory means nothing was produced
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(NotifyError::from(e).into()),
        };

        let mut uploaded = 0usize;
        while let Some(entry) = entries.next_entry().await.map_err(NotifyError::from)? {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            let file_name = entry.file_name().to_string_lossy().to_string();
            let url = self.object_url(event.build_number, &file_name);
            let body = tokio::fs::read(&path).await.map_err(NotifyError::from)?;

            let response = self
                .client
                .put(&url)
                .body(body)
                .send()
                .await
                .map_err(NotifyError::from)?;

            if !response.status().is_success() {
                return Err(NotifyError::UnexpectedStatus {
                    endpoint: url,
                    status: response.status().as_u16(),
                }
                .into());
            }

            uploaded += 1;
        }

        info!(
            pipeline = %run.pipeline,
            uploaded,
            "artifact upload complete"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_url_normalizes_endpoint() {
        let sink = ArtifactStoreSink::new("https://store.example.com/builds/", "/tmp/out");
        assert_eq!(
            sink.object_url(42, "gantry_0.1.0_amd64.deb"),
            "https://store.example.com/builds/42/gantry_0.1.0_amd64.deb"
        );
    }
}
