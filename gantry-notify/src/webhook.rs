//! Chat webhook sink
//!
//! Posts a rendered message for every terminal run to a chat webhook URL
//! (Slack-compatible `{"text": ...}` payload).

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use gantry_core::domain::event::EventContext;
use gantry_core::domain::run::Run;
use gantry_engine::{RunSink, SinkError};

use crate::error::NotifyError;
use crate::template::render;

pub struct WebhookSink {
    url: String,
    template: String,
    client: Client,
}

impl WebhookSink {
    pub const DEFAULT_TEMPLATE: &'static str = "{{ repo.slug }} build {{ build.number }}: \
         {{ pipeline.name }} {{ build.status }} \
         ({{ commit.sha }} by {{ commit.author }})";

    pub fn new(url: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            template: template.into(),
            client: Client::new(),
        }
    }
}

#[async_trait]
impl RunSink for WebhookSink {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn publish(&self, run: &Run, event: &EventContext) -> Result<(), SinkError> {
        let message = render(&self.template, run, event)?;

        let response = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({ "text": message }))
            .send()
            .await
            .map_err(NotifyError::from)?;

        if !response.status().is_success() {
            return Err(NotifyError::UnexpectedStatus {
                endpoint: self.url.clone(),
                status: response.status().as_u16(),
            }
            .into());
        }

        debug!(pipeline = %run.pipeline, "webhook notification delivered");
        Ok(())
    }
}
