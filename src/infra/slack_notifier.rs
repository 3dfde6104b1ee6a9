use reqwest::blocking::Client;
use serde_json::json;
use tracing::debug;

use super::http_client::check_status;
use crate::app::ports::NotifierPort;
use crate::error::{PipelineError, Result};

/// Posts run reports to a Slack incoming webhook
pub struct SlackNotifier {
    client: Client,
    webhook_url: String,
}

impl SlackNotifier {
    pub fn new<S: Into<String>>(client: Client, webhook_url: S) -> Self {
        Self {
            client,
            webhook_url: webhook_url.into(),
        }
    }
}

impl NotifierPort for SlackNotifier {
    fn send(&self, text: &str) -> Result<()> {
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&json!({ "text": text }))
            .send()?;
        check_status(response, |status, message| PipelineError::Notify { status, message })?;
        debug!("Slack notification sent");
        Ok(())
    }
}
