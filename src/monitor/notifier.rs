// Alert delivery

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::errors::{Result, ServiceError};

/// Destination for alert messages
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    /// Deliver one message. Failures are `Transport` errors.
    async fn notify(&self, message: &str) -> Result<()>;
}

/// Slack-compatible incoming webhook (`{"text": ...}` payload)
pub struct WebhookNotifier {
    url: String,
    client: Client,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ServiceError::Transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn notify(&self, message: &str) -> Result<()> {
        let payload = serde_json::json!({ "text": format!("ML App Alert: {}", message) });

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ServiceError::Transport(format!("webhook request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Transport(format!(
                "webhook returned {}: {}",
                status, body
            )));
        }

        tracing::info!(status = status.as_u16(), "Alert delivered");
        Ok(())
    }
}

/// Used when no webhook is configured: alerts only reach the local log
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn notify(&self, message: &str) -> Result<()> {
        tracing::warn!(alert = %message, "Alert raised (no webhook configured)");
        Ok(())
    }
}
