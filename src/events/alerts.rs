//! Alert sinks for failed executions.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, error, warn};

use super::{Event, EventHandler, FailureAlert};
use crate::execution::USER_AGENT;

/// Logs every failure alert at error level.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlertLogger;

#[async_trait]
impl EventHandler for AlertLogger {
    async fn handle(&self, event: &Event) {
        if let Event::ExecutionFailed { alert, .. } = event {
            error!(
                job_id = %alert.job_id,
                target_url = %alert.target_url,
                http_status = ?alert.http_status,
                attempts = alert.attempts,
                occurrence = %alert.occurrence,
                error = %alert.error,
                "Job execution failed"
            );
        }
    }
}

/// Posts failure alerts as JSON to a webhook.
///
/// Delivery is best effort: a failed post is logged and never retried.
#[derive(Debug, Clone)]
pub struct WebhookAlerter {
    url: String,
    client: reqwest::Client,
}

impl WebhookAlerter {
    /// Default timeout for one alert post.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Create an alerter posting to `url`.
    pub fn new(url: impl Into<String>) -> Result<Self, reqwest::Error> {
        Self::with_timeout(url, Self::DEFAULT_TIMEOUT)
    }

    /// Create an alerter with a custom request timeout.
    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }

    /// Webhook URL alerts are posted to.
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn post(&self, alert: &FailureAlert) {
        match self.client.post(&self.url).json(alert).send().await {
            Ok(response) if response.status().is_success() => {
                debug!(job_id = %alert.job_id, url = %self.url, "Alert delivered");
            }
            Ok(response) => {
                warn!(
                    job_id = %alert.job_id,
                    url = %self.url,
                    status = response.status().as_u16(),
                    "Alert webhook rejected alert"
                );
            }
            Err(e) => {
                warn!(job_id = %alert.job_id, url = %self.url, error = %e, "Failed to post alert");
            }
        }
    }
}

#[async_trait]
impl EventHandler for WebhookAlerter {
    async fn handle(&self, event: &Event) {
        if let Event::ExecutionFailed { alert, .. } = event {
            self.post(alert).await;
        }
    }
}
