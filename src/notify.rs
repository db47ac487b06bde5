//! Run notifications
//!
//! After each run a short message goes to the configured recipient through a
//! JSON webhook. Without configuration the notifier does nothing. Delivery is
//! fire-and-forget: failures are logged and never reach the run.

use crate::config::NotifyConfig;
use crate::storage::{RunRecord, RunStatus};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors that can occur while delivering a notification
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Invalid webhook URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Webhook request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Webhook answered HTTP {0}")]
    Status(u16),
}

/// Delivers a subject/body message somewhere
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, subject: &str, body: &str) -> Result<(), NotifyError>;
}

/// Used when notifications are not configured
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn send(&self, _subject: &str, _body: &str) -> Result<(), NotifyError> {
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    to: Option<&'a str>,
    subject: &'a str,
    body: &'a str,
}

/// Posts `{to, subject, body}` as JSON to a webhook
pub struct WebhookNotifier {
    client: Client,
    url: Url,
    recipient: Option<String>,
}

impl WebhookNotifier {
    pub fn new(url: &str, recipient: Option<String>) -> Result<Self, NotifyError> {
        let client = Client::builder().timeout(WEBHOOK_TIMEOUT).build()?;
        Ok(Self {
            client,
            url: Url::parse(url)?,
            recipient,
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, subject: &str, body: &str) -> Result<(), NotifyError> {
        let payload = WebhookPayload {
            to: self.recipient.as_deref(),
            subject,
            body,
        };

        let response = self
            .client
            .post(self.url.clone())
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status.as_u16()));
        }
        Ok(())
    }
}

/// Builds the notifier for the `[notify]` section, if any
///
/// A missing section, a missing webhook URL or a webhook that cannot be set
/// up all yield a [`NoopNotifier`].
pub fn from_config(config: Option<&NotifyConfig>) -> Arc<dyn Notifier> {
    let Some(webhook_url) = config.and_then(|c| c.webhook_url.as_deref()) else {
        return Arc::new(NoopNotifier);
    };
    let recipient = config.and_then(|c| c.recipient.clone());

    match WebhookNotifier::new(webhook_url, recipient) {
        Ok(notifier) => Arc::new(notifier),
        Err(e) => {
            tracing::warn!("Notifications disabled: {}", e);
            Arc::new(NoopNotifier)
        }
    }
}

/// Subject and body describing a finished run
pub fn run_message(source_name: &str, run: &RunRecord) -> (String, String) {
    let subject = format!("[driftwatch] {}: {}", source_name, run.status);
    let body = match run.status {
        RunStatus::Error => format!(
            "Run {} failed: {}",
            run.id,
            run.error_message.as_deref().unwrap_or("unknown error")
        ),
        _ => format!(
            "Run {} finished: {} created, {} changed",
            run.id, run.created_items, run.changed_items
        ),
    };
    (subject, body)
}

/// Sends the run message, logging rather than returning any failure
pub async fn announce(notifier: &dyn Notifier, source_name: &str, run: &RunRecord) {
    let (subject, body) = run_message(source_name, run);
    if let Err(e) = notifier.send(&subject, &body).await {
        tracing::warn!(source = source_name, run_id = run.id, "Notification failed: {}", e);
    }
}
