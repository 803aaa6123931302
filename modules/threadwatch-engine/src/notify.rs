use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};

use threadwatch_common::{AlertEvent, NewItemsEvent, WatchError};

/// Where change and alert events go.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &NewItemsEvent) -> Result<(), WatchError>;

    /// A target kept failing across cycles.
    async fn alert(&self, event: &AlertEvent) -> Result<(), WatchError>;
}

/// Writes events to the log. Used when no webhook is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, event: &NewItemsEvent) -> Result<(), WatchError> {
        info!(
            target_id = event.target.id.as_str(),
            variant = %event.target.variant,
            new_items = event.new_items.len(),
            count_before = ?event.count_before,
            count_after = ?event.count_after,
            "New items"
        );
        for item in &event.new_items {
            info!(
                target_id = event.target.id.as_str(),
                identity = item.identity.as_deref().unwrap_or("-"),
                author = item.author.as_deref().unwrap_or(""),
                text = item.text.as_deref().unwrap_or(""),
                "New item"
            );
        }
        Ok(())
    }

    async fn alert(&self, event: &AlertEvent) -> Result<(), WatchError> {
        warn!(
            target_id = event.target.id.as_str(),
            failures = event.consecutive_failures,
            last_error = event.last_error.as_str(),
            "Target keeps failing"
        );
        Ok(())
    }
}

/// POSTs each event as JSON to a webhook.
pub struct WebhookNotifier {
    webhook_url: String,
    http: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(webhook_url: String) -> Self {
        Self {
            webhook_url,
            http: reqwest::Client::new(),
        }
    }

    async fn post(&self, payload: serde_json::Value) -> Result<(), WatchError> {
        let resp = self
            .http
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| WatchError::Notification(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Webhook returned non-success");
            return Err(WatchError::Notification(format!(
                "webhook returned {status}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, event: &NewItemsEvent) -> Result<(), WatchError> {
        self.post(json!({ "kind": "new-items", "event": event })).await
    }

    async fn alert(&self, event: &AlertEvent) -> Result<(), WatchError> {
        self.post(json!({ "kind": "alert", "event": event })).await
    }
}
