use async_trait::async_trait;
use tracing::{info, warn};
use uuid::Uuid;

/// Operator and user notification channel.
///
/// Best-effort by contract: a delivery failure must never abort a settlement
/// state transition, so these methods log and swallow their own errors.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify_operators(&self, message: &str);

    async fn notify_user(&self, user_id: Uuid, title: &str, body: &str, url: &str);
}

/// Slack-style incoming-webhook notifier for the ops channel. User
/// notifications are forwarded to the same channel; delivery to end users
/// is another service's job.
pub struct WebhookNotifier {
    client: reqwest::Client,
    webhook_url: Option<String>,
}

impl WebhookNotifier {
    pub fn new(webhook_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            webhook_url,
        }
    }

    async fn post(&self, text: &str) {
        let Some(url) = &self.webhook_url else {
            // No webhook configured; the tracing line above is the record
            return;
        };

        let payload = serde_json::json!({ "text": text });
        match self.client.post(url).json(&payload).send().await {
            Ok(response) if !response.status().is_success() => {
                warn!("⚠️ Ops webhook returned {}", response.status());
            }
            Ok(_) => {}
            Err(e) => warn!("⚠️ Ops webhook delivery failed: {e}"),
        }
    }
}

#[async_trait]
impl NotificationSink for WebhookNotifier {
    async fn notify_operators(&self, message: &str) {
        info!("📣 ops: {message}");
        self.post(message).await;
    }

    async fn notify_user(&self, user_id: Uuid, title: &str, body: &str, url: &str) {
        info!("📬 user {user_id}: {title} - {body} ({url})");
        self.post(&format!("[user {user_id}] {title}: {body} {url}"))
            .await;
    }
}
