use tracing::warn;
use url::Url;

/// Fire-and-forget Discord webhook. Delivery failures are logged and
/// swallowed; reporting never blocks the liquidation path.
pub struct DiscordSink {
    http: reqwest::Client,
    webhook_url: Url,
}

impl DiscordSink {
    pub fn new(webhook_url: Url) -> Self {
        Self {
            http: reqwest::Client::new(),
            webhook_url,
        }
    }

    pub async fn push(&self, content: &str) {
        // Discord caps message content at 2000 characters.
        let content: String = content.chars().take(2000).collect();
        let body = serde_json::json!({ "content": content });
        match self.http.post(self.webhook_url.clone()).json(&body).send().await {
            Ok(resp) if !resp.status().is_success() => {
                warn!("discord webhook returned {}", resp.status());
            }
            Ok(_) => {}
            Err(e) => warn!("discord webhook delivery failed: {e}"),
        }
    }
}
