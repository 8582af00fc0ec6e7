use std::time::Duration;

use eyre::Result;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use url::Url;

/// Structural edit against the materialized account collection.
#[derive(Debug, Clone, Deserialize)]
pub struct PatchEdit {
    pub path: String,
    pub op: PatchOp,
    #[serde(default)]
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Add,
    Replace,
    Remove,
}

#[derive(Debug)]
pub enum FeedEvent {
    Connected,
    /// The session ended; all previously delivered state is stale.
    Disconnected,
    Patch(Vec<PatchEdit>),
}

#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub endpoint: Url,
    /// Page size for the initial account query.
    pub query_limit: u32,
    /// Upper health-score bound of the subscription window, 1e6 scale.
    pub health_max: u64,
}

#[derive(Debug, Deserialize)]
struct FeedMessage {
    #[serde(default)]
    patch: Vec<PatchEdit>,
}

/// WebSocket subscriber for the account health feed. Reconnects with
/// exponential backoff and signals each disconnect so the consumer can
/// discard its materialized state.
pub struct FeedClient {
    config: FeedConfig,
}

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

impl FeedClient {
    pub fn new(config: FeedConfig) -> Self {
        Self { config }
    }

    fn subscribe_message(&self) -> String {
        serde_json::json!({
            "type": "subscribe",
            "channel": "accounts",
            "by": "healthScore",
            "healthMax": self.config.health_max,
            "limit": self.config.query_limit,
        })
        .to_string()
    }

    pub async fn run(self, tx: mpsc::Sender<FeedEvent>) -> Result<()> {
        let mut backoff = INITIAL_BACKOFF;
        loop {
            match self.session(&tx).await {
                Ok(()) => {
                    backoff = INITIAL_BACKOFF;
                    info!("feed session closed");
                }
                Err(e) => warn!("feed session failed: {e}"),
            }
            if tx.send(FeedEvent::Disconnected).await.is_err() {
                return Ok(());
            }
            tokio::time::sleep(backoff).await;
            backoff = (backoff * 2).min(MAX_BACKOFF);
        }
    }

    async fn session(&self, tx: &mpsc::Sender<FeedEvent>) -> Result<()> {
        info!("🔌 connecting to account feed at {}", self.config.endpoint);
        let (ws, _) = connect_async(self.config.endpoint.as_str()).await?;
        let (mut sink, mut stream) = ws.split();
        sink.send(Message::Text(self.subscribe_message())).await?;

        if tx.send(FeedEvent::Connected).await.is_err() {
            return Ok(());
        }

        while let Some(message) = stream.next().await {
            match message? {
                Message::Text(text) => match serde_json::from_str::<FeedMessage>(&text) {
                    Ok(msg) if !msg.patch.is_empty() => {
                        if tx.send(FeedEvent::Patch(msg.patch)).await.is_err() {
                            return Ok(());
                        }
                    }
                    Ok(_) => {}
                    Err(e) => debug!("unparseable feed message: {e}"),
                },
                Message::Ping(payload) => sink.send(Message::Pong(payload)).await?,
                Message::Close(frame) => {
                    info!("feed sent close: {frame:?}");
                    break;
                }
                _ => {}
            }
        }
        Ok(())
    }
}
