use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use alloy_primitives::{Address, B256, U256};
use chrono::Utc;
use eyre::Result;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::discord::DiscordSink;
use crate::models::value_one;
use crate::store::EventStore;

/// Classification of one processing outcome for an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutcomeKind {
    Liquidation,
    YieldTooLow,
    NoOpportunityFound,
    SkipInsufficientCollateral,
    Error,
}

impl OutcomeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeKind::Liquidation => "LIQUIDATION",
            OutcomeKind::YieldTooLow => "YIELD_TOO_LOW",
            OutcomeKind::NoOpportunityFound => "NO_OPPORTUNITY_FOUND",
            OutcomeKind::SkipInsufficientCollateral => "SKIP_INSUFFICIENT_COLLATERAL",
            OutcomeKind::Error => "ERROR",
        }
    }

    /// High-severity kinds are pushed out immediately instead of waiting
    /// for the digest.
    pub fn is_high_severity(&self) -> bool {
        matches!(self, OutcomeKind::Liquidation | OutcomeKind::Error)
    }
}

#[derive(Debug, Clone)]
pub struct OutcomeEvent {
    pub kind: OutcomeKind,
    pub account: Address,
    pub health_score: u64,
    pub collateral_value: U256,
    pub yield_ref: Option<U256>,
    pub required_yield: Option<U256>,
    pub tx_hash: Option<B256>,
    pub detail: String,
}

/// Cloneable submission side of the reporter.
#[derive(Clone)]
pub struct ReporterHandle {
    tx: mpsc::UnboundedSender<OutcomeEvent>,
}

impl ReporterHandle {
    /// Bare channel pair for driving consumers without a reporter task.
    #[cfg(test)]
    pub fn test_pair() -> (Self, mpsc::UnboundedReceiver<OutcomeEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn report(&self, event: OutcomeEvent) {
        if self.tx.send(event).is_err() {
            warn!("reporter task is gone, outcome dropped");
        }
    }
}

struct AccountDigest {
    health_score: u64,
    collateral_value: U256,
    counts: HashMap<OutcomeKind, u64>,
    latest_yield: Option<(U256, U256)>,
}

pub struct ReporterConfig {
    /// Interval between digest flushes.
    pub interval: std::time::Duration,
    /// Append-only text log; disabled when unset.
    pub log_path: Option<PathBuf>,
    /// Accounts below this collateral value are left out of digests.
    pub dust_collateral_value: U256,
}

/// Collects outcome events, persists them, pushes high-severity ones to
/// Discord immediately, and emits a periodic per-account digest.
pub struct Reporter {
    rx: mpsc::UnboundedReceiver<OutcomeEvent>,
    config: ReporterConfig,
    discord: Option<Arc<DiscordSink>>,
    store: Option<EventStore>,
    pending: HashMap<Address, AccountDigest>,
}

impl Reporter {
    pub fn new(
        config: ReporterConfig,
        discord: Option<Arc<DiscordSink>>,
        store: Option<EventStore>,
    ) -> (ReporterHandle, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            ReporterHandle { tx },
            Self {
                rx,
                config,
                discord,
                store,
                pending: HashMap::new(),
            },
        )
    }

    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                event = self.rx.recv() => {
                    match event {
                        Some(event) => self.ingest(event).await,
                        None => {
                            self.flush_digest().await;
                            info!("reporter channel closed, shutting down");
                            return;
                        }
                    }
                }
                _ = ticker.tick() => self.flush_digest().await,
            }
        }
    }

    async fn ingest(&mut self, event: OutcomeEvent) {
        let line = format_event(&event);
        info!("{line}");

        if let Some(store) = &self.store {
            if let Err(e) = store.record(&event).await {
                error!("failed to persist outcome event: {e}");
            }
        }
        if let Some(path) = &self.config.log_path {
            if let Err(e) = append_line(path, &line).await {
                error!("failed to append to outcome log: {e}");
            }
        }
        if event.kind.is_high_severity() {
            if let Some(discord) = &self.discord {
                discord.push(&line).await;
            }
        }

        let digest = self
            .pending
            .entry(event.account)
            .or_insert_with(|| AccountDigest {
                health_score: event.health_score,
                collateral_value: event.collateral_value,
                counts: HashMap::new(),
                latest_yield: None,
            });
        digest.health_score = event.health_score;
        digest.collateral_value = event.collateral_value;
        *digest.counts.entry(event.kind).or_insert(0) += 1;
        if event.kind == OutcomeKind::YieldTooLow {
            if let (Some(y), Some(r)) = (event.yield_ref, event.required_yield) {
                digest.latest_yield = Some((y, r));
            }
        }
    }

    async fn flush_digest(&mut self) {
        let body = self.render_digest();
        info!("report digest:\n{body}");
        if body != "Nothing to report" {
            if let Some(discord) = &self.discord {
                discord.push(&body).await;
            }
        }
        self.pending.clear();
    }

    fn render_digest(&self) -> String {
        let mut lines: Vec<String> = Vec::new();
        let mut entries: Vec<_> = self.pending.iter().collect();
        entries.sort_by_key(|(_, d)| d.health_score);

        for (account, digest) in entries {
            if digest.collateral_value < self.config.dust_collateral_value {
                continue;
            }
            let mut counts: Vec<_> = digest.counts.iter().collect();
            counts.sort_by_key(|(kind, _)| kind.as_str());
            let counts = counts
                .iter()
                .map(|(kind, n)| format!("{}={n}", kind.as_str()))
                .collect::<Vec<_>>()
                .join(" ");
            let mut line = format!(
                "{account} health={:.4} collateral={} {counts}",
                digest.health_score as f64 / 1_000_000.0,
                format_ref_units(digest.collateral_value),
            );
            if let Some((y, r)) = digest.latest_yield {
                line.push_str(&format!(
                    " latest_yield={}/{}",
                    format_ref_units(y),
                    format_ref_units(r)
                ));
            }
            lines.push(line);
        }

        if lines.is_empty() {
            "Nothing to report".to_string()
        } else {
            lines.join("\n")
        }
    }
}

async fn append_line(path: &PathBuf, line: &str) -> Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(format!("{} {line}\n", Utc::now().to_rfc3339()).as_bytes())
        .await?;
    Ok(())
}

fn format_event(event: &OutcomeEvent) -> String {
    let mut line = format!(
        "[{}] account {} health {:.4}",
        event.kind.as_str(),
        event.account,
        event.health_score as f64 / 1_000_000.0,
    );
    if let Some(y) = event.yield_ref {
        line.push_str(&format!(" yield {}", format_ref_units(y)));
    }
    if let Some(r) = event.required_yield {
        line.push_str(&format!(" required {}", format_ref_units(r)));
    }
    if let Some(hash) = event.tx_hash {
        line.push_str(&format!(" tx {hash}"));
    }
    if !event.detail.is_empty() {
        line.push_str(&format!(": {}", event.detail));
    }
    line
}

/// Render an 18-decimal amount as a short decimal string.
pub fn format_ref_units(value: U256) -> String {
    let whole = value / value_one();
    let frac = (value % value_one()) / U256::from(10u64).pow(U256::from(14u64));
    format!("{whole}.{frac:04}")
}
