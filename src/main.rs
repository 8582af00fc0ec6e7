use std::sync::Arc;

use alloy_provider::ProviderBuilder;
use alloy_signer_local::PrivateKeySigner;
use clap::Parser;
use eyre::Result;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use liqmon::config::{Cli, Config};
use liqmon::discord::DiscordSink;
use liqmon::feed::{FeedClient, FeedConfig};
use liqmon::ledger::onchain::OnchainLedger;
use liqmon::ledger::Ledger;
use liqmon::monitor::Monitor;
use liqmon::quote::QuoteClient;
use liqmon::reporter::{Reporter, ReporterConfig};
use liqmon::selector::SelectorSettings;
use liqmon::store::EventStore;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env(&cli)?;
    info!("🚀 starting liqmon on {}", config.network.name);

    let signer: PrivateKeySigner = config.private_key.parse()?;
    let liquidator = signer.address();
    let provider = Arc::new(ProviderBuilder::new().on_http(config.rpc_url.parse()?).boxed());
    let ledger: Arc<dyn Ledger> = Arc::new(OnchainLedger::new(
        provider,
        config.rpc_url.clone(),
        signer,
        config.addresses.clone(),
        config.relay_url.clone(),
    )?);

    let settings = SelectorSettings {
        liquidator,
        reference_asset: config.addresses.reference_asset,
        receiver: config.receiver,
        strategies: config.strategies.clone(),
        min_yield_ref: config.min_yield_ref,
        gate_net_of_gas: config.gate_net_of_gas,
        dust_collateral_value: config.dust_collateral_value,
        fee_multiplier_bps: config.fee_multiplier_bps,
        gas_limit: config.gas_limit,
        use_private_relay: config.use_private_relay,
    };

    let discord = config
        .discord_webhook
        .clone()
        .map(|url| Arc::new(DiscordSink::new(url)));
    let store = match &config.database_path {
        Some(path) => Some(EventStore::connect(path).await?),
        None => None,
    };
    let (reporter_handle, reporter) = Reporter::new(
        ReporterConfig {
            interval: std::time::Duration::from_secs(config.report_interval_secs),
            log_path: config.log_path.clone(),
            dust_collateral_value: config.dust_collateral_value,
        },
        discord,
        store,
    );
    tokio::spawn(reporter.run());

    let quote = config
        .quote_url
        .clone()
        .map(|url| Arc::new(QuoteClient::new(url)));
    let monitor = Arc::new(Monitor::new(ledger, quote, settings, reporter_handle));

    if let Some(account) = config.designated_account {
        let outcome = monitor.run_designated(account).await?;
        info!("designated account attempt finished: {outcome:?}");
        return Ok(());
    }

    let (tx, rx) = mpsc::channel(256);
    let feed = FeedClient::new(FeedConfig {
        endpoint: config.network.feed_url.clone(),
        query_limit: config.network.query_limit,
        health_max: config.network.health_max,
    });
    tokio::spawn(async move {
        if let Err(e) = feed.run(tx).await {
            tracing::error!("feed client stopped: {e}");
        }
    });

    monitor.run(rx).await;
    Ok(())
}
