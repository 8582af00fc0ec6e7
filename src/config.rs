use std::path::PathBuf;
use std::str::FromStr;

use alloy_primitives::{Address, U256};
use clap::Parser;
use eyre::Result;
use tracing::warn;
use url::Url;

use crate::ledger::onchain::ProtocolAddresses;
use crate::strategy::StrategyKind;

#[derive(Debug, Parser)]
#[command(name = "liqmon", about = "Liquidation monitor for the lending protocol")]
pub struct Cli {
    /// Network profile to run against.
    #[arg(long, default_value = "mainnet")]
    pub network: String,

    /// Attempt a single designated account once and exit.
    #[arg(long)]
    pub account: Option<Address>,
}

/// Per-network feed parameters.
#[derive(Debug, Clone)]
pub struct NetworkProfile {
    pub name: &'static str,
    pub feed_url: Url,
    /// Page size for the initial feed query.
    pub query_limit: u32,
    /// Subscription health-score ceiling, 1e6 scale.
    pub health_max: u64,
}

impl NetworkProfile {
    pub fn for_name(name: &str) -> Result<Self> {
        let (name, default_feed) = match name.trim().to_ascii_lowercase().as_str() {
            "mainnet" => ("mainnet", "wss://feed.example.com/v1/mainnet"),
            "ropsten" => ("ropsten", "wss://feed.example.com/v1/ropsten"),
            "localhost" => ("localhost", "ws://localhost:8900"),
            other => return Err(eyre::eyre!("unknown network: {other}")),
        };
        let feed_url = match std::env::var("FEED_URL") {
            Ok(raw) => raw.parse()?,
            Err(_) => default_feed.parse()?,
        };
        Ok(Self {
            name,
            feed_url,
            query_limit: 500,
            health_max: 15_000_000,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub network: NetworkProfile,
    pub rpc_url: String,
    pub private_key: String,
    pub addresses: ProtocolAddresses,
    pub relay_url: Option<Url>,
    pub quote_url: Option<Url>,
    pub discord_webhook: Option<Url>,
    pub database_path: Option<String>,
    pub log_path: Option<PathBuf>,
    pub report_interval_secs: u64,
    /// Minimum acceptable yield in reference-asset units, 18 decimals.
    pub min_yield_ref: U256,
    pub gate_net_of_gas: bool,
    pub dust_collateral_value: U256,
    pub fee_multiplier_bps: Option<u64>,
    pub gas_limit: Option<u64>,
    pub use_private_relay: bool,
    pub receiver: Option<Address>,
    pub strategies: Vec<StrategyKind>,
    pub designated_account: Option<Address>,
}

fn env_parsed<T: FromStr>(key: &str, default: T) -> T
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(e) => {
                warn!("Invalid {key} '{raw}': {e}. Using default.");
                default
            }
        },
        Err(_) => default,
    }
}

fn env_optional<T: FromStr>(key: &str) -> Option<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => match raw.parse() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Invalid {key} '{raw}': {e}. Ignoring.");
                None
            }
        },
        Err(_) => None,
    }
}

fn env_required_address(key: &str) -> Result<Address> {
    std::env::var(key)
        .map_err(|_| eyre::eyre!("{key} environment variable not set"))?
        .parse()
        .map_err(|e| eyre::eyre!("invalid {key}: {e}"))
}

pub fn parse_strategies(raw: &str) -> Vec<StrategyKind> {
    let mut kinds = Vec::new();
    for name in raw.split(',').filter(|s| !s.trim().is_empty()) {
        match name.parse() {
            Ok(kind) => {
                if !kinds.contains(&kind) {
                    kinds.push(kind);
                }
            }
            Err(e) => warn!("Skipping strategy entry: {e}"),
        }
    }
    if kinds.is_empty() {
        kinds.push(StrategyKind::SwapAndRepay);
    }
    kinds
}

impl Config {
    pub fn from_env(cli: &Cli) -> Result<Self> {
        dotenvy::dotenv().ok();

        let network = NetworkProfile::for_name(&cli.network)?;

        let rpc_url = std::env::var("RPC_URL")
            .map_err(|_| eyre::eyre!("RPC_URL environment variable not set"))?;
        let private_key = std::env::var("PRIVATE_KEY")
            .map_err(|_| eyre::eyre!("PRIVATE_KEY environment variable not set"))?;

        let addresses = ProtocolAddresses {
            exec: env_required_address("EXEC_ADDRESS")?,
            liquidation: env_required_address("LIQUIDATION_ADDRESS")?,
            swap: env_required_address("SWAP_ADDRESS")?,
            markets: env_required_address("MARKETS_ADDRESS")?,
            reference_asset: env_required_address("REFERENCE_ASSET")?,
        };

        let strategies = parse_strategies(
            &std::env::var("STRATEGIES").unwrap_or_else(|_| "swap_and_repay".to_string()),
        );

        Ok(Self {
            network,
            rpc_url,
            private_key,
            addresses,
            relay_url: env_optional("RELAY_URL"),
            quote_url: env_optional("QUOTE_URL"),
            discord_webhook: if env_parsed("DISCORD_ENABLED", false) {
                env_optional("DISCORD_WEBHOOK_URL")
            } else {
                None
            },
            database_path: std::env::var("DATABASE_PATH").ok(),
            log_path: env_optional("LOG_PATH"),
            report_interval_secs: env_parsed("REPORT_INTERVAL_SECS", 3600u64),
            // 0.05 reference units by default.
            min_yield_ref: env_parsed("MIN_YIELD", U256::from(50_000_000_000_000_000u64)),
            gate_net_of_gas: env_parsed("GATE_NET_OF_GAS", false),
            dust_collateral_value: env_parsed("DUST_COLLATERAL_VALUE", U256::ZERO),
            fee_multiplier_bps: env_optional("FEE_MULTIPLIER_BPS"),
            gas_limit: env_optional("GAS_LIMIT"),
            use_private_relay: env_parsed("USE_PRIVATE_RELAY", false),
            receiver: env_optional("YIELD_RECEIVER"),
            strategies,
            designated_account: cli.account,
        })
    }
}
