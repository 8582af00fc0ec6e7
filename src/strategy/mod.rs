pub mod swap_and_repay;

use std::str::FromStr;
use std::sync::Arc;

use alloy_primitives::Address;
use async_trait::async_trait;
use eyre::Result;

use crate::errors::ExecutionError;
use crate::ledger::{Ledger, TxOptions, TxOutcome};
use crate::models::{Market, Opportunity};
use crate::quote::QuoteClient;

pub use swap_and_repay::SwapAndRepay;

/// A liquidation execution strategy for one (violator, collateral, debt)
/// pairing. `find_best` runs the search; `exec` commits the stored result.
#[async_trait]
pub trait Strategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Search for the best profitable execution. Infeasible routes and
    /// fractions are contained here; only upstream query failures propagate.
    async fn find_best(&mut self) -> Result<()>;

    /// Best opportunity found by the last `find_best`, if any.
    fn best(&self) -> Option<&Opportunity>;

    /// Submit the stored best opportunity on-chain.
    async fn exec(&self, opts: &TxOptions) -> Result<TxOutcome, ExecutionError>;

    /// Human-readable summary of the stored result. Pure: never touches the
    /// ledger.
    fn describe(&self) -> String;
}

/// Everything a strategy constructor needs for one pairing.
pub struct StrategyContext {
    pub ledger: Arc<dyn Ledger>,
    pub quote: Option<Arc<QuoteClient>>,
    pub liquidator: Address,
    pub reference_asset: Address,
    /// Optional sweep target for realized yield.
    pub receiver: Option<Address>,
    pub violator: Address,
    pub collateral: Market,
    pub debt: Market,
}

/// Registry of strategies that can be enabled from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    SwapAndRepay,
}

impl StrategyKind {
    pub fn build(&self, ctx: StrategyContext) -> Box<dyn Strategy> {
        match self {
            StrategyKind::SwapAndRepay => Box::new(SwapAndRepay::new(ctx)),
        }
    }
}

impl FromStr for StrategyKind {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "swap_and_repay" | "swapandrepay" => Ok(StrategyKind::SwapAndRepay),
            other => Err(eyre::eyre!("unknown strategy: {other}")),
        }
    }
}
