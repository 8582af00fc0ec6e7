pub mod onchain;

use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use eyre::Result;

use crate::errors::{ExecutionError, SimulationFailure};

/// One operation inside a batched call against the ledger. The batch is
/// dispatched atomically: simulation never commits state, and submission
/// reverts as a whole if any leg fails.
#[derive(Debug, Clone)]
pub enum LedgerCall {
    /// Read a deposit balance, denominated in the market's claim token.
    BalanceOf { token: Address, owner: Address },
    /// Repay the violator's debt and seize collateral.
    Liquidate {
        violator: Address,
        underlying: Address,
        collateral: Address,
        repay: U256,
        min_yield: U256,
    },
    /// Redeem a protected wrapper for its underlying asset.
    UnwrapProtected { protected: Address, amount: U256 },
    /// Swap seized collateral along the route and repay the flash liability.
    SwapAndRepay { path: Bytes },
    /// Same-asset case: burn deposit directly against the liability.
    Burn { underlying: Address, amount: U256 },
    /// Leave the repaid market to release the entry.
    ExitMarket { underlying: Address },
    /// Move remaining balance to a configured receiver.
    TransferTo {
        token: Address,
        to: Address,
        amount: U256,
    },
    /// Read the ledger's reference-asset price for an underlying.
    PriceOf { underlying: Address },
}

/// Decoded result of one call within a simulated batch.
#[derive(Debug, Clone)]
pub enum CallOutcome {
    Balance(U256),
    Price(U256),
    Done,
}

impl CallOutcome {
    pub fn as_balance(&self) -> Option<U256> {
        match self {
            CallOutcome::Balance(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_price(&self) -> Option<U256> {
        match self {
            CallOutcome::Price(v) => Some(*v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BatchSimulation {
    pub outcomes: Vec<CallOutcome>,
    pub gas_estimate: u64,
}

/// Result of the ledger's liquidation-eligibility check.
#[derive(Debug, Clone)]
pub struct LiquidationCheck {
    /// Maximum eligible repay amount; zero means the pair offers nothing.
    pub repay: U256,
    /// Projected health score after a full repay, 1e6 scale.
    pub health_score_after: U256,
}

/// One row of the detailed liquidity query used by the designated-account
/// override path.
#[derive(Debug, Clone)]
pub struct AssetLiquidity {
    pub underlying: Address,
    pub collateral_value: U256,
    pub liability_value: U256,
}

#[derive(Debug, Clone, Default)]
pub struct TxOptions {
    /// Basis-point multiplier applied on top of the network fee estimate
    /// (10_000 = unchanged).
    pub fee_multiplier_bps: Option<u64>,
    pub gas_limit: Option<u64>,
    /// Try the private relay first, falling back to public submission.
    pub use_private_relay: bool,
}

#[derive(Debug, Clone)]
pub struct TxOutcome {
    pub tx_hash: B256,
    pub gas_used: u64,
    pub block_number: Option<u64>,
}

/// The ledger/contract system boundary: batched state-non-committing
/// simulation, batched submission, and the read queries the search needs.
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn check_liquidation(
        &self,
        liquidator: Address,
        violator: Address,
        underlying: Address,
        collateral: Address,
    ) -> Result<LiquidationCheck>;

    /// Execute the batch as one atomic read-only round trip. Failure of any
    /// leg surfaces as a batch-level error; there is no partial credit.
    async fn simulate_batch(
        &self,
        defer_liquidity_checks: &[Address],
        calls: &[LedgerCall],
    ) -> Result<BatchSimulation, SimulationFailure>;

    /// Submit the batch on-chain and wait for inclusion.
    async fn submit_batch(
        &self,
        defer_liquidity_checks: &[Address],
        calls: &[LedgerCall],
        opts: &TxOptions,
    ) -> Result<TxOutcome, ExecutionError>;

    /// Per-asset collateral/liability standing for one account, bypassing
    /// the feed.
    async fn detailed_liquidity(&self, account: Address) -> Result<Vec<AssetLiquidity>>;

    /// Resolve a protected wrapper to its underlying asset, or `None` when
    /// the asset is not wrapped.
    async fn resolve_protected(&self, asset: Address) -> Result<Option<Address>>;

    async fn decimals(&self, asset: Address) -> Result<u8>;

    async fn balance_of(&self, token: Address, owner: Address) -> Result<U256>;

    /// Current network gas price in wei.
    async fn gas_price(&self) -> Result<u128>;
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type SimFn =
        dyn Fn(&[LedgerCall]) -> Result<BatchSimulation, SimulationFailure> + Send + Sync;
    type SubmitFn = dyn Fn(&[LedgerCall]) -> Result<TxOutcome, ExecutionError> + Send + Sync;

    /// In-memory ledger driven by scripted closures and lookup tables.
    pub struct ScriptedLedger {
        pub checks: Mutex<HashMap<(Address, Address), LiquidationCheck>>,
        pub protected: Mutex<HashMap<Address, Address>>,
        pub decimals: Mutex<HashMap<Address, u8>>,
        pub balances: Mutex<HashMap<(Address, Address), U256>>,
        pub liquidity: Mutex<HashMap<Address, Vec<AssetLiquidity>>>,
        pub gas_price_wei: u128,
        pub sim_fn: Box<SimFn>,
        pub submit_fn: Box<SubmitFn>,
        pub sim_calls: AtomicUsize,
        pub submissions: Mutex<Vec<Vec<LedgerCall>>>,
    }

    impl ScriptedLedger {
        pub fn new() -> Self {
            Self {
                checks: Mutex::new(HashMap::new()),
                protected: Mutex::new(HashMap::new()),
                decimals: Mutex::new(HashMap::new()),
                balances: Mutex::new(HashMap::new()),
                liquidity: Mutex::new(HashMap::new()),
                gas_price_wei: 1_000_000_000,
                sim_fn: Box::new(|_| {
                    Err(SimulationFailure {
                        index: 0,
                        reason: "unscripted".into(),
                    })
                }),
                submit_fn: Box::new(|_| Ok(TxOutcome {
                    tx_hash: B256::repeat_byte(0xab),
                    gas_used: 400_000,
                    block_number: Some(1),
                })),
                sim_calls: AtomicUsize::new(0),
                submissions: Mutex::new(Vec::new()),
            }
        }

        pub fn script_check(
            &self,
            underlying: Address,
            collateral: Address,
            repay: U256,
        ) {
            self.checks.lock().insert(
                (underlying, collateral),
                LiquidationCheck {
                    repay,
                    health_score_after: U256::from(1_010_000u64),
                },
            );
        }

        /// Script simulation so every route succeeds with the given balance
        /// delta and price.
        pub fn script_uniform_sim(&mut self, delta: U256, price: U256, gas: u64) {
            self.sim_fn = Box::new(move |calls| {
                let mut outcomes = Vec::with_capacity(calls.len());
                let mut balance_reads = 0u32;
                for call in calls {
                    outcomes.push(match call {
                        LedgerCall::BalanceOf { .. } => {
                            balance_reads += 1;
                            if balance_reads == 1 {
                                CallOutcome::Balance(U256::from(1_000u64))
                            } else {
                                CallOutcome::Balance(U256::from(1_000u64) + delta)
                            }
                        }
                        LedgerCall::PriceOf { .. } => CallOutcome::Price(price),
                        _ => CallOutcome::Done,
                    });
                }
                Ok(BatchSimulation {
                    outcomes,
                    gas_estimate: gas,
                })
            });
        }
    }

    #[async_trait]
    impl Ledger for ScriptedLedger {
        async fn check_liquidation(
            &self,
            _liquidator: Address,
            _violator: Address,
            underlying: Address,
            collateral: Address,
        ) -> Result<LiquidationCheck> {
            Ok(self
                .checks
                .lock()
                .get(&(underlying, collateral))
                .cloned()
                .unwrap_or(LiquidationCheck {
                    repay: U256::ZERO,
                    health_score_after: U256::ZERO,
                }))
        }

        async fn simulate_batch(
            &self,
            _defer: &[Address],
            calls: &[LedgerCall],
        ) -> Result<BatchSimulation, SimulationFailure> {
            self.sim_calls.fetch_add(1, Ordering::SeqCst);
            (self.sim_fn)(calls)
        }

        async fn submit_batch(
            &self,
            _defer: &[Address],
            calls: &[LedgerCall],
            _opts: &TxOptions,
        ) -> Result<TxOutcome, ExecutionError> {
            self.submissions.lock().push(calls.to_vec());
            (self.submit_fn)(calls)
        }

        async fn detailed_liquidity(&self, account: Address) -> Result<Vec<AssetLiquidity>> {
            Ok(self.liquidity.lock().get(&account).cloned().unwrap_or_default())
        }

        async fn resolve_protected(&self, asset: Address) -> Result<Option<Address>> {
            Ok(self.protected.lock().get(&asset).copied())
        }

        async fn decimals(&self, asset: Address) -> Result<u8> {
            Ok(self.decimals.lock().get(&asset).copied().unwrap_or(18))
        }

        async fn balance_of(&self, token: Address, owner: Address) -> Result<U256> {
            Ok(self
                .balances
                .lock()
                .get(&(token, owner))
                .copied()
                .unwrap_or(U256::ZERO))
        }

        async fn gas_price(&self) -> Result<u128> {
            Ok(self.gas_price_wei)
        }
    }
}
