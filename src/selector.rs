use std::sync::Arc;

use alloy_primitives::{Address, U256};
use eyre::Result;
use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::ledger::{Ledger, TxOptions, TxOutcome};
use crate::models::AccountView;
use crate::quote::QuoteClient;
use crate::strategy::{Strategy, StrategyContext, StrategyKind};

/// Business result of one liquidation attempt. These are expected outcomes,
/// not faults; infrastructure failures surface as errors instead.
#[derive(Debug)]
pub enum AttemptOutcome {
    Executed {
        tx: TxOutcome,
        description: String,
        yield_ref: U256,
        /// Liquidator's reference-asset balance after inclusion.
        remaining_balance: U256,
    },
    NoOpportunity,
    YieldTooLow {
        yield_ref: U256,
        required: U256,
    },
    InsufficientCollateral {
        largest: U256,
        required: U256,
    },
}

#[derive(Clone)]
pub struct SelectorSettings {
    pub liquidator: Address,
    pub reference_asset: Address,
    pub receiver: Option<Address>,
    pub strategies: Vec<StrategyKind>,
    /// Minimum acceptable yield in reference-asset units, 18 decimals.
    pub min_yield_ref: U256,
    /// Also require the yield to clear the estimated gas cost at current
    /// fee levels.
    pub gate_net_of_gas: bool,
    /// Accounts whose largest collateral position values below this are
    /// skipped outright.
    pub dust_collateral_value: U256,
    pub fee_multiplier_bps: Option<u64>,
    pub gas_limit: Option<u64>,
    pub use_private_relay: bool,
}

impl SelectorSettings {
    fn tx_options(&self, use_private_relay: bool) -> TxOptions {
        TxOptions {
            fee_multiplier_bps: self.fee_multiplier_bps,
            gas_limit: self.gas_limit,
            use_private_relay,
        }
    }
}

async fn required_yield(
    ledger: &Arc<dyn Ledger>,
    settings: &SelectorSettings,
    gas_estimate: u64,
) -> Result<U256> {
    if !settings.gate_net_of_gas {
        return Ok(settings.min_yield_ref);
    }
    let gas_price = ledger.gas_price().await?;
    let gas_cost = U256::from(gas_estimate as u128) * U256::from(gas_price);
    Ok(settings.min_yield_ref + gas_cost)
}

/// Fan out over every (collateral, liability, strategy) pairing of the
/// account, pick the highest-yield result, and execute it when it clears
/// the profitability gate.
pub async fn attempt_liquidation(
    ledger: Arc<dyn Ledger>,
    quote: Option<Arc<QuoteClient>>,
    settings: &SelectorSettings,
    account: &AccountView,
) -> Result<AttemptOutcome> {
    let largest = account.largest_collateral_value();
    if largest < settings.dust_collateral_value {
        return Ok(AttemptOutcome::InsufficientCollateral {
            largest,
            required: settings.dust_collateral_value,
        });
    }

    let mut searches = Vec::new();
    for collateral in account.collaterals() {
        for debt in account.liabilities() {
            for kind in &settings.strategies {
                let ctx = StrategyContext {
                    ledger: ledger.clone(),
                    quote: quote.clone(),
                    liquidator: settings.liquidator,
                    reference_asset: settings.reference_asset,
                    receiver: settings.receiver,
                    violator: account.account,
                    collateral: collateral.clone(),
                    debt: debt.clone(),
                };
                let strategy = kind.build(ctx);
                searches.push(run_search(strategy, account.account));
            }
        }
    }
    let results = join_all(searches).await;

    // First-seen pairing wins ties so feed market order stays decisive.
    let mut best: Option<Box<dyn Strategy>> = None;
    for strategy in results.into_iter().flatten() {
        let Some(opportunity) = strategy.best() else {
            continue;
        };
        let better = best
            .as_ref()
            .and_then(|b| b.best())
            .map(|current| opportunity.yield_ref > current.yield_ref)
            .unwrap_or(true);
        if better {
            best = Some(strategy);
        }
    }

    let Some(best) = best else {
        return Ok(AttemptOutcome::NoOpportunity);
    };
    let opportunity = best
        .best()
        .cloned()
        .ok_or_else(|| eyre::eyre!("winning strategy lost its result"))?;

    let required = required_yield(&ledger, settings, opportunity.gas_estimate).await?;
    if opportunity.yield_ref <= required {
        debug!(
            account = %account.account,
            yield_ref = %opportunity.yield_ref,
            %required,
            "best opportunity below the profitability bar"
        );
        return Ok(AttemptOutcome::YieldTooLow {
            yield_ref: opportunity.yield_ref,
            required,
        });
    }

    info!(
        account = %account.account,
        yield_ref = %opportunity.yield_ref,
        "💰 executing {}",
        best.describe()
    );
    let tx = match best.exec(&settings.tx_options(settings.use_private_relay)).await {
        Ok(tx) => tx,
        Err(e) if e.is_relay_failure() => {
            warn!(account = %account.account, "private relay failed: {e}");
            // Fee conditions may have moved while the relay stalled; the
            // public path only runs if the margin still holds.
            let required = required_yield(&ledger, settings, opportunity.gas_estimate).await?;
            if opportunity.yield_ref <= required {
                return Ok(AttemptOutcome::YieldTooLow {
                    yield_ref: opportunity.yield_ref,
                    required,
                });
            }
            best.exec(&settings.tx_options(false))
                .await
                .map_err(|e| eyre::Report::new(e).wrap_err(best.describe()))?
        }
        Err(e) => return Err(eyre::Report::new(e).wrap_err(best.describe())),
    };

    let remaining_balance = ledger
        .balance_of(settings.reference_asset, settings.liquidator)
        .await?;
    Ok(AttemptOutcome::Executed {
        tx,
        description: best.describe(),
        yield_ref: opportunity.yield_ref,
        remaining_balance,
    })
}

async fn run_search(
    mut strategy: Box<dyn Strategy>,
    account: Address,
) -> Option<Box<dyn Strategy>> {
    match strategy.find_best().await {
        Ok(()) => Some(strategy),
        Err(e) => {
            warn!(%account, strategy = strategy.name(), "search failed: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ExecutionError;
    use crate::ledger::testing::ScriptedLedger;
    use crate::ledger::TxOutcome;
    use crate::models::value_one;
    use alloy_primitives::B256;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn addr(n: u8) -> Address {
        Address::from_slice(&[n; 20])
    }

    const REFERENCE: u8 = 0xee;

    fn settings() -> SelectorSettings {
        SelectorSettings {
            liquidator: addr(0x01),
            reference_asset: addr(REFERENCE),
            receiver: None,
            strategies: vec![StrategyKind::SwapAndRepay],
            min_yield_ref: U256::ZERO,
            gate_net_of_gas: false,
            dust_collateral_value: U256::ZERO,
            fee_multiplier_bps: None,
            gas_limit: None,
            use_private_relay: false,
        }
    }

    /// Account at health 0.96: one liability in the reference asset, one
    /// collateral market.
    fn violator_account() -> AccountView {
        serde_json::from_value(serde_json::json!({
            "account": format!("{}", addr(0x02)),
            "healthScore": 960_000,
            "totalCollateralValue": "100000000000000000000",
            "totalLiabilityValue": "104000000000000000000",
            "markets": [
                {
                    "underlying": format!("{}", addr(REFERENCE)),
                    "symbol": "WETH",
                    "decimals": 18,
                    "liquidityStatus": {
                        "collateralValue": "0",
                        "liabilityValue": "104000000000000000000"
                    }
                },
                {
                    "underlying": format!("{}", addr(0x10)),
                    "symbol": "TST2",
                    "decimals": 18,
                    "liquidityStatus": {
                        "collateralValue": "100000000000000000000",
                        "liabilityValue": "0"
                    }
                }
            ]
        }))
        .unwrap()
    }

    fn eth(milli: u64) -> U256 {
        U256::from(milli) * value_one() / U256::from(1_000u64)
    }

    #[tokio::test]
    async fn dust_account_is_skipped_before_searching() {
        let ledger = Arc::new(ScriptedLedger::new());
        let mut settings = settings();
        settings.dust_collateral_value = U256::from(10u64) * value_one() * U256::from(100u64);

        let outcome =
            attempt_liquidation(ledger.clone(), None, &settings, &violator_account())
                .await
                .unwrap();
        assert!(matches!(
            outcome,
            AttemptOutcome::InsufficientCollateral { .. }
        ));
        assert_eq!(ledger.sim_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_search_reports_no_opportunity() {
        // No scripted check: every pair reports zero eligible repay.
        let ledger = Arc::new(ScriptedLedger::new());
        let outcome = attempt_liquidation(ledger, None, &settings(), &violator_account())
            .await
            .unwrap();
        assert!(matches!(outcome, AttemptOutcome::NoOpportunity));
    }

    #[tokio::test]
    async fn profitable_attempt_executes() {
        let mut ledger = ScriptedLedger::new();
        ledger.script_check(addr(REFERENCE), addr(0x10), U256::from(1_000u64));
        // 0.07 reference units of yield per candidate.
        ledger.script_uniform_sim(eth(70), value_one(), 400_000);
        let ledger = Arc::new(ledger);

        let mut settings = settings();
        settings.min_yield_ref = eth(50);

        let outcome =
            attempt_liquidation(ledger.clone(), None, &settings, &violator_account())
                .await
                .unwrap();
        match outcome {
            AttemptOutcome::Executed { yield_ref, .. } => assert_eq!(yield_ref, eth(70)),
            other => panic!("expected execution, got {other:?}"),
        }
        assert_eq!(ledger.submissions.lock().len(), 1);
    }

    #[tokio::test]
    async fn higher_bar_rejects_the_same_opportunity() {
        let mut ledger = ScriptedLedger::new();
        ledger.script_check(addr(REFERENCE), addr(0x10), U256::from(1_000u64));
        ledger.script_uniform_sim(eth(70), value_one(), 400_000);
        let ledger = Arc::new(ledger);

        let mut settings = settings();
        settings.min_yield_ref = eth(100);

        let outcome =
            attempt_liquidation(ledger.clone(), None, &settings, &violator_account())
                .await
                .unwrap();
        match outcome {
            AttemptOutcome::YieldTooLow { yield_ref, required } => {
                assert_eq!(yield_ref, eth(70));
                assert_eq!(required, eth(100));
            }
            other => panic!("expected yield-too-low, got {other:?}"),
        }
        assert!(ledger.submissions.lock().is_empty());
    }

    #[tokio::test]
    async fn yield_equal_to_the_bar_is_not_enough() {
        let mut ledger = ScriptedLedger::new();
        ledger.script_check(addr(REFERENCE), addr(0x10), U256::from(1_000u64));
        ledger.script_uniform_sim(eth(70), value_one(), 400_000);
        let ledger = Arc::new(ledger);

        let mut settings = settings();
        settings.min_yield_ref = eth(70);

        let outcome = attempt_liquidation(ledger, None, &settings, &violator_account())
            .await
            .unwrap();
        assert!(matches!(outcome, AttemptOutcome::YieldTooLow { .. }));
    }

    #[tokio::test]
    async fn gas_cost_raises_the_bar() {
        let mut ledger = ScriptedLedger::new();
        ledger.script_check(addr(REFERENCE), addr(0x10), U256::from(1_000u64));
        ledger.script_uniform_sim(eth(70), value_one(), 400_000);
        // 200 gwei: 400k gas costs 0.08 reference units, above the yield.
        ledger.gas_price_wei = 200_000_000_000;
        let ledger = Arc::new(ledger);

        let mut settings = settings();
        settings.gate_net_of_gas = true;

        let outcome = attempt_liquidation(ledger, None, &settings, &violator_account())
            .await
            .unwrap();
        assert!(matches!(outcome, AttemptOutcome::YieldTooLow { .. }));
    }

    #[tokio::test]
    async fn failed_submission_carries_the_strategy_description() {
        let mut ledger = ScriptedLedger::new();
        ledger.script_check(addr(REFERENCE), addr(0x10), U256::from(1_000u64));
        ledger.script_uniform_sim(eth(70), value_one(), 400_000);
        ledger.submit_fn =
            Box::new(|_| Err(ExecutionError::Submission("nonce too low".into())));
        let ledger = Arc::new(ledger);

        let err = attempt_liquidation(ledger, None, &settings(), &violator_account())
            .await
            .unwrap_err();
        let rendered = format!("{err:#}");
        assert!(rendered.contains("swap_and_repay"), "missing strategy context: {rendered}");
        assert!(rendered.contains("nonce too low"), "missing submission error: {rendered}");
    }

    #[tokio::test]
    async fn relay_rejection_falls_back_to_public_submission() {
        let mut ledger = ScriptedLedger::new();
        ledger.script_check(addr(REFERENCE), addr(0x10), U256::from(1_000u64));
        ledger.script_uniform_sim(eth(70), value_one(), 400_000);
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        ledger.submit_fn = Box::new(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(ExecutionError::RelayRejected("bundle dropped".into()))
            } else {
                Ok(TxOutcome {
                    tx_hash: B256::repeat_byte(0xcd),
                    gas_used: 390_000,
                    block_number: Some(7),
                })
            }
        });
        let ledger = Arc::new(ledger);

        let mut settings = settings();
        settings.use_private_relay = true;

        let outcome =
            attempt_liquidation(ledger.clone(), None, &settings, &violator_account())
                .await
                .unwrap();
        assert!(matches!(outcome, AttemptOutcome::Executed { .. }));
        assert_eq!(ledger.submissions.lock().len(), 2);
    }
}
