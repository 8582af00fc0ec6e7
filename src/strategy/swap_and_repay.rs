use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use eyre::Result;
use futures::future::join_all;
use tracing::debug;

use super::{Strategy, StrategyContext};
use crate::errors::{ExecutionError, NoOpportunityError};
use crate::ledger::{CallOutcome, LedgerCall, TxOptions, TxOutcome};
use crate::models::{denormalize_from_18, normalize_to_18, value_one, Opportunity, Route};
use crate::swap_path::{encode_path, FEE_TIERS};

/// The search starts at 98% of the eligible repay and halves the percentage
/// after each round without a viable candidate, down to 1%.
const REPAY_START_PERCENT: u64 = 98;

/// Protected-collateral unwrap amounts are padded 2% over the price-implied
/// requirement to absorb oracle drift between simulation and inclusion.
const UNWRAP_PAD_BPS: u64 = 10_200;

struct Candidate {
    opportunity: Opportunity,
    /// Execution legs of the winning simulation, liquidate through exit.
    plan: Vec<LedgerCall>,
    /// Yield in the sweep token's native decimals.
    raw_yield: U256,
    sweep_token: Address,
}

/// Liquidate, convert seized collateral back into the repaid asset over a
/// swap route (or a direct burn when they coincide), and keep the surplus.
pub struct SwapAndRepay {
    ctx: StrategyContext,
    best: Option<Candidate>,
}

impl SwapAndRepay {
    pub fn new(ctx: StrategyContext) -> Self {
        Self { ctx, best: None }
    }

    /// Collateral asset the swap leg actually holds: the unwrapped
    /// underlying for protected markets, the market asset otherwise.
    async fn swap_collateral(&self) -> Result<(Address, u8, bool)> {
        let collateral = self.ctx.collateral.underlying;
        match self.ctx.ledger.resolve_protected(collateral).await? {
            Some(unwrapped) => {
                let decimals = self.ctx.ledger.decimals(unwrapped).await?;
                Ok((unwrapped, decimals, true))
            }
            None => Ok((collateral, self.ctx.collateral.decimals, false)),
        }
    }

    fn candidate_routes(&self, swap_collateral: Address) -> Result<Vec<Route>> {
        let debt = self.ctx.debt.underlying;
        if swap_collateral == debt {
            return Ok(vec![Route::Burn]);
        }

        let reference = self.ctx.reference_asset;
        let mut routes = Vec::new();
        if swap_collateral == reference || debt == reference {
            for fee in FEE_TIERS {
                routes.push(Route::Swap(encode_path(&[debt, swap_collateral], &[fee])?));
            }
        } else {
            // Exact-output paths run output-first: debt, reference, collateral.
            for first in FEE_TIERS {
                for second in FEE_TIERS {
                    routes.push(Route::Swap(encode_path(
                        &[debt, reference, swap_collateral],
                        &[first, second],
                    )?));
                }
            }
        }
        Ok(routes)
    }

    /// Reference-asset prices for the debt and collateral assets, taken from
    /// the same simulated view the candidates use.
    async fn fetch_prices(&self, swap_collateral: Address) -> Result<(U256, U256)> {
        let calls = [
            LedgerCall::PriceOf {
                underlying: self.ctx.debt.underlying,
            },
            LedgerCall::PriceOf {
                underlying: swap_collateral,
            },
        ];
        let sim = self
            .ctx
            .ledger
            .simulate_batch(&[], &calls)
            .await
            .map_err(|e| eyre::eyre!("price query failed: {e}"))?;
        let debt_price = sim
            .outcomes
            .first()
            .and_then(CallOutcome::as_price)
            .ok_or_else(|| eyre::eyre!("missing debt price"))?;
        let collateral_price = sim
            .outcomes
            .get(1)
            .and_then(CallOutcome::as_price)
            .ok_or_else(|| eyre::eyre!("missing collateral price"))?;
        if collateral_price.is_zero() {
            return Err(eyre::eyre!("zero collateral price for {swap_collateral}"));
        }
        Ok((debt_price, collateral_price))
    }

    /// Collateral amount to unwrap so the swap leg is covered: the repay
    /// value converted through the price ratio, padded.
    fn unwrap_amount(
        &self,
        repay: U256,
        debt_price: U256,
        collateral_price: U256,
        collateral_decimals: u8,
    ) -> U256 {
        let repay_18 = normalize_to_18(repay, self.ctx.debt.decimals);
        let value_ref = repay_18 * debt_price / value_one();
        let collateral_18 = value_ref * value_one() / collateral_price;
        let padded = collateral_18 * U256::from(UNWRAP_PAD_BPS) / U256::from(10_000u64);
        denormalize_from_18(padded, collateral_decimals)
    }

    async fn simulate_candidate(
        &self,
        route: &Route,
        repay: U256,
        unwrap: Option<U256>,
        swap_collateral: Address,
        collateral_decimals: u8,
    ) -> Option<Candidate> {
        let mut calls = vec![
            LedgerCall::BalanceOf {
                token: swap_collateral,
                owner: self.ctx.liquidator,
            },
            LedgerCall::Liquidate {
                violator: self.ctx.violator,
                underlying: self.ctx.debt.underlying,
                collateral: self.ctx.collateral.underlying,
                repay,
                min_yield: U256::ZERO,
            },
        ];
        if let Some(amount) = unwrap {
            calls.push(LedgerCall::UnwrapProtected {
                protected: self.ctx.collateral.underlying,
                amount,
            });
        }
        match route {
            Route::Burn => calls.push(LedgerCall::Burn {
                underlying: swap_collateral,
                amount: U256::MAX,
            }),
            Route::Swap(path) => calls.push(LedgerCall::SwapAndRepay { path: path.clone() }),
        }
        calls.push(LedgerCall::ExitMarket {
            underlying: self.ctx.debt.underlying,
        });
        calls.push(LedgerCall::BalanceOf {
            token: swap_collateral,
            owner: self.ctx.liquidator,
        });
        calls.push(LedgerCall::PriceOf {
            underlying: swap_collateral,
        });

        let sim = match self
            .ctx
            .ledger
            .simulate_batch(&[self.ctx.violator], &calls)
            .await
        {
            Ok(sim) => sim,
            Err(e) => {
                debug!(route = %route.describe(), %repay, "candidate rejected: {e}");
                return None;
            }
        };

        let n = sim.outcomes.len();
        let before = sim.outcomes.first().and_then(CallOutcome::as_balance)?;
        let after = sim.outcomes.get(n.checked_sub(2)?).and_then(CallOutcome::as_balance)?;
        let price = sim.outcomes.get(n - 1).and_then(CallOutcome::as_price)?;

        let raw_yield = after.checked_sub(before).filter(|d| !d.is_zero())?;
        let yield_collateral = normalize_to_18(raw_yield, collateral_decimals);
        // Floor division undervalues the yield slightly, which is the safe
        // direction for the profitability gate.
        let yield_ref = yield_collateral * price / value_one();

        let plan = calls[1..calls.len() - 2].to_vec();
        Some(Candidate {
            opportunity: Opportunity {
                route: route.clone(),
                repay,
                yield_collateral,
                yield_ref,
                gas_estimate: sim.gas_estimate,
                quote: None,
            },
            plan,
            raw_yield,
            sweep_token: swap_collateral,
        })
    }
}

#[async_trait]
impl Strategy for SwapAndRepay {
    fn name(&self) -> &'static str {
        "swap_and_repay"
    }

    async fn find_best(&mut self) -> Result<()> {
        self.best = None;

        let check = self
            .ctx
            .ledger
            .check_liquidation(
                self.ctx.liquidator,
                self.ctx.violator,
                self.ctx.debt.underlying,
                self.ctx.collateral.underlying,
            )
            .await?;
        if check.repay.is_zero() {
            debug!(
                violator = %self.ctx.violator,
                debt = %self.ctx.debt.symbol,
                collateral = %self.ctx.collateral.symbol,
                "pair offers no repay"
            );
            return Ok(());
        }

        let (swap_collateral, collateral_decimals, protected) = self.swap_collateral().await?;
        let routes = self.candidate_routes(swap_collateral)?;
        let prices = if protected {
            Some(self.fetch_prices(swap_collateral).await?)
        } else {
            None
        };

        let mut percent = REPAY_START_PERCENT;
        while percent >= 1 {
            let repay = check.repay * U256::from(percent) / U256::from(100u64);
            if repay.is_zero() {
                break;
            }
            let unwrap = prices.map(|(debt_price, collateral_price)| {
                self.unwrap_amount(repay, debt_price, collateral_price, collateral_decimals)
            });

            let candidates = join_all(routes.iter().map(|route| {
                self.simulate_candidate(route, repay, unwrap, swap_collateral, collateral_decimals)
            }))
            .await;

            // First-seen route wins ties, keeping route preference stable.
            let mut winner: Option<Candidate> = None;
            for candidate in candidates.into_iter().flatten() {
                let better = winner
                    .as_ref()
                    .map(|w| candidate.opportunity.yield_ref > w.opportunity.yield_ref)
                    .unwrap_or(true);
                if better {
                    winner = Some(candidate);
                }
            }

            if let Some(mut winner) = winner {
                debug!(
                    violator = %self.ctx.violator,
                    percent,
                    repay = %winner.opportunity.repay,
                    yield_ref = %winner.opportunity.yield_ref,
                    "viable candidate found"
                );
                if let Some(quote) = &self.ctx.quote {
                    winner.opportunity.quote = quote
                        .exact_output_quote(swap_collateral, self.ctx.debt.underlying, repay)
                        .await;
                }
                self.best = Some(winner);
                return Ok(());
            }
            percent /= 2;
        }
        Ok(())
    }

    fn best(&self) -> Option<&Opportunity> {
        self.best.as_ref().map(|c| &c.opportunity)
    }

    async fn exec(&self, opts: &TxOptions) -> Result<TxOutcome, ExecutionError> {
        let candidate = self.best.as_ref().ok_or(NoOpportunityError)?;
        let mut calls = candidate.plan.clone();
        if let Some(receiver) = self.ctx.receiver {
            calls.push(LedgerCall::TransferTo {
                token: candidate.sweep_token,
                to: receiver,
                amount: candidate.raw_yield,
            });
        }
        self.ctx
            .ledger
            .submit_batch(&[self.ctx.violator], &calls, opts)
            .await
    }

    fn describe(&self) -> String {
        match &self.best {
            Some(candidate) => format!(
                "swap_and_repay: violator {} repay {} {} via {} -> yield {} {} ({} ref units)",
                self.ctx.violator,
                candidate.opportunity.repay,
                self.ctx.debt.symbol,
                candidate.opportunity.route.describe(),
                candidate.opportunity.yield_collateral,
                self.ctx.collateral.symbol,
                candidate.opportunity.yield_ref,
            ),
            None => format!(
                "swap_and_repay: no viable liquidation of {} ({} debt, {} collateral)",
                self.ctx.violator, self.ctx.debt.symbol, self.ctx.collateral.symbol,
            ),
        }
    }
}
