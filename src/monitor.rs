use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use alloy_primitives::{Address, U256};
use dashmap::DashMap;
use eyre::{bail, Result};
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::feed::{FeedEvent, PatchEdit, PatchOp};
use crate::ledger::Ledger;
use crate::models::{
    AccountView, LiquidityStatus, Market, HEALTH_SCORE_SCALE, VIOLATION_THRESHOLD,
};
use crate::quote::QuoteClient;
use crate::reporter::{OutcomeEvent, OutcomeKind, ReporterHandle};
use crate::selector::{attempt_liquidation, AttemptOutcome, SelectorSettings};

/// Cooldown after an error or an empty search.
pub const SHORT_DEFERRAL: Duration = Duration::from_secs(60);
/// Cooldown after a search whose best result missed the profitability bar.
pub const MEDIUM_DEFERRAL: Duration = Duration::from_secs(300);
/// Cooldown for accounts whose collateral is not worth touching.
pub const LONG_DEFERRAL: Duration = Duration::from_secs(3600);

/// Consumes feed events, maintains the materialized account view, and runs
/// at most one liquidation cycle at a time.
pub struct Monitor {
    ledger: Arc<dyn Ledger>,
    quote: Option<Arc<QuoteClient>>,
    settings: SelectorSettings,
    reporter: ReporterHandle,
    store: RwLock<serde_json::Map<String, serde_json::Value>>,
    deferrals: DashMap<Address, Instant>,
    in_flight: AtomicBool,
}

impl Monitor {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        quote: Option<Arc<QuoteClient>>,
        settings: SelectorSettings,
        reporter: ReporterHandle,
    ) -> Self {
        Self {
            ledger,
            quote,
            settings,
            reporter,
            store: RwLock::new(serde_json::Map::new()),
            deferrals: DashMap::new(),
            in_flight: AtomicBool::new(false),
        }
    }

    pub async fn run(self: Arc<Self>, mut rx: mpsc::Receiver<FeedEvent>) {
        while let Some(event) = rx.recv().await {
            self.handle_event(event);
        }
        info!("feed channel closed, monitor stopping");
    }

    fn handle_event(self: &Arc<Self>, event: FeedEvent) {
        match event {
            FeedEvent::Connected => info!("🔌 account feed connected"),
            FeedEvent::Disconnected => {
                // Everything materialized so far may be stale.
                let dropped = {
                    let mut store = self.store.write();
                    let n = store.len();
                    store.clear();
                    n
                };
                info!("account feed disconnected, dropped {dropped} accounts");
            }
            FeedEvent::Patch(edits) => {
                {
                    let mut store = self.store.write();
                    for edit in &edits {
                        if let Err(e) = apply_edit(&mut store, edit) {
                            warn!(path = %edit.path, "patch rejected: {e}");
                        }
                    }
                }
                self.maybe_start_cycle();
            }
        }
    }

    /// Start a processing cycle for the worst eligible violator, unless one
    /// is already running.
    fn maybe_start_cycle(self: &Arc<Self>) {
        if self.in_flight.load(Ordering::Acquire) {
            return;
        }
        let Some(view) = self.next_violator() else {
            return;
        };
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        let monitor = self.clone();
        tokio::spawn(async move {
            let _guard = CycleGuard(monitor.clone());
            monitor.process_account(view).await;
        });
    }

    /// Worst-health violation that is not currently deferred. Expired
    /// deferrals are pruned here.
    fn next_violator(&self) -> Option<AccountView> {
        let now = Instant::now();
        self.deferrals.retain(|_, until| *until > now);

        let store = self.store.read();
        let mut views: Vec<AccountView> = store
            .values()
            .filter_map(|doc| match serde_json::from_value(doc.clone()) {
                Ok(view) => Some(view),
                Err(e) => {
                    debug!("skipping unparseable account document: {e}");
                    None
                }
            })
            .collect();
        views.sort_by_key(|v| v.health_score);
        views
            .into_iter()
            .find(|v| v.is_violation() && !self.deferrals.contains_key(&v.account))
    }

    async fn process_account(&self, view: AccountView) {
        info!(
            account = %view.account,
            health = view.health_ratio(),
            "processing violator"
        );
        let result = attempt_liquidation(
            self.ledger.clone(),
            self.quote.clone(),
            &self.settings,
            &view,
        )
        .await;

        let (event, deferral) = match result {
            Ok(outcome) => outcome_event(&view, &outcome),
            Err(e) => {
                error!(account = %view.account, "liquidation attempt failed: {e:#}");
                (
                    OutcomeEvent {
                        kind: OutcomeKind::Error,
                        account: view.account,
                        health_score: view.health_score,
                        collateral_value: view.total_collateral_value,
                        yield_ref: None,
                        required_yield: None,
                        tx_hash: None,
                        detail: format!("{e:#}"),
                    },
                    Some(SHORT_DEFERRAL),
                )
            }
        };
        if let Some(cooldown) = deferral {
            self.deferrals.insert(view.account, Instant::now() + cooldown);
        }
        self.reporter.report(event);
    }

    /// One-shot attempt against a single account, reading its standing
    /// straight from the ledger instead of the feed.
    pub async fn run_designated(&self, account: Address) -> Result<AttemptOutcome> {
        let rows = self.ledger.detailed_liquidity(account).await?;
        if rows.is_empty() {
            bail!("account {account} has no positions");
        }

        let mut markets = Vec::with_capacity(rows.len());
        let mut total_collateral = U256::ZERO;
        let mut total_liability = U256::ZERO;
        for row in rows {
            total_collateral += row.collateral_value;
            total_liability += row.liability_value;
            let decimals = self.ledger.decimals(row.underlying).await?;
            let symbol: String = format!("{}", row.underlying).chars().take(10).collect();
            markets.push(Market {
                underlying: row.underlying,
                symbol,
                decimals,
                liquidity_status: LiquidityStatus {
                    collateral_value: row.collateral_value,
                    liability_value: row.liability_value,
                },
            });
        }
        if total_liability.is_zero() {
            bail!("account {account} has no liabilities");
        }
        let health_score = (total_collateral * U256::from(HEALTH_SCORE_SCALE) / total_liability)
            .try_into()
            .unwrap_or(u64::MAX);
        if health_score >= VIOLATION_THRESHOLD {
            bail!(
                "account {account} is not in violation (health {:.4})",
                health_score as f64 / HEALTH_SCORE_SCALE as f64
            );
        }

        let view = AccountView {
            account,
            health_score,
            markets,
            total_collateral_value: total_collateral,
            total_liability_value: total_liability,
        };
        info!(
            %account,
            health = view.health_ratio(),
            "running one-shot attempt against designated account"
        );
        let outcome = attempt_liquidation(
            self.ledger.clone(),
            self.quote.clone(),
            &self.settings,
            &view,
        )
        .await?;
        let (event, _) = outcome_event(&view, &outcome);
        self.reporter.report(event);
        Ok(outcome)
    }
}

/// Releases the cycle lock when the processing task ends, even if the task
/// panicked.
struct CycleGuard(Arc<Monitor>);

impl Drop for CycleGuard {
    fn drop(&mut self) {
        self.0.in_flight.store(false, Ordering::Release);
    }
}

fn outcome_event(view: &AccountView, outcome: &AttemptOutcome) -> (OutcomeEvent, Option<Duration>) {
    let base = |kind| OutcomeEvent {
        kind,
        account: view.account,
        health_score: view.health_score,
        collateral_value: view.total_collateral_value,
        yield_ref: None,
        required_yield: None,
        tx_hash: None,
        detail: String::new(),
    };
    match outcome {
        AttemptOutcome::Executed {
            tx,
            description,
            yield_ref,
            remaining_balance,
        } => {
            let mut event = base(OutcomeKind::Liquidation);
            event.yield_ref = Some(*yield_ref);
            event.tx_hash = Some(tx.tx_hash);
            event.detail = format!("{description}; balance left {remaining_balance}");
            (event, None)
        }
        AttemptOutcome::NoOpportunity => {
            (base(OutcomeKind::NoOpportunityFound), Some(SHORT_DEFERRAL))
        }
        AttemptOutcome::YieldTooLow { yield_ref, required } => {
            let mut event = base(OutcomeKind::YieldTooLow);
            event.yield_ref = Some(*yield_ref);
            event.required_yield = Some(*required);
            (event, Some(MEDIUM_DEFERRAL))
        }
        AttemptOutcome::InsufficientCollateral { largest, required } => {
            let mut event = base(OutcomeKind::SkipInsufficientCollateral);
            event.detail = format!("largest collateral {largest} below {required}");
            (event, Some(LONG_DEFERRAL))
        }
    }
}

/// Apply one structural edit to the account collection. Paths address the
/// account first (an optional `accounts` prefix is tolerated), then descend
/// into its document; `-` appends to arrays.
pub fn apply_edit(
    store: &mut serde_json::Map<String, serde_json::Value>,
    edit: &PatchEdit,
) -> Result<()> {
    let mut segments: Vec<&str> = edit.path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.first() == Some(&"accounts") {
        segments.remove(0);
    }
    let Some((account, rest)) = segments.split_first() else {
        bail!("empty patch path");
    };
    let key = account.to_ascii_lowercase();

    if rest.is_empty() {
        match edit.op {
            PatchOp::Add | PatchOp::Replace => {
                store.insert(key, edit.value.clone());
            }
            PatchOp::Remove => {
                store.remove(&key);
            }
        }
        return Ok(());
    }

    let Some(mut node) = store.get_mut(&key) else {
        bail!("unknown account {key}");
    };
    let (last, parents) = rest.split_last().unwrap_or((&"", &[]));
    for segment in parents {
        node = descend(node, segment)?;
    }

    match node {
        serde_json::Value::Object(map) => match edit.op {
            PatchOp::Add | PatchOp::Replace => {
                map.insert((*last).to_string(), edit.value.clone());
            }
            PatchOp::Remove => {
                map.remove(*last);
            }
        },
        serde_json::Value::Array(items) => match edit.op {
            PatchOp::Add if *last == "-" => items.push(edit.value.clone()),
            PatchOp::Add | PatchOp::Replace => {
                let index: usize = last.parse()?;
                if index < items.len() {
                    items[index] = edit.value.clone();
                } else if index == items.len() {
                    items.push(edit.value.clone());
                } else {
                    bail!("index {index} out of bounds");
                }
            }
            PatchOp::Remove => {
                let index: usize = last.parse()?;
                if index >= items.len() {
                    bail!("index {index} out of bounds");
                }
                items.remove(index);
            }
        },
        other => bail!("cannot edit into {other}"),
    }
    Ok(())
}

fn descend<'a>(
    node: &'a mut serde_json::Value,
    segment: &str,
) -> Result<&'a mut serde_json::Value> {
    match node {
        serde_json::Value::Object(map) => map
            .get_mut(segment)
            .ok_or_else(|| eyre::eyre!("missing key {segment}")),
        serde_json::Value::Array(items) => {
            let index: usize = segment.parse()?;
            items
                .get_mut(index)
                .ok_or_else(|| eyre::eyre!("index {index} out of bounds"))
        }
        other => bail!("cannot descend into {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::testing::ScriptedLedger;
    use crate::models::value_one;
    use crate::strategy::StrategyKind;

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

    fn monitor_with(ledger: ScriptedLedger) -> (Arc<Monitor>, mpsc::UnboundedReceiver<OutcomeEvent>) {
        let (handle, rx) = ReporterHandle::test_pair();
        (
            Arc::new(Monitor::new(Arc::new(ledger), None, settings(), handle)),
            rx,
        )
    }

    fn account_doc(account: Address, health: u64) -> serde_json::Value {
        serde_json::json!({
            "account": format!("{account}"),
            "healthScore": health,
            "totalCollateralValue": "100000000000000000000",
            "totalLiabilityValue": "104000000000000000000",
            "markets": [
                {
                    "underlying": format!("{}", addr(REFERENCE)),
                    "symbol": "WETH",
                    "liquidityStatus": {"collateralValue": "0", "liabilityValue": "104000000000000000000"}
                },
                {
                    "underlying": format!("{}", addr(0x10)),
                    "symbol": "TST2",
                    "liquidityStatus": {"collateralValue": "100000000000000000000", "liabilityValue": "0"}
                }
            ]
        })
    }

    fn add(store: &mut serde_json::Map<String, serde_json::Value>, account: Address, health: u64) {
        apply_edit(
            store,
            &PatchEdit {
                path: format!("/{account}"),
                op: PatchOp::Add,
                value: account_doc(account, health),
            },
        )
        .unwrap();
    }

    #[test]
    fn edits_add_replace_and_remove() {
        let mut store = serde_json::Map::new();
        add(&mut store, addr(0x02), 990_000);
        assert_eq!(store.len(), 1);

        apply_edit(
            &mut store,
            &PatchEdit {
                path: format!("/{}/healthScore", addr(0x02)),
                op: PatchOp::Replace,
                value: serde_json::json!(950_000),
            },
        )
        .unwrap();
        let key = format!("{}", addr(0x02)).to_ascii_lowercase();
        assert_eq!(store[&key]["healthScore"], 950_000);

        apply_edit(
            &mut store,
            &PatchEdit {
                path: format!("/{}/markets/0/liquidityStatus/liabilityValue", addr(0x02)),
                op: PatchOp::Replace,
                value: serde_json::json!("99"),
            },
        )
        .unwrap();
        assert_eq!(store[&key]["markets"][0]["liquidityStatus"]["liabilityValue"], "99");

        apply_edit(
            &mut store,
            &PatchEdit {
                path: format!("/accounts/{}", addr(0x02)),
                op: PatchOp::Remove,
                value: serde_json::Value::Null,
            },
        )
        .unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn edits_against_unknown_accounts_fail() {
        let mut store = serde_json::Map::new();
        let err = apply_edit(
            &mut store,
            &PatchEdit {
                path: format!("/{}/healthScore", addr(0x05)),
                op: PatchOp::Replace,
                value: serde_json::json!(1),
            },
        );
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn healthy_accounts_are_never_picked() {
        let (monitor, _rx) = monitor_with(ScriptedLedger::new());
        {
            let mut store = monitor.store.write();
            add(&mut store, addr(0x02), 1_000_000);
            add(&mut store, addr(0x03), 1_500_000);
        }
        assert!(monitor.next_violator().is_none());
    }

    #[tokio::test]
    async fn worst_violator_is_picked_first() {
        let (monitor, _rx) = monitor_with(ScriptedLedger::new());
        {
            let mut store = monitor.store.write();
            add(&mut store, addr(0x02), 980_000);
            add(&mut store, addr(0x03), 910_000);
            add(&mut store, addr(0x04), 1_200_000);
        }
        assert_eq!(monitor.next_violator().unwrap().account, addr(0x03));
    }

    #[tokio::test]
    async fn deferred_accounts_are_skipped_until_expiry() {
        let (monitor, _rx) = monitor_with(ScriptedLedger::new());
        {
            let mut store = monitor.store.write();
            add(&mut store, addr(0x02), 910_000);
            add(&mut store, addr(0x03), 980_000);
        }
        monitor
            .deferrals
            .insert(addr(0x02), Instant::now() + Duration::from_secs(30));
        assert_eq!(monitor.next_violator().unwrap().account, addr(0x03));

        // An expired entry is pruned and the account becomes eligible again.
        monitor
            .deferrals
            .insert(addr(0x02), Instant::now() - Duration::from_secs(1));
        assert_eq!(monitor.next_violator().unwrap().account, addr(0x02));
        assert!(!monitor.deferrals.contains_key(&addr(0x02)));
    }

    #[tokio::test]
    async fn disconnect_discards_the_store()  {
        let (monitor, _rx) = monitor_with(ScriptedLedger::new());
        {
            let mut store = monitor.store.write();
            add(&mut store, addr(0x02), 910_000);
        }
        monitor.handle_event(FeedEvent::Disconnected);
        assert!(monitor.store.read().is_empty());
        assert!(monitor.next_violator().is_none());
    }

    #[tokio::test]
    async fn empty_search_defers_briefly_and_reports() {
        // No scripted liquidation checks: the search comes back empty.
        let (monitor, mut rx) = monitor_with(ScriptedLedger::new());
        let view: AccountView =
            serde_json::from_value(account_doc(addr(0x02), 960_000)).unwrap();

        monitor.process_account(view).await;

        let event = rx.try_recv().unwrap();
        assert_eq!(event.kind, OutcomeKind::NoOpportunityFound);
        let until = *monitor.deferrals.get(&addr(0x02)).unwrap();
        let remaining = until.saturating_duration_since(Instant::now());
        assert!(remaining <= SHORT_DEFERRAL);
        assert!(remaining > SHORT_DEFERRAL - Duration::from_secs(5));
    }

    #[tokio::test]
    async fn low_yield_defers_longer_than_no_opportunity() {
        let mut ledger = ScriptedLedger::new();
        ledger.script_check(addr(REFERENCE), addr(0x10), U256::from(1_000u64));
        ledger.script_uniform_sim(
            value_one() * U256::from(7u64) / U256::from(100u64),
            value_one(),
            400_000,
        );
        // Bar above the 0.07 the simulation yields.
        let mut strict = settings();
        strict.min_yield_ref = value_one();
        let (handle, mut rx) = ReporterHandle::test_pair();
        let monitor = Arc::new(Monitor::new(Arc::new(ledger), None, strict, handle));

        let view: AccountView =
            serde_json::from_value(account_doc(addr(0x02), 960_000)).unwrap();
        monitor.process_account(view).await;

        let event = rx.try_recv().unwrap();
        assert_eq!(event.kind, OutcomeKind::YieldTooLow);
        let until = *monitor.deferrals.get(&addr(0x02)).unwrap();
        let remaining = until.saturating_duration_since(Instant::now());
        assert!(remaining > SHORT_DEFERRAL);
        assert!(remaining <= MEDIUM_DEFERRAL);
    }

    #[tokio::test]
    async fn designated_run_builds_a_view_from_the_ledger() {
        let ledger = ScriptedLedger::new();
        ledger.liquidity.lock().insert(
            addr(0x02),
            vec![
                crate::ledger::AssetLiquidity {
                    underlying: addr(REFERENCE),
                    collateral_value: U256::ZERO,
                    liability_value: value_one() * U256::from(104u64),
                },
                crate::ledger::AssetLiquidity {
                    underlying: addr(0x10),
                    collateral_value: value_one() * U256::from(100u64),
                    liability_value: U256::ZERO,
                },
            ],
        );
        let (monitor, mut rx) = monitor_with(ledger);

        let outcome = monitor.run_designated(addr(0x02)).await.unwrap();
        assert!(matches!(outcome, AttemptOutcome::NoOpportunity));
        let event = rx.try_recv().unwrap();
        assert_eq!(event.kind, OutcomeKind::NoOpportunityFound);
        // 100 / 104 in 1e6 scale.
        assert_eq!(event.health_score, 961_538);
    }

    #[tokio::test]
    async fn designated_run_leaves_healthy_accounts_alone() {
        // Collateral 200 against liability 104: health well above 1.0.
        let ledger = Arc::new(ScriptedLedger::new());
        ledger.liquidity.lock().insert(
            addr(0x02),
            vec![
                crate::ledger::AssetLiquidity {
                    underlying: addr(REFERENCE),
                    collateral_value: U256::ZERO,
                    liability_value: value_one() * U256::from(104u64),
                },
                crate::ledger::AssetLiquidity {
                    underlying: addr(0x10),
                    collateral_value: value_one() * U256::from(200u64),
                    liability_value: U256::ZERO,
                },
            ],
        );
        let (handle, mut rx) = ReporterHandle::test_pair();
        let monitor = Arc::new(Monitor::new(ledger.clone(), None, settings(), handle));

        let err = monitor.run_designated(addr(0x02)).await.unwrap_err();
        assert!(err.to_string().contains("not in violation"));
        // No search ran and nothing was reported.
        assert_eq!(ledger.sim_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn cycle_lock_survives_a_panicking_task() {
        let (monitor, _rx) = monitor_with(ScriptedLedger::new());
        assert!(monitor
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok());

        let inner = monitor.clone();
        let handle = tokio::spawn(async move {
            let _guard = CycleGuard(inner);
            panic!("processing blew up");
        });
        assert!(handle.await.is_err());
        assert!(!monitor.in_flight.load(Ordering::Acquire));
    }

    #[test]
    fn deferral_cooldowns_are_ordered() {
        assert!(SHORT_DEFERRAL < MEDIUM_DEFERRAL);
        assert!(MEDIUM_DEFERRAL < LONG_DEFERRAL);
    }
}
