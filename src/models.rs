use alloy_primitives::{Address, Bytes, U256};
use serde::{Deserialize, Deserializer};

/// Health scores arrive from the feed as ratios scaled by 1e6.
pub const HEALTH_SCORE_SCALE: u64 = 1_000_000;

/// Accounts below this health score are eligible for liquidation.
pub const VIOLATION_THRESHOLD: u64 = 1_000_000;

pub fn value_one() -> U256 {
    U256::from(10u64).pow(U256::from(18u64))
}

/// Scale a raw token amount up to 18 decimals. Amounts already at 18
/// decimals pass through unchanged.
pub fn normalize_to_18(amount: U256, decimals: u8) -> U256 {
    if decimals >= 18 {
        amount
    } else {
        amount * U256::from(10u64).pow(U256::from(18 - decimals as u64))
    }
}

/// Scale an 18-decimal amount back down to a token's native decimals,
/// flooring. Inverse of [`normalize_to_18`] up to rounding.
pub fn denormalize_from_18(amount: U256, decimals: u8) -> U256 {
    if decimals >= 18 {
        amount
    } else {
        amount / U256::from(10u64).pow(U256::from(18 - decimals as u64))
    }
}

fn u256_from_dec<'de, D>(deserializer: D) -> Result<U256, D::Error>
where
    D: Deserializer<'de>,
{
    // The feed serializes big integers as decimal strings.
    let raw = serde_json::Value::deserialize(deserializer)?;
    match raw {
        serde_json::Value::String(s) => s
            .parse::<U256>()
            .map_err(|e| serde::de::Error::custom(format!("bad decimal string: {e}"))),
        serde_json::Value::Number(n) => {
            let v = n
                .as_u64()
                .ok_or_else(|| serde::de::Error::custom("negative or fractional amount"))?;
            Ok(U256::from(v))
        }
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

/// Collateral/liability standing of one market within an account.
///
/// An asset contributes to exactly one side per account at a time: either
/// `collateral_value` or `liability_value` is nonzero (both may be zero).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LiquidityStatus {
    #[serde(deserialize_with = "u256_from_dec")]
    pub collateral_value: U256,
    #[serde(deserialize_with = "u256_from_dec")]
    pub liability_value: U256,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Market {
    pub underlying: Address,
    #[serde(default)]
    pub symbol: String,
    #[serde(default = "default_decimals")]
    pub decimals: u8,
    #[serde(default)]
    pub liquidity_status: LiquidityStatus,
}

fn default_decimals() -> u8 {
    18
}

impl Market {
    pub fn is_collateral(&self) -> bool {
        !self.liquidity_status.collateral_value.is_zero()
    }

    pub fn is_liability(&self) -> bool {
        !self.liquidity_status.liability_value.is_zero()
    }
}

/// Per-account materialized state, mutated only by applying feed patches.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    pub account: Address,
    pub health_score: u64,
    #[serde(default)]
    pub markets: Vec<Market>,
    #[serde(default, deserialize_with = "u256_from_dec")]
    pub total_collateral_value: U256,
    #[serde(default, deserialize_with = "u256_from_dec")]
    pub total_liability_value: U256,
}

impl AccountView {
    pub fn is_violation(&self) -> bool {
        self.health_score < VIOLATION_THRESHOLD
    }

    /// Markets currently held as collateral, in feed order.
    pub fn collaterals(&self) -> Vec<&Market> {
        self.markets.iter().filter(|m| m.is_collateral()).collect()
    }

    /// Markets with outstanding debt, in feed order.
    pub fn liabilities(&self) -> Vec<&Market> {
        self.markets.iter().filter(|m| m.is_liability()).collect()
    }

    pub fn largest_collateral_value(&self) -> U256 {
        self.markets
            .iter()
            .map(|m| m.liquidity_status.collateral_value)
            .max()
            .unwrap_or(U256::ZERO)
    }

    /// Health score as a decimal ratio, for display.
    pub fn health_ratio(&self) -> f64 {
        self.health_score as f64 / HEALTH_SCORE_SCALE as f64
    }
}

/// One candidate execution path discovered by a strategy. Transient: it is
/// recomputed on every attempt since chain state may have moved.
#[derive(Debug, Clone)]
pub struct Opportunity {
    pub route: Route,
    pub repay: U256,
    /// Net collateral gained, normalized to 18 decimals.
    pub yield_collateral: U256,
    /// The same yield valued in the reference asset via the simulated price.
    pub yield_ref: U256,
    pub gas_estimate: u64,
    /// Best-effort payload from the external swap-quote service, attached
    /// for reporting only.
    pub quote: Option<serde_json::Value>,
}

/// How seized collateral is converted back into the repaid asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Collateral and debt are the same asset: burn against the liability,
    /// no swap leg.
    Burn,
    /// Encoded multi-hop swap path with per-hop fee tiers.
    Swap(Bytes),
}

impl Route {
    pub fn describe(&self) -> String {
        match self {
            Route::Burn => "burn (same asset)".to_string(),
            Route::Swap(path) => format!("0x{}", hex::encode(path)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_view_deserializes_feed_shape() {
        let raw = serde_json::json!({
            "account": "0x1111111111111111111111111111111111111111",
            "healthScore": 960000,
            "totalCollateralValue": "100000000000000000000",
            "totalLiabilityValue": "104000000000000000000",
            "markets": [
                {
                    "underlying": "0x2222222222222222222222222222222222222222",
                    "symbol": "TST",
                    "decimals": 18,
                    "liquidityStatus": {
                        "collateralValue": "0",
                        "liabilityValue": "104000000000000000000"
                    }
                },
                {
                    "underlying": "0x3333333333333333333333333333333333333333",
                    "symbol": "TST2",
                    "liquidityStatus": {
                        "collateralValue": "100000000000000000000",
                        "liabilityValue": "0"
                    }
                }
            ]
        });

        let view: AccountView = serde_json::from_value(raw).unwrap();
        assert!(view.is_violation());
        assert_eq!(view.collaterals().len(), 1);
        assert_eq!(view.liabilities().len(), 1);
        assert_eq!(view.collaterals()[0].symbol, "TST2");
        assert_eq!(
            view.largest_collateral_value(),
            "100000000000000000000".parse::<U256>().unwrap()
        );
    }

    #[test]
    fn healthy_account_is_not_violation() {
        let raw = serde_json::json!({
            "account": "0x1111111111111111111111111111111111111111",
            "healthScore": 1000000,
        });
        let view: AccountView = serde_json::from_value(raw).unwrap();
        assert!(!view.is_violation());
    }

    #[test]
    fn normalize_scales_low_decimal_amounts() {
        assert_eq!(
            normalize_to_18(U256::from(5u64), 6),
            U256::from(5_000_000_000_000u64)
        );
        let x = U256::from(123u64);
        assert_eq!(normalize_to_18(x, 18), x);
    }
}
