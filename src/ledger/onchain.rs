use alloy_contract::{ContractInstance, Interface};
use alloy_dyn_abi::DynSolValue;
use alloy_eips::eip2718::Encodable2718;
use alloy_network::{EthereumWallet, TransactionBuilder};
use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_provider::{Provider, ProviderBuilder};
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use dashmap::DashMap;
use eyre::Result;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

use super::{
    AssetLiquidity, BatchSimulation, CallOutcome, Ledger, LedgerCall, LiquidationCheck, TxOptions,
    TxOutcome,
};
use crate::errors::{ExecutionError, SimulationFailure};

/// Deployed addresses of the protocol's dispatcher modules plus the
/// reference asset used for multi-hop routing.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolAddresses {
    pub exec: Address,
    pub liquidation: Address,
    pub swap: Address,
    pub markets: Address,
    pub reference_asset: Address,
}

type Instance<P> = ContractInstance<alloy_transport::BoxTransport, Arc<P>>;

/// Production [`Ledger`] over the deployed protocol contracts. All batch
/// traffic goes through the dispatcher's `batchDispatch`, simulated via
/// `batchDispatchSimulate` static calls.
pub struct OnchainLedger<P> {
    provider: Arc<P>,
    rpc_url: String,
    signer: PrivateKeySigner,
    relay_url: Option<Url>,
    http: reqwest::Client,
    addresses: ProtocolAddresses,
    exec: Instance<P>,
    liquidation: Instance<P>,
    swap: Instance<P>,
    markets: Instance<P>,
    erc20_abi: alloy_json_abi::JsonAbi,
    etoken_abi: alloy_json_abi::JsonAbi,
    claim_token_cache: DashMap<Address, Address>,
}

impl<P> OnchainLedger<P>
where
    P: Provider + 'static,
{
    pub fn new(
        provider: Arc<P>,
        rpc_url: String,
        signer: PrivateKeySigner,
        addresses: ProtocolAddresses,
        relay_url: Option<Url>,
    ) -> Result<Self> {
        let exec = Interface::new(serde_json::from_str(EXEC_ABI)?)
            .connect(addresses.exec, provider.clone());
        let liquidation = Interface::new(serde_json::from_str(LIQUIDATION_ABI)?)
            .connect(addresses.liquidation, provider.clone());
        let swap = Interface::new(serde_json::from_str(SWAP_ABI)?)
            .connect(addresses.swap, provider.clone());
        let markets = Interface::new(serde_json::from_str(MARKETS_ABI)?)
            .connect(addresses.markets, provider.clone());

        Ok(Self {
            provider,
            rpc_url,
            signer,
            relay_url,
            http: reqwest::Client::new(),
            addresses,
            exec,
            liquidation,
            swap,
            markets,
            erc20_abi: serde_json::from_str(ERC20_ABI)?,
            etoken_abi: serde_json::from_str(ETOKEN_ABI)?,
            claim_token_cache: DashMap::new(),
        })
    }

    pub fn liquidator(&self) -> Address {
        self.signer.address()
    }

    pub fn reference_asset(&self) -> Address {
        self.addresses.reference_asset
    }

    /// Claim-token (deposit token) address for an underlying, cached after
    /// the first lookup.
    async fn claim_token_of(&self, underlying: Address) -> Result<Address> {
        if let Some(hit) = self.claim_token_cache.get(&underlying) {
            return Ok(*hit);
        }
        let args = [DynSolValue::Address(underlying)];
        let result = self
            .markets
            .function("underlyingToEToken", &args)?
            .call()
            .await?;
        let token = result
            .first()
            .and_then(|v| v.as_address())
            .ok_or_else(|| eyre::eyre!("bad underlyingToEToken result for {underlying}"))?;
        self.claim_token_cache.insert(underlying, token);
        Ok(token)
    }

    /// Encode one typed call into a `(proxy, calldata)` batch item.
    async fn encode_item(&self, call: &LedgerCall) -> Result<(Address, Bytes)> {
        let (proxy, calldata) = match call {
            LedgerCall::BalanceOf { token, owner } => {
                let claim = self.claim_token_of(*token).await?;
                let instance =
                    Interface::new(self.etoken_abi.clone()).connect(claim, self.provider.clone());
                let c = instance.function("balanceOf", &[DynSolValue::Address(*owner)])?;
                (claim, c.calldata().clone())
            }
            LedgerCall::Liquidate {
                violator,
                underlying,
                collateral,
                repay,
                min_yield,
            } => {
                let c = self.liquidation.function(
                    "liquidate",
                    &[
                        DynSolValue::Address(*violator),
                        DynSolValue::Address(*underlying),
                        DynSolValue::Address(*collateral),
                        DynSolValue::Uint(*repay, 256),
                        DynSolValue::Uint(*min_yield, 256),
                    ],
                )?;
                (self.addresses.liquidation, c.calldata().clone())
            }
            LedgerCall::UnwrapProtected { protected, amount } => {
                let c = self.exec.function(
                    "pTokenUnWrap",
                    &[
                        DynSolValue::Address(*protected),
                        DynSolValue::Uint(*amount, 256),
                    ],
                )?;
                (self.addresses.exec, c.calldata().clone())
            }
            LedgerCall::SwapAndRepay { path } => {
                let params = DynSolValue::Tuple(vec![
                    DynSolValue::Uint(U256::ZERO, 256), // subAccountIdIn
                    DynSolValue::Uint(U256::ZERO, 256), // subAccountIdOut
                    DynSolValue::Uint(U256::ZERO, 256), // amountOut: full target debt
                    DynSolValue::Uint(U256::MAX, 256),  // amountInMaximum
                    DynSolValue::Uint(U256::ZERO, 256), // deadline
                    DynSolValue::Bytes(path.to_vec()),
                ]);
                let c = self.swap.function(
                    "swapAndRepayUni",
                    &[params, DynSolValue::Uint(U256::ZERO, 256)],
                )?;
                (self.addresses.swap, c.calldata().clone())
            }
            LedgerCall::Burn { underlying, amount } => {
                let claim = self.claim_token_of(*underlying).await?;
                let instance =
                    Interface::new(self.etoken_abi.clone()).connect(claim, self.provider.clone());
                let c = instance.function(
                    "burn",
                    &[
                        DynSolValue::Uint(U256::ZERO, 256),
                        DynSolValue::Uint(*amount, 256),
                    ],
                )?;
                (claim, c.calldata().clone())
            }
            LedgerCall::ExitMarket { underlying } => {
                let c = self.markets.function(
                    "exitMarket",
                    &[
                        DynSolValue::Uint(U256::ZERO, 256),
                        DynSolValue::Address(*underlying),
                    ],
                )?;
                (self.addresses.markets, c.calldata().clone())
            }
            LedgerCall::TransferTo { token, to, amount } => {
                let instance =
                    Interface::new(self.erc20_abi.clone()).connect(*token, self.provider.clone());
                let c = instance.function(
                    "transfer",
                    &[DynSolValue::Address(*to), DynSolValue::Uint(*amount, 256)],
                )?;
                (*token, c.calldata().clone())
            }
            LedgerCall::PriceOf { underlying } => {
                let c = self
                    .exec
                    .function("getPriceFull", &[DynSolValue::Address(*underlying)])?;
                (self.addresses.exec, c.calldata().clone())
            }
        };
        Ok((proxy, calldata))
    }

    async fn encode_batch_args(
        &self,
        defer: &[Address],
        calls: &[LedgerCall],
    ) -> Result<[DynSolValue; 2]> {
        let mut items = Vec::with_capacity(calls.len());
        for call in calls {
            let (proxy, data) = self.encode_item(call).await?;
            items.push(DynSolValue::Tuple(vec![
                DynSolValue::Bool(false), // allowError: any failing leg rejects the batch
                DynSolValue::Address(proxy),
                DynSolValue::Bytes(data.to_vec()),
            ]));
        }
        let defer = defer.iter().map(|a| DynSolValue::Address(*a)).collect();
        Ok([DynSolValue::Array(items), DynSolValue::Array(defer)])
    }

    fn decode_outcome(call: &LedgerCall, data: &[u8]) -> Result<CallOutcome, SimulationFailure> {
        let word = |offset: usize| -> Option<U256> {
            data.get(offset..offset + 32).map(U256::from_be_slice)
        };
        match call {
            LedgerCall::BalanceOf { .. } => word(0)
                .map(CallOutcome::Balance)
                .ok_or_else(|| SimulationFailure {
                    index: 0,
                    reason: "short balanceOf result".into(),
                }),
            // getPriceFull returns (twap, twapPeriod, currPrice); yield
            // valuation uses the current average price.
            LedgerCall::PriceOf { .. } => word(64)
                .map(CallOutcome::Price)
                .ok_or_else(|| SimulationFailure {
                    index: 0,
                    reason: "short getPriceFull result".into(),
                }),
            _ => Ok(CallOutcome::Done),
        }
    }

    async fn submit_public(
        &self,
        tx_req: alloy_rpc_types::TransactionRequest,
    ) -> Result<TxOutcome, ExecutionError> {
        let wallet = EthereumWallet::from(self.signer.clone());
        let rpc_url = self
            .rpc_url
            .parse()
            .map_err(|e| ExecutionError::Submission(format!("bad rpc url: {e}")))?;
        let signer_provider = ProviderBuilder::new()
            .with_recommended_fillers()
            .wallet(wallet)
            .on_http(rpc_url);

        let pending = signer_provider
            .send_transaction(tx_req)
            .await
            .map_err(|e| ExecutionError::Submission(e.to_string()))?;
        let tx_hash = *pending.tx_hash();
        info!("🚀 transaction submitted: {tx_hash}, waiting for inclusion...");

        let receipt = pending
            .get_receipt()
            .await
            .map_err(|e| ExecutionError::Submission(format!("receipt wait failed: {e}")))?;
        if !receipt.status() {
            return Err(ExecutionError::Reverted(format!("{tx_hash}")));
        }
        Ok(TxOutcome {
            tx_hash,
            gas_used: receipt.gas_used as u64,
            block_number: receipt.block_number,
        })
    }

    /// Sign the transaction locally and hand it to the private relay. The
    /// caller decides whether to fall back to the public path.
    async fn submit_private(
        &self,
        relay: &Url,
        mut tx_req: alloy_rpc_types::TransactionRequest,
    ) -> Result<TxOutcome, ExecutionError> {
        let from = self.signer.address();
        let nonce = self
            .provider
            .get_transaction_count(from)
            .await
            .map_err(|e| ExecutionError::RelayRejected(format!("nonce query failed: {e}")))?;
        let chain_id = self
            .provider
            .get_chain_id()
            .await
            .map_err(|e| ExecutionError::RelayRejected(format!("chain id query failed: {e}")))?;
        tx_req.nonce = Some(nonce);
        tx_req.chain_id = Some(chain_id);
        tx_req.from = Some(from);

        let wallet = EthereumWallet::from(self.signer.clone());
        let envelope = tx_req
            .build(&wallet)
            .await
            .map_err(|e| ExecutionError::RelayRejected(format!("signing failed: {e}")))?;
        let raw = format!("0x{}", hex::encode(envelope.encoded_2718()));

        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_sendPrivateTransaction",
            "params": [{ "tx": raw }],
        });
        let resp = self
            .http
            .post(relay.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| ExecutionError::RelayRejected(e.to_string()))?;
        let resp: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| ExecutionError::RelayRejected(format!("bad relay response: {e}")))?;
        if let Some(err) = resp.get("error") {
            return Err(ExecutionError::RelayRejected(err.to_string()));
        }
        let tx_hash: B256 = resp
            .get("result")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| ExecutionError::RelayRejected("relay returned no hash".into()))?;
        info!("🔒 private relay accepted transaction: {tx_hash}");

        self.wait_for_receipt(tx_hash).await
    }

    async fn wait_for_receipt(&self, tx_hash: B256) -> Result<TxOutcome, ExecutionError> {
        const MAX_ATTEMPTS: u32 = 60;
        let mut attempts = 0;
        while attempts < MAX_ATTEMPTS {
            tokio::time::sleep(std::time::Duration::from_secs(2)).await;
            match self.provider.get_transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) => {
                    if !receipt.status() {
                        return Err(ExecutionError::Reverted(format!("{tx_hash}")));
                    }
                    return Ok(TxOutcome {
                        tx_hash,
                        gas_used: receipt.gas_used as u64,
                        block_number: receipt.block_number,
                    });
                }
                Ok(None) => attempts += 1,
                Err(e) => {
                    warn!("receipt poll failed for {tx_hash}: {e}");
                    attempts += 1;
                }
            }
        }
        Err(ExecutionError::Submission(format!(
            "inclusion timeout for {tx_hash}"
        )))
    }
}

#[async_trait]
impl<P> Ledger for OnchainLedger<P>
where
    P: Provider + 'static,
{
    async fn check_liquidation(
        &self,
        liquidator: Address,
        violator: Address,
        underlying: Address,
        collateral: Address,
    ) -> Result<LiquidationCheck> {
        let result = self
            .liquidation
            .function(
                "checkLiquidation",
                &[
                    DynSolValue::Address(liquidator),
                    DynSolValue::Address(violator),
                    DynSolValue::Address(underlying),
                    DynSolValue::Address(collateral),
                ],
            )?
            .call()
            .await?;

        let repay = result
            .first()
            .and_then(|v| v.as_uint())
            .map(|(v, _)| v)
            .ok_or_else(|| eyre::eyre!("bad checkLiquidation result"))?;
        let health_score_after = result
            .get(1)
            .and_then(|v| v.as_uint())
            .map(|(v, _)| v)
            .unwrap_or(U256::ZERO);
        Ok(LiquidationCheck {
            repay,
            health_score_after,
        })
    }

    async fn simulate_batch(
        &self,
        defer_liquidity_checks: &[Address],
        calls: &[LedgerCall],
    ) -> Result<BatchSimulation, SimulationFailure> {
        let args = self
            .encode_batch_args(defer_liquidity_checks, calls)
            .await
            .map_err(|e| SimulationFailure {
                index: 0,
                reason: format!("encode failed: {e}"),
            })?;
        let call = self
            .exec
            .function("batchDispatchSimulate", &args)
            .map_err(|e| SimulationFailure {
                index: 0,
                reason: format!("abi error: {e}"),
            })?;

        let result = call.call().await.map_err(|e| SimulationFailure {
            index: 0,
            reason: e.to_string(),
        })?;

        let responses = match result.first() {
            Some(DynSolValue::Array(items)) => items,
            _ => {
                return Err(SimulationFailure {
                    index: 0,
                    reason: "malformed batch response".into(),
                })
            }
        };

        let mut outcomes = Vec::with_capacity(calls.len());
        for (index, (call, response)) in calls.iter().zip(responses).enumerate() {
            let (success, data) = match response {
                DynSolValue::Tuple(fields) => {
                    let success = fields.first().and_then(|v| v.as_bool()).unwrap_or(false);
                    let data = fields
                        .get(1)
                        .and_then(|v| v.as_bytes())
                        .unwrap_or_default()
                        .to_vec();
                    (success, data)
                }
                _ => (false, Vec::new()),
            };
            if !success {
                return Err(SimulationFailure {
                    index,
                    reason: decode_revert(&data),
                });
            }
            let outcome = Self::decode_outcome(call, &data).map_err(|mut e| {
                e.index = index;
                e
            })?;
            outcomes.push(outcome);
        }

        // Gas estimate for the equivalent committing dispatch; the candidate
        // already simulated clean so failures here are soft.
        let gas_estimate = match self.exec.function("batchDispatch", &args) {
            Ok(dispatch) => match dispatch.estimate_gas().await {
                Ok(gas) => gas as u64,
                Err(e) => {
                    debug!("gas estimate failed, using fallback: {e}");
                    DEFAULT_BATCH_GAS
                }
            },
            Err(_) => DEFAULT_BATCH_GAS,
        };

        Ok(BatchSimulation {
            outcomes,
            gas_estimate,
        })
    }

    async fn submit_batch(
        &self,
        defer_liquidity_checks: &[Address],
        calls: &[LedgerCall],
        opts: &TxOptions,
    ) -> Result<TxOutcome, ExecutionError> {
        let args = self
            .encode_batch_args(defer_liquidity_checks, calls)
            .await
            .map_err(|e| ExecutionError::Submission(format!("encode failed: {e}")))?;
        let call = self
            .exec
            .function("batchDispatch", &args)
            .map_err(|e| ExecutionError::Submission(format!("abi error: {e}")))?;
        let mut tx_req = call.into_transaction_request();

        let base_gas_price = self
            .provider
            .get_gas_price()
            .await
            .map_err(|e| ExecutionError::Submission(format!("gas price query failed: {e}")))?;
        let multiplier = opts.fee_multiplier_bps.unwrap_or(10_000);
        tx_req.gas_price = Some(base_gas_price * multiplier as u128 / 10_000);
        tx_req.gas = Some(opts.gas_limit.unwrap_or(DEFAULT_BATCH_GAS));
        tx_req.from = Some(self.signer.address());

        if opts.use_private_relay {
            if let Some(relay) = &self.relay_url {
                return self.submit_private(relay, tx_req).await;
            }
            warn!("private relay requested but no relay url configured, using public path");
        }
        self.submit_public(tx_req).await
    }

    async fn detailed_liquidity(&self, account: Address) -> Result<Vec<AssetLiquidity>> {
        let result = self
            .exec
            .function("detailedLiquidity", &[DynSolValue::Address(account)])?
            .call()
            .await?;

        let rows = match result.first() {
            Some(DynSolValue::Array(rows)) => rows,
            _ => return Err(eyre::eyre!("malformed detailedLiquidity result")),
        };

        let mut assets = Vec::with_capacity(rows.len());
        for row in rows {
            if let DynSolValue::Tuple(fields) = row {
                let underlying = fields
                    .first()
                    .and_then(|v| v.as_address())
                    .ok_or_else(|| eyre::eyre!("malformed liquidity row"))?;
                let collateral_value = fields
                    .get(1)
                    .and_then(|v| v.as_uint())
                    .map(|(v, _)| v)
                    .unwrap_or(U256::ZERO);
                let liability_value = fields
                    .get(2)
                    .and_then(|v| v.as_uint())
                    .map(|(v, _)| v)
                    .unwrap_or(U256::ZERO);
                assets.push(AssetLiquidity {
                    underlying,
                    collateral_value,
                    liability_value,
                });
            }
        }
        Ok(assets)
    }

    async fn resolve_protected(&self, asset: Address) -> Result<Option<Address>> {
        let result = self
            .markets
            .function("pTokenToUnderlying", &[DynSolValue::Address(asset)])?
            .call()
            .await?;
        let underlying = result
            .first()
            .and_then(|v| v.as_address())
            .ok_or_else(|| eyre::eyre!("bad pTokenToUnderlying result"))?;
        Ok((underlying != Address::ZERO).then_some(underlying))
    }

    async fn decimals(&self, asset: Address) -> Result<u8> {
        let instance =
            Interface::new(self.erc20_abi.clone()).connect(asset, self.provider.clone());
        let result = instance.function("decimals", &[])?.call().await?;
        let (value, _) = result
            .first()
            .and_then(|v| v.as_uint())
            .ok_or_else(|| eyre::eyre!("bad decimals result for {asset}"))?;
        Ok(value.to::<u8>())
    }

    async fn balance_of(&self, token: Address, owner: Address) -> Result<U256> {
        let instance =
            Interface::new(self.erc20_abi.clone()).connect(token, self.provider.clone());
        let result = instance
            .function("balanceOf", &[DynSolValue::Address(owner)])?
            .call()
            .await?;
        let (value, _) = result
            .first()
            .and_then(|v| v.as_uint())
            .ok_or_else(|| eyre::eyre!("bad balanceOf result for {token}"))?;
        Ok(value)
    }

    async fn gas_price(&self) -> Result<u128> {
        Ok(self.provider.get_gas_price().await?)
    }
}

const DEFAULT_BATCH_GAS: u64 = 1_200_000;

/// Decode a `Error(string)` revert payload, falling back to hex.
fn decode_revert(data: &[u8]) -> String {
    if data.len() >= 4 + 32 + 32 && data[..4] == [0x08, 0xc3, 0x79, 0xa0] {
        let len = U256::from_be_slice(&data[36..68]).to::<usize>();
        if let Some(raw) = data.get(68..68 + len) {
            if let Ok(msg) = std::str::from_utf8(raw) {
                return msg.to_string();
            }
        }
    }
    if data.is_empty() {
        "reverted without reason".to_string()
    } else {
        format!("0x{}", hex::encode(data))
    }
}

const EXEC_ABI: &str = r#"[
    {
        "inputs": [
            {
                "components": [
                    {"internalType": "bool", "name": "allowError", "type": "bool"},
                    {"internalType": "address", "name": "proxyAddr", "type": "address"},
                    {"internalType": "bytes", "name": "data", "type": "bytes"}
                ],
                "internalType": "struct Exec.EulerBatchItem[]", "name": "items", "type": "tuple[]"
            },
            {"internalType": "address[]", "name": "deferLiquidityChecks", "type": "address[]"}
        ],
        "name": "batchDispatch", "outputs": [], "stateMutability": "nonpayable", "type": "function"
    },
    {
        "inputs": [
            {
                "components": [
                    {"internalType": "bool", "name": "allowError", "type": "bool"},
                    {"internalType": "address", "name": "proxyAddr", "type": "address"},
                    {"internalType": "bytes", "name": "data", "type": "bytes"}
                ],
                "internalType": "struct Exec.EulerBatchItem[]", "name": "items", "type": "tuple[]"
            },
            {"internalType": "address[]", "name": "deferLiquidityChecks", "type": "address[]"}
        ],
        "name": "batchDispatchSimulate",
        "outputs": [
            {
                "components": [
                    {"internalType": "bool", "name": "success", "type": "bool"},
                    {"internalType": "bytes", "name": "result", "type": "bytes"}
                ],
                "internalType": "struct Exec.EulerBatchItemResponse[]", "name": "response", "type": "tuple[]"
            }
        ],
        "stateMutability": "view", "type": "function"
    },
    {
        "inputs": [
            {"internalType": "address", "name": "pToken", "type": "address"},
            {"internalType": "uint256", "name": "amount", "type": "uint256"}
        ],
        "name": "pTokenUnWrap", "outputs": [], "stateMutability": "nonpayable", "type": "function"
    },
    {
        "inputs": [{"internalType": "address", "name": "underlying", "type": "address"}],
        "name": "getPriceFull",
        "outputs": [
            {"internalType": "uint256", "name": "twap", "type": "uint256"},
            {"internalType": "uint256", "name": "twapPeriod", "type": "uint256"},
            {"internalType": "uint256", "name": "currPrice", "type": "uint256"}
        ],
        "stateMutability": "view", "type": "function"
    },
    {
        "inputs": [{"internalType": "address", "name": "account", "type": "address"}],
        "name": "detailedLiquidity",
        "outputs": [
            {
                "components": [
                    {"internalType": "address", "name": "underlying", "type": "address"},
                    {"internalType": "uint256", "name": "collateralValue", "type": "uint256"},
                    {"internalType": "uint256", "name": "liabilityValue", "type": "uint256"}
                ],
                "internalType": "struct Exec.AssetLiquidity[]", "name": "assets", "type": "tuple[]"
            }
        ],
        "stateMutability": "view", "type": "function"
    }
]"#;

const LIQUIDATION_ABI: &str = r#"[
    {
        "inputs": [
            {"internalType": "address", "name": "liquidator", "type": "address"},
            {"internalType": "address", "name": "violator", "type": "address"},
            {"internalType": "address", "name": "underlying", "type": "address"},
            {"internalType": "address", "name": "collateral", "type": "address"}
        ],
        "name": "checkLiquidation",
        "outputs": [
            {"internalType": "uint256", "name": "repay", "type": "uint256"},
            {"internalType": "uint256", "name": "healthScore", "type": "uint256"}
        ],
        "stateMutability": "view", "type": "function"
    },
    {
        "inputs": [
            {"internalType": "address", "name": "violator", "type": "address"},
            {"internalType": "address", "name": "underlying", "type": "address"},
            {"internalType": "address", "name": "collateral", "type": "address"},
            {"internalType": "uint256", "name": "repay", "type": "uint256"},
            {"internalType": "uint256", "name": "minYield", "type": "uint256"}
        ],
        "name": "liquidate", "outputs": [], "stateMutability": "nonpayable", "type": "function"
    }
]"#;

const SWAP_ABI: &str = r#"[
    {
        "inputs": [
            {
                "components": [
                    {"internalType": "uint256", "name": "subAccountIdIn", "type": "uint256"},
                    {"internalType": "uint256", "name": "subAccountIdOut", "type": "uint256"},
                    {"internalType": "uint256", "name": "amountOut", "type": "uint256"},
                    {"internalType": "uint256", "name": "amountInMaximum", "type": "uint256"},
                    {"internalType": "uint256", "name": "deadline", "type": "uint256"},
                    {"internalType": "bytes", "name": "path", "type": "bytes"}
                ],
                "internalType": "struct Swap.SwapUniExactOutputParams", "name": "params", "type": "tuple"
            },
            {"internalType": "uint256", "name": "targetDebt", "type": "uint256"}
        ],
        "name": "swapAndRepayUni", "outputs": [], "stateMutability": "nonpayable", "type": "function"
    }
]"#;

const MARKETS_ABI: &str = r#"[
    {
        "inputs": [{"internalType": "address", "name": "underlying", "type": "address"}],
        "name": "underlyingToEToken",
        "outputs": [{"internalType": "address", "name": "", "type": "address"}],
        "stateMutability": "view", "type": "function"
    },
    {
        "inputs": [{"internalType": "address", "name": "pToken", "type": "address"}],
        "name": "pTokenToUnderlying",
        "outputs": [{"internalType": "address", "name": "", "type": "address"}],
        "stateMutability": "view", "type": "function"
    },
    {
        "inputs": [
            {"internalType": "uint256", "name": "subAccountId", "type": "uint256"},
            {"internalType": "address", "name": "underlying", "type": "address"}
        ],
        "name": "exitMarket", "outputs": [], "stateMutability": "nonpayable", "type": "function"
    }
]"#;

const ERC20_ABI: &str = r#"[
    {
        "inputs": [{"internalType": "address", "name": "owner", "type": "address"}],
        "name": "balanceOf",
        "outputs": [{"internalType": "uint256", "name": "", "type": "uint256"}],
        "stateMutability": "view", "type": "function"
    },
    {
        "inputs": [],
        "name": "decimals",
        "outputs": [{"internalType": "uint8", "name": "", "type": "uint8"}],
        "stateMutability": "view", "type": "function"
    },
    {
        "inputs": [
            {"internalType": "address", "name": "to", "type": "address"},
            {"internalType": "uint256", "name": "amount", "type": "uint256"}
        ],
        "name": "transfer",
        "outputs": [{"internalType": "bool", "name": "", "type": "bool"}],
        "stateMutability": "nonpayable", "type": "function"
    }
]"#;

const ETOKEN_ABI: &str = r#"[
    {
        "inputs": [{"internalType": "address", "name": "owner", "type": "address"}],
        "name": "balanceOf",
        "outputs": [{"internalType": "uint256", "name": "", "type": "uint256"}],
        "stateMutability": "view", "type": "function"
    },
    {
        "inputs": [
            {"internalType": "uint256", "name": "subAccountId", "type": "uint256"},
            {"internalType": "uint256", "name": "amount", "type": "uint256"}
        ],
        "name": "burn", "outputs": [], "stateMutability": "nonpayable", "type": "function"
    }
]"#;
