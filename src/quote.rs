use alloy_primitives::{Address, U256};
use tracing::debug;
use url::Url;

/// Best-effort client for an external swap-quote service. Quotes are
/// attached to opportunities for reporting only and never gate execution,
/// so every failure degrades to `None`.
pub struct QuoteClient {
    http: reqwest::Client,
    base_url: Url,
}

impl QuoteClient {
    pub fn new(base_url: Url) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
        }
    }

    /// Quote an exact-output swap `token_in -> token_out`.
    pub async fn exact_output_quote(
        &self,
        token_in: Address,
        token_out: Address,
        amount_out: U256,
    ) -> Option<serde_json::Value> {
        let mut url = self.base_url.clone();
        url.path_segments_mut().ok()?.push("quote");
        url.query_pairs_mut()
            .append_pair("tokenIn", &format!("{token_in}"))
            .append_pair("tokenOut", &format!("{token_out}"))
            .append_pair("amountOut", &amount_out.to_string());

        match self.http.get(url).send().await {
            Ok(resp) if resp.status().is_success() => match resp.json().await {
                Ok(body) => Some(body),
                Err(e) => {
                    debug!("quote response did not parse: {e}");
                    None
                }
            },
            Ok(resp) => {
                debug!("quote service returned {}", resp.status());
                None
            }
            Err(e) => {
                debug!("quote request failed: {e}");
                None
            }
        }
    }
}
