//! Solana JSON-RPC client.

use crate::error::ExplorerError;
use crate::http::ApiClient;
use crate::rate_limit::Provider;
use crate::units::lamports_to_sol;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;
use wallet_core::{TxActivity, TxKind};

pub const DEFAULT_RPC_URL: &str = "https://api.mainnet-beta.solana.com";

/// `getSignaturesForAddress` returns at most this many entries per call.
pub const MAX_SIGNATURES: u32 = 1000;

#[derive(Debug, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

/// Unwrap a JSON-RPC response into its `result`.
pub fn unwrap_rpc(response: RpcResponse) -> Result<Value, ExplorerError> {
    let provider = Provider::SolanaRpc;
    if let Some(err) = response.error {
        // -32429 is used by several RPC providers for per-IP throttling
        if err.code == -32429 || err.message.to_ascii_lowercase().contains("rate limit") {
            return Err(ExplorerError::RateLimited { provider });
        }
        return Err(ExplorerError::Api {
            provider,
            message: format!("{} (code {})", err.message, err.code),
        });
    }
    response.result.ok_or_else(|| {
        ExplorerError::Parse("RPC response has neither result nor error".to_string())
    })
}

/// Parse a `getBalance` result (`{context, value}`) into SOL.
pub fn parse_balance(result: Value) -> Result<f64, ExplorerError> {
    let lamports = result["value"]
        .as_u64()
        .ok_or_else(|| ExplorerError::Parse("getBalance value missing".to_string()))?;
    Ok(lamports_to_sol(lamports))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSignature {
    signature: String,
    #[serde(default)]
    block_time: Option<i64>,
}

/// Parse `getSignaturesForAddress`, dropping entries without a block time.
pub fn parse_signatures(result: Value) -> Result<Vec<TxActivity>, ExplorerError> {
    let raw: Vec<RawSignature> = serde_json::from_value(result)?;
    Ok(raw
        .into_iter()
        .filter_map(|s| {
            s.block_time
                .map(|ts| TxActivity::new(s.signature, ts, TxKind::Other))
        })
        .collect())
}

#[derive(Debug, Clone)]
pub struct SolanaRpcClient {
    api: ApiClient,
    url: String,
}

impl SolanaRpcClient {
    pub fn new(api: ApiClient, url: impl Into<String>) -> Self {
        Self {
            api,
            url: url.into(),
        }
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, ExplorerError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        self.api
            .post_with::<_, RpcResponse, _, _>(&self.url, &body, unwrap_rpc)
            .await
    }

    /// Balance in SOL.
    pub async fn balance(&self, address: &str) -> Result<f64, ExplorerError> {
        let balance = parse_balance(self.call("getBalance", json!([address])).await?)?;
        debug!(address, balance, "Fetched SOL balance");
        Ok(balance)
    }

    /// Most recent signatures, newest first.
    pub async fn signatures(
        &self,
        address: &str,
        limit: u32,
    ) -> Result<Vec<TxActivity>, ExplorerError> {
        let params = json!([address, { "limit": limit.min(MAX_SIGNATURES) }]);
        let signatures = parse_signatures(self.call("getSignaturesForAddress", params).await?)?;
        debug!(address, count = signatures.len(), "Fetched signatures");
        Ok(signatures)
    }
}
