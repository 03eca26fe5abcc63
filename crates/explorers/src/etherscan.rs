//! Etherscan-family explorer client (Etherscan, BscScan, PolygonScan).

use crate::error::ExplorerError;
use crate::http::ApiClient;
use crate::rate_limit::Provider;
use crate::units::scale_units;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use wallet_core::{Chain, NativeTransfer, TokenTransfer};

/// Etherscan API V2 multichain endpoint.
pub const ETHERSCAN_V2_URL: &str = "https://api.etherscan.io/v2/api";

/// Legacy per-chain endpoint for chains with their own explorer key.
pub fn legacy_url(chain: Chain) -> Option<&'static str> {
    match chain {
        Chain::Bsc => Some("https://api.bscscan.com/api"),
        Chain::Polygon => Some("https://api.polygonscan.com/api"),
        Chain::Ethereum => Some("https://api.etherscan.io/api"),
        Chain::Solana => None,
    }
}

/// Standard `{status, message, result}` response wrapper.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub result: Value,
}

/// Unwrap the envelope, mapping explorer-level failures to errors.
///
/// "No transactions found" is reported with status 0 but is an empty
/// result, not a failure.
pub fn unwrap_envelope(envelope: Envelope) -> Result<Value, ExplorerError> {
    let provider = Provider::Etherscan;
    if envelope.status == "1" {
        return Ok(envelope.result);
    }

    let message = envelope.message.to_ascii_lowercase();
    if message.contains("no transactions found") || message.contains("no records found") {
        return Ok(Value::Array(Vec::new()));
    }

    let detail = match &envelope.result {
        Value::String(s) => s.clone(),
        _ => envelope.message.clone(),
    };
    let detail_lower = detail.to_ascii_lowercase();

    if detail_lower.contains("rate limit") {
        Err(ExplorerError::RateLimited { provider })
    } else if detail_lower.contains("invalid api key")
        || detail_lower.contains("missing/invalid api key")
    {
        Err(ExplorerError::InvalidApiKey { provider })
    } else {
        Err(ExplorerError::Api {
            provider,
            message: detail,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTx {
    hash: String,
    time_stamp: String,
    #[serde(default)]
    from: String,
    #[serde(default)]
    to: String,
    #[serde(default)]
    value: String,
    #[serde(default)]
    gas_used: String,
    #[serde(default)]
    gas_price: String,
    #[serde(default)]
    is_error: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTokenTx {
    hash: String,
    time_stamp: String,
    #[serde(default)]
    from: String,
    #[serde(default)]
    to: String,
    #[serde(default)]
    value: String,
    contract_address: String,
    #[serde(default)]
    token_symbol: String,
    #[serde(default)]
    token_decimal: String,
}

fn parse_timestamp(raw: &str) -> Result<i64, ExplorerError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| ExplorerError::Parse(format!("invalid timestamp '{}'", raw)))
}

/// Parse a `txlist` result into native transfers.
pub fn parse_transactions(result: Value) -> Result<Vec<NativeTransfer>, ExplorerError> {
    let raw: Vec<RawTx> = serde_json::from_value(result)?;
    raw.into_iter()
        .map(|tx| {
            let gas_used = scale_units(&tx.gas_used, 0)?;
            let gas_price = scale_units(&tx.gas_price, 18)?;
            Ok(NativeTransfer {
                timestamp: parse_timestamp(&tx.time_stamp)?,
                amount: scale_units(&tx.value, 18)?,
                fee: gas_used * gas_price,
                failed: tx.is_error == "1",
                hash: tx.hash,
                from: tx.from,
                to: tx.to,
            })
        })
        .collect()
}

/// Parse a `tokentx` result into token transfers.
///
/// Transfers of tokens that report no decimals are skipped since their
/// amounts cannot be scaled.
pub fn parse_token_transfers(result: Value) -> Result<Vec<TokenTransfer>, ExplorerError> {
    let raw: Vec<RawTokenTx> = serde_json::from_value(result)?;
    let mut transfers = Vec::with_capacity(raw.len());
    for tx in raw {
        let Ok(decimals) = tx.token_decimal.trim().parse::<u32>() else {
            debug!(
                hash = %tx.hash,
                token = %tx.contract_address,
                "Skipping token transfer without decimals"
            );
            continue;
        };
        transfers.push(TokenTransfer {
            timestamp: parse_timestamp(&tx.time_stamp)?,
            amount: scale_units(&tx.value, decimals)?,
            token: tx.contract_address.to_ascii_lowercase(),
            symbol: Some(tx.token_symbol).filter(|s| !s.is_empty()),
            hash: tx.hash,
            from: tx.from,
            to: tx.to,
        });
    }
    Ok(transfers)
}

/// Parse a `balance` result (wei string).
pub fn parse_balance(result: Value) -> Result<f64, ExplorerError> {
    match result {
        Value::String(s) => scale_units(&s, 18),
        other => Err(ExplorerError::Parse(format!("unexpected balance result: {}", other))),
    }
}

/// Client for one EVM chain.
#[derive(Debug, Clone)]
pub struct EtherscanClient {
    api: ApiClient,
    chain: Chain,
    base_url: String,
    api_key: String,
    /// `chainid` query parameter, only sent to the V2 endpoint.
    chain_id: Option<u64>,
}

impl EtherscanClient {
    /// Client for the V2 multichain endpoint.
    pub fn v2(api: ApiClient, chain: Chain, api_key: impl Into<String>) -> Self {
        Self {
            api,
            chain,
            base_url: ETHERSCAN_V2_URL.to_string(),
            api_key: api_key.into(),
            chain_id: chain.evm_chain_id(),
        }
    }

    /// Client for a chain-specific legacy endpoint (BscScan, PolygonScan keys).
    pub fn legacy(
        api: ApiClient,
        chain: Chain,
        api_key: impl Into<String>,
    ) -> Result<Self, ExplorerError> {
        let base_url = legacy_url(chain).ok_or(ExplorerError::NotConfigured("EVM explorer"))?;
        Ok(Self {
            api,
            chain,
            base_url: base_url.to_string(),
            api_key: api_key.into(),
            chain_id: None,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn chain(&self) -> Chain {
        self.chain
    }

    fn query(&self, action: &str, address: &str) -> Vec<(&'static str, String)> {
        let mut query = Vec::with_capacity(10);
        if let Some(id) = self.chain_id {
            query.push(("chainid", id.to_string()));
        }
        query.push(("module", "account".to_string()));
        query.push(("action", action.to_string()));
        query.push(("address", address.to_string()));
        query.push(("apikey", self.api_key.clone()));
        query
    }

    async fn call(&self, query: Vec<(&'static str, String)>) -> Result<Value, ExplorerError> {
        self.api
            .get_with::<Envelope, _, _>(&self.base_url, &query, &[], unwrap_envelope)
            .await
    }

    /// Native coin balance.
    pub async fn balance(&self, address: &str) -> Result<f64, ExplorerError> {
        let mut query = self.query("balance", address);
        query.push(("tag", "latest".to_string()));
        let balance = parse_balance(self.call(query).await?)?;
        debug!(chain = %self.chain, address, balance, "Fetched balance");
        Ok(balance)
    }

    /// Most recent normal transactions, newest first.
    pub async fn transactions(
        &self,
        address: &str,
        limit: u32,
    ) -> Result<Vec<NativeTransfer>, ExplorerError> {
        let query = self.paged_query("txlist", address, limit);
        let txs = parse_transactions(self.call(query).await?)?;
        debug!(chain = %self.chain, address, count = txs.len(), "Fetched transactions");
        Ok(txs)
    }

    /// Most recent ERC-20 transfers, newest first.
    pub async fn token_transfers(
        &self,
        address: &str,
        limit: u32,
    ) -> Result<Vec<TokenTransfer>, ExplorerError> {
        let query = self.paged_query("tokentx", address, limit);
        let transfers = parse_token_transfers(self.call(query).await?)?;
        debug!(chain = %self.chain, address, count = transfers.len(), "Fetched token transfers");
        Ok(transfers)
    }

    fn paged_query(&self, action: &str, address: &str, limit: u32) -> Vec<(&'static str, String)> {
        let mut query = self.query(action, address);
        query.push(("startblock", "0".to_string()));
        query.push(("endblock", "99999999".to_string()));
        query.push(("page", "1".to_string()));
        query.push(("offset", limit.to_string()));
        query.push(("sort", "desc".to_string()));
        query
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn envelope(value: Value) -> Envelope {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_envelope_ok() {
        let result = unwrap_envelope(envelope(json!({
            "status": "1", "message": "OK", "result": "42"
        })))
        .unwrap();
        assert_eq!(result, json!("42"));
    }

    #[test]
    fn test_envelope_no_transactions_is_empty() {
        let result = unwrap_envelope(envelope(json!({
            "status": "0", "message": "No transactions found", "result": []
        })))
        .unwrap();
        assert_eq!(result, json!([]));
    }

    #[test]
    fn test_envelope_rate_limit_is_transient() {
        let err = unwrap_envelope(envelope(json!({
            "status": "0", "message": "NOTOK",
            "result": "Max rate limit reached, please use API Key for higher rate limit"
        })))
        .unwrap_err();
        assert!(matches!(err, ExplorerError::RateLimited { .. }));
        assert!(err.is_transient());
    }

    #[test]
    fn test_envelope_invalid_key() {
        let err = unwrap_envelope(envelope(json!({
            "status": "0", "message": "NOTOK", "result": "Invalid API Key"
        })))
        .unwrap_err();
        assert!(matches!(err, ExplorerError::InvalidApiKey { .. }));
    }

    #[test]
    fn test_envelope_other_error() {
        let err = unwrap_envelope(envelope(json!({
            "status": "0", "message": "NOTOK", "result": "Error! Invalid address format"
        })))
        .unwrap_err();
        assert_eq!(err.to_string(), "Etherscan: Error! Invalid address format");
    }

    #[test]
    fn test_parse_transactions() {
        let txs = parse_transactions(json!([{
            "blockNumber": "19000000",
            "timeStamp": "1700000000",
            "hash": "0xabc",
            "from": "0xAAA",
            "to": "0xbbb",
            "value": "2000000000000000000",
            "gasUsed": "21000",
            "gasPrice": "10000000000",
            "isError": "0",
            "functionName": ""
        }, {
            "timeStamp": "1700000100",
            "hash": "0xdef",
            "from": "0xbbb",
            "to": "",
            "value": "0",
            "gasUsed": "50000",
            "gasPrice": "10000000000",
            "isError": "1"
        }]))
        .unwrap();

        assert_eq!(txs.len(), 2);
        assert_eq!(txs[0].timestamp, 1_700_000_000);
        assert!((txs[0].amount - 2.0).abs() < 1e-12);
        assert!((txs[0].fee - 0.00021).abs() < 1e-12);
        assert!(!txs[0].failed);
        assert!(txs[1].failed);
        assert_eq!(txs[1].to, "");
    }

    #[test]
    fn test_parse_token_transfers_uses_decimals() {
        let transfers = parse_token_transfers(json!([{
            "timeStamp": "1700000000",
            "hash": "0x1",
            "from": "0xaaa",
            "to": "0xbbb",
            "value": "2500000",
            "contractAddress": "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48",
            "tokenSymbol": "USDC",
            "tokenDecimal": "6"
        }]))
        .unwrap();

        assert_eq!(transfers.len(), 1);
        assert!((transfers[0].amount - 2.5).abs() < 1e-12);
        assert_eq!(transfers[0].symbol.as_deref(), Some("USDC"));
        assert_eq!(transfers[0].token, "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48");
    }

    #[test]
    fn test_parse_token_transfers_skips_missing_decimals() {
        let transfers = parse_token_transfers(json!([{
            "timeStamp": "1700000000",
            "hash": "0x1",
            "from": "0xaaa",
            "to": "0xbbb",
            "value": "1000",
            "contractAddress": "0xdead",
            "tokenSymbol": "ODD",
            "tokenDecimal": ""
        }, {
            "timeStamp": "1700000001",
            "hash": "0x2",
            "from": "0xaaa",
            "to": "0xbbb",
            "value": "1000",
            "contractAddress": "0xbeef",
            "tokenSymbol": "TKN",
            "tokenDecimal": "3"
        }]))
        .unwrap();

        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].hash, "0x2");
        assert!((transfers[0].amount - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_parse_balance() {
        assert!((parse_balance(json!("500000000000000000")).unwrap() - 0.5).abs() < 1e-12);
        assert!(parse_balance(json!(12)).is_err());
    }

    #[test]
    fn test_v2_query_includes_chain_id() {
        let api = ApiClient::new(Provider::Etherscan, std::time::Duration::from_secs(5)).unwrap();
        let client = EtherscanClient::v2(api.clone(), Chain::Bsc, "KEY");
        let query = client.query("balance", "0xabc");
        assert_eq!(query[0], ("chainid", "56".to_string()));

        let legacy = EtherscanClient::legacy(api, Chain::Polygon, "PKEY").unwrap();
        assert!(legacy.query("balance", "0xabc").iter().all(|(k, _)| *k != "chainid"));
        assert_eq!(legacy.base_url, "https://api.polygonscan.com/api");
    }

    #[tokio::test]
    async fn test_payload_rate_limit_is_retried() {
        let server = crate::test_server::FakeServer::start(vec![
            (
                200,
                json!({
                    "status": "0",
                    "message": "NOTOK",
                    "result": "Max rate limit reached"
                })
                .to_string(),
            ),
            (
                200,
                json!({
                    "status": "1",
                    "message": "OK",
                    "result": "1000000000000000000"
                })
                .to_string(),
            ),
        ])
        .await;
        let api = ApiClient::new(Provider::Etherscan, std::time::Duration::from_secs(5))
            .unwrap()
            .with_retry_policy(crate::RetryPolicy::new(1, 1, 3).without_jitter());
        let client = EtherscanClient::v2(api, Chain::Ethereum, "KEY").with_base_url(&server.url);

        let balance = client.balance("0xabc").await.unwrap();
        assert!((balance - 1.0).abs() < 1e-12);
        assert_eq!(server.hits(), 2);
    }
}
