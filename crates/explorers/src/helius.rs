//! Helius enhanced transactions API.
//!
//! Helius decodes raw Solana transactions into native and token transfer
//! lists and tags swaps, which is what SOL and token P&L are built from.

use crate::error::ExplorerError;
use crate::http::ApiClient;
use crate::units::lamports_to_sol;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use wallet_core::{NativeTransfer, TokenTransfer, TxActivity, TxKind};

pub const HELIUS_API_URL: &str = "https://api.helius.xyz";

/// Page size accepted by the addresses endpoint.
pub const PAGE_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawNativeTransfer {
    #[serde(default)]
    from_user_account: Option<String>,
    #[serde(default)]
    to_user_account: Option<String>,
    #[serde(default)]
    amount: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTokenTransfer {
    #[serde(default)]
    from_user_account: Option<String>,
    #[serde(default)]
    to_user_account: Option<String>,
    mint: String,
    #[serde(default)]
    token_amount: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEnhancedTx {
    signature: String,
    timestamp: i64,
    #[serde(default, rename = "type")]
    tx_type: String,
    #[serde(default)]
    fee: u64,
    #[serde(default)]
    fee_payer: String,
    #[serde(default)]
    transaction_error: Option<Value>,
    #[serde(default)]
    native_transfers: Vec<RawNativeTransfer>,
    #[serde(default)]
    token_transfers: Vec<RawTokenTransfer>,
    #[serde(default)]
    events: Value,
}

/// One decoded Solana transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSolanaTx {
    pub signature: String,
    pub timestamp: i64,
    pub kind: TxKind,
    /// Fee in SOL.
    pub fee: f64,
    pub fee_payer: String,
    pub failed: bool,
    pub native_transfers: Vec<NativeTransfer>,
    pub token_transfers: Vec<TokenTransfer>,
}

impl ParsedSolanaTx {
    pub fn activity(&self) -> TxActivity {
        TxActivity::new(self.signature.clone(), self.timestamp, self.kind)
    }

    /// Zero-amount transfer carrying the fee, charged to the fee payer.
    pub fn fee_transfer(&self) -> Option<NativeTransfer> {
        if self.fee <= 0.0 || self.fee_payer.is_empty() {
            return None;
        }
        Some(NativeTransfer {
            hash: self.signature.clone(),
            timestamp: self.timestamp,
            from: self.fee_payer.clone(),
            to: String::new(),
            amount: 0.0,
            fee: self.fee,
            failed: self.failed,
        })
    }
}

fn classify(tx_type: &str, events: &Value) -> TxKind {
    if tx_type.eq_ignore_ascii_case("SWAP") || !events["swap"].is_null() {
        TxKind::Swap
    } else if tx_type.eq_ignore_ascii_case("TRANSFER") {
        TxKind::Transfer
    } else {
        TxKind::Other
    }
}

/// Parse one page of enhanced transactions.
pub fn parse_enhanced_transactions(result: Value) -> Result<Vec<ParsedSolanaTx>, ExplorerError> {
    let raw: Vec<RawEnhancedTx> = serde_json::from_value(result)?;
    Ok(raw
        .into_iter()
        .map(|tx| {
            let failed = tx.transaction_error.as_ref().is_some_and(|e| !e.is_null());
            let kind = classify(&tx.tx_type, &tx.events);

            let native_transfers = tx
                .native_transfers
                .into_iter()
                .map(|t| NativeTransfer {
                    hash: tx.signature.clone(),
                    timestamp: tx.timestamp,
                    from: t.from_user_account.unwrap_or_default(),
                    to: t.to_user_account.unwrap_or_default(),
                    amount: lamports_to_sol(t.amount),
                    fee: 0.0,
                    failed,
                })
                .collect();

            let token_transfers = tx
                .token_transfers
                .into_iter()
                .map(|t| TokenTransfer {
                    hash: tx.signature.clone(),
                    timestamp: tx.timestamp,
                    token: t.mint,
                    symbol: None,
                    from: t.from_user_account.unwrap_or_default(),
                    to: t.to_user_account.unwrap_or_default(),
                    amount: t.token_amount,
                })
                .collect();

            ParsedSolanaTx {
                signature: tx.signature,
                timestamp: tx.timestamp,
                kind,
                fee: lamports_to_sol(tx.fee),
                fee_payer: tx.fee_payer,
                failed,
                native_transfers,
                token_transfers,
            }
        })
        .collect())
}

#[derive(Debug, Clone)]
pub struct HeliusClient {
    api: ApiClient,
    base_url: String,
    api_key: String,
}

impl HeliusClient {
    pub fn new(api: ApiClient, api_key: impl Into<String>) -> Self {
        Self {
            api,
            base_url: HELIUS_API_URL.to_string(),
            api_key: api_key.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Fetch up to `max_pages` pages of enhanced transactions, newest first.
    pub async fn enhanced_transactions(
        &self,
        address: &str,
        max_pages: u32,
    ) -> Result<Vec<ParsedSolanaTx>, ExplorerError> {
        let url = format!("{}/v0/addresses/{}/transactions", self.base_url, address);
        let mut all = Vec::new();
        let mut before: Option<String> = None;

        for page in 0..max_pages.max(1) {
            let mut query = vec![
                ("api-key", self.api_key.clone()),
                ("limit", PAGE_SIZE.to_string()),
            ];
            if let Some(sig) = &before {
                query.push(("before", sig.clone()));
            }

            let txs = self
                .api
                .get_with::<Value, _, _>(&url, &query, &[], parse_enhanced_transactions)
                .await?;
            let page_len = txs.len();
            debug!(address, page, count = page_len, "Fetched enhanced transactions");

            before = txs.last().map(|t| t.signature.clone());
            all.extend(txs);

            if page_len < PAGE_SIZE || before.is_none() {
                break;
            }
        }

        Ok(all)
    }
}
