//! Solscan Pro API client (account detail, token metadata).

use crate::error::ExplorerError;
use crate::http::ApiClient;
use crate::rate_limit::Provider;
use crate::units::lamports_to_sol;
use dashmap::DashMap;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

pub const SOLSCAN_API_URL: &str = "https://pro-api.solscan.io/v2.0";

#[derive(Debug, Deserialize)]
pub struct SolscanResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub errors: Value,
}

pub fn unwrap_response(response: SolscanResponse) -> Result<Value, ExplorerError> {
    if response.success {
        return Ok(response.data);
    }
    let message = response.errors["message"]
        .as_str()
        .unwrap_or("request failed")
        .to_string();
    if message.to_ascii_lowercase().contains("too many requests") {
        return Err(ExplorerError::RateLimited {
            provider: Provider::Solscan,
        });
    }
    Err(ExplorerError::Api {
        provider: Provider::Solscan,
        message,
    })
}

/// Balance in SOL from an account detail payload.
pub fn parse_account_balance(data: Value) -> Result<f64, ExplorerError> {
    data["lamports"]
        .as_u64()
        .map(lamports_to_sol)
        .ok_or_else(|| ExplorerError::Parse("account lamports missing".to_string()))
}

pub fn parse_token_symbol(data: Value) -> Option<String> {
    data["symbol"]
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[derive(Debug, Clone)]
pub struct SolscanClient {
    api: ApiClient,
    base_url: String,
    api_key: String,
    /// mint -> symbol (None when Solscan has no metadata)
    symbols: Arc<DashMap<String, Option<String>>>,
}

impl SolscanClient {
    pub fn new(api: ApiClient, api_key: impl Into<String>) -> Self {
        Self {
            api,
            base_url: SOLSCAN_API_URL.to_string(),
            api_key: api_key.into(),
            symbols: Arc::new(DashMap::new()),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn get(&self, path: &str, address: &str) -> Result<Value, ExplorerError> {
        let url = format!("{}{}", self.base_url, path);
        self.api
            .get_with::<SolscanResponse, _, _>(
                &url,
                &[("address", address.to_string())],
                &[("token", self.api_key.clone())],
                unwrap_response,
            )
            .await
    }

    /// SOL balance of an account.
    pub async fn account_balance(&self, address: &str) -> Result<f64, ExplorerError> {
        parse_account_balance(self.get("/account/detail", address).await?)
    }

    /// Ticker for an SPL mint, cached for the lifetime of the client.
    pub async fn token_symbol(&self, mint: &str) -> Result<Option<String>, ExplorerError> {
        if let Some(cached) = self.symbols.get(mint) {
            return Ok(cached.value().clone());
        }
        let symbol = parse_token_symbol(self.get("/token/meta", mint).await?);
        debug!(mint, symbol = ?symbol, "Fetched token metadata");
        self.symbols.insert(mint.to_string(), symbol.clone());
        Ok(symbol)
    }
}
