//! Native coin USD prices from CoinGecko.

use crate::error::ExplorerError;
use crate::http::ApiClient;
use dashmap::DashMap;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};
use wallet_core::Chain;

pub const COINGECKO_API_URL: &str = "https://api.coingecko.com/api/v3";

/// How long a fetched price is served from cache.
pub const PRICE_TTL: Duration = Duration::from_secs(60);

/// CoinGecko coin id for a chain's native coin.
pub fn coingecko_id(chain: Chain) -> &'static str {
    match chain {
        Chain::Ethereum => "ethereum",
        Chain::Bsc => "binancecoin",
        Chain::Polygon => "polygon-ecosystem-token",
        Chain::Solana => "solana",
    }
}

/// Parse a `simple/price` response into per-chain USD prices.
pub fn parse_prices(response: &Value) -> HashMap<Chain, f64> {
    Chain::all()
        .iter()
        .filter_map(|chain| {
            response[coingecko_id(*chain)]["usd"]
                .as_f64()
                .filter(|p| *p > 0.0)
                .map(|p| (*chain, p))
        })
        .collect()
}

#[derive(Debug, Clone, Copy)]
struct CachedPrice {
    usd: f64,
    fetched_at: Instant,
}

/// Price lookups with a short in-memory cache.
///
/// One request refreshes all supported coins.
#[derive(Debug, Clone)]
pub struct PriceClient {
    api: ApiClient,
    base_url: String,
    api_key: Option<String>,
    cache: Arc<DashMap<Chain, CachedPrice>>,
    ttl: Duration,
}

impl PriceClient {
    pub fn new(api: ApiClient, api_key: Option<String>) -> Self {
        Self {
            api,
            base_url: COINGECKO_API_URL.to_string(),
            api_key,
            cache: Arc::new(DashMap::new()),
            ttl: PRICE_TTL,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    fn cached(&self, chain: Chain, max_age: Option<Duration>) -> Option<f64> {
        self.cache.get(&chain).and_then(|entry| match max_age {
            Some(age) if entry.fetched_at.elapsed() > age => None,
            _ => Some(entry.usd),
        })
    }

    /// Store prices as if just fetched.
    pub fn store(&self, prices: &HashMap<Chain, f64>) {
        let now = Instant::now();
        for (chain, usd) in prices {
            self.cache.insert(
                *chain,
                CachedPrice {
                    usd: *usd,
                    fetched_at: now,
                },
            );
        }
    }

    async fn fetch_all(&self) -> Result<HashMap<Chain, f64>, ExplorerError> {
        let ids = Chain::all()
            .iter()
            .map(|c| coingecko_id(*c))
            .collect::<Vec<_>>()
            .join(",");
        let query = [("ids", ids), ("vs_currencies", "usd".to_string())];
        let headers: Vec<(&str, String)> = self
            .api_key
            .iter()
            .map(|key| ("x-cg-demo-api-key", key.clone()))
            .collect();

        let url = format!("{}/simple/price", self.base_url);
        let response: Value = self.api.get_json(&url, &query, &headers).await?;
        let prices = parse_prices(&response);
        debug!(count = prices.len(), "Fetched native coin prices");
        Ok(prices)
    }

    /// USD price of the chain's native coin.
    ///
    /// Falls back to a stale cached price when the API fails, and to `None`
    /// when nothing was ever fetched.
    pub async fn native_usd(&self, chain: Chain) -> Option<f64> {
        if let Some(price) = self.cached(chain, Some(self.ttl)) {
            return Some(price);
        }

        match self.fetch_all().await {
            Ok(prices) => {
                self.store(&prices);
                prices.get(&chain).copied()
            }
            Err(e) => {
                warn!(chain = %chain, error = %e, "Price fetch failed");
                self.cached(chain, None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::Provider;
    use serde_json::json;

    #[test]
    fn test_parse_prices() {
        let prices = parse_prices(&json!({
            "ethereum": { "usd": 3000.5 },
            "binancecoin": { "usd": 600.0 },
            "solana": { "usd": 0 },
            "unknown": { "usd": 1.0 }
        }));
        assert_eq!(prices.get(&Chain::Ethereum), Some(&3000.5));
        assert_eq!(prices.get(&Chain::Bsc), Some(&600.0));
        assert_eq!(prices.get(&Chain::Solana), None);
        assert_eq!(prices.get(&Chain::Polygon), None);
    }

    #[tokio::test]
    async fn test_cached_price_served_without_request() {
        let api = ApiClient::new(Provider::CoinGecko, Duration::from_secs(1)).unwrap();
        // Unroutable base URL: any request would fail
        let client = PriceClient::new(api, None).with_base_url("http://127.0.0.1:9");
        client.store(&HashMap::from([(Chain::Solana, 144.0)]));

        assert_eq!(client.native_usd(Chain::Solana).await, Some(144.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_cache_is_stale() {
        let api = ApiClient::new(Provider::CoinGecko, Duration::from_secs(1)).unwrap();
        let client = PriceClient::new(api, None).with_ttl(Duration::from_secs(60));
        client.store(&HashMap::from([(Chain::Ethereum, 3000.0)]));

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(client.cached(Chain::Ethereum, Some(PRICE_TTL)), None);
        assert_eq!(client.cached(Chain::Ethereum, None), Some(3000.0));
    }
}
