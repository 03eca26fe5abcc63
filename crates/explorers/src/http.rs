//! Shared HTTP plumbing: rate limiting, status mapping and retries.

use crate::error::ExplorerError;
use crate::rate_limit::{Provider, RetryPolicy, SharedRateLimiter};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

const USER_AGENT: &str = concat!("wallet-analyzer-bot/", env!("CARGO_PKG_VERSION"));

/// HTTP client bound to one provider.
///
/// Clones share the underlying connection pool and rate limiter.
#[derive(Debug, Clone)]
pub struct ApiClient {
    provider: Provider,
    http: reqwest::Client,
    limiter: SharedRateLimiter,
    retry: RetryPolicy,
}

impl ApiClient {
    pub fn new(provider: Provider, timeout: Duration) -> Result<Self, ExplorerError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            provider,
            http,
            limiter: SharedRateLimiter::for_provider(provider),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// GET and decode JSON.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        headers: &[(&str, String)],
    ) -> Result<T, ExplorerError> {
        self.get_with(url, query, headers, Ok).await
    }

    /// GET, decode JSON and validate the payload with `extract`.
    ///
    /// Errors returned by `extract` go through the same retry logic as
    /// transport errors, so explorers that signal rate limiting inside a
    /// 200 response are retried too.
    pub async fn get_with<T, R, F>(
        &self,
        url: &str,
        query: &[(&str, String)],
        headers: &[(&str, String)],
        extract: F,
    ) -> Result<R, ExplorerError>
    where
        T: DeserializeOwned,
        F: Fn(T) -> Result<R, ExplorerError>,
    {
        self.execute(
            || {
                let mut request = self.http.get(url).query(query);
                for (name, value) in headers {
                    request = request.header(*name, value);
                }
                request
            },
            extract,
        )
        .await
    }

    /// POST a JSON body, decode and validate the JSON response.
    pub async fn post_with<B, T, R, F>(
        &self,
        url: &str,
        body: &B,
        extract: F,
    ) -> Result<R, ExplorerError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
        F: Fn(T) -> Result<R, ExplorerError>,
    {
        self.execute(|| self.http.post(url).json(body), extract).await
    }

    async fn execute<T, R, B, F>(&self, build: B, extract: F) -> Result<R, ExplorerError>
    where
        T: DeserializeOwned,
        B: Fn() -> reqwest::RequestBuilder,
        F: Fn(T) -> Result<R, ExplorerError>,
    {
        let mut attempt = 0u32;
        loop {
            self.limiter.acquire().await;

            let result = match self.send_once::<T>(build()).await {
                Ok(body) => extract(body),
                Err(e) => Err(e),
            };

            match result {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && self.retry.should_retry(attempt + 1) => {
                    attempt += 1;
                    let backoff = self.retry.calculate_delay_duration(attempt);
                    let delay = e.suggested_retry_delay().map_or(backoff, |d| d.max(backoff));
                    warn!(
                        provider = %self.provider,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying request"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_once<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ExplorerError> {
        let response = request.send().await?;
        let status = response.status();
        debug!(provider = %self.provider, status = status.as_u16(), "Response received");

        if let Some(err) = self.map_status(status) {
            return Err(err);
        }

        Ok(response.json::<T>().await?)
    }

    fn map_status(&self, status: StatusCode) -> Option<ExplorerError> {
        map_status(self.provider, status)
    }
}

/// Map a non-success HTTP status to an error.
pub fn map_status(provider: Provider, status: StatusCode) -> Option<ExplorerError> {
    if status.is_success() {
        return None;
    }
    Some(match status {
        StatusCode::TOO_MANY_REQUESTS => ExplorerError::RateLimited { provider },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ExplorerError::InvalidApiKey { provider }
        }
        other => ExplorerError::Status {
            provider,
            status: other.as_u16(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_server::FakeServer;
    use pretty_assertions::assert_eq;

    fn fast_client(provider: Provider, max_retries: u32) -> ApiClient {
        ApiClient::new(provider, Duration::from_secs(5))
            .unwrap()
            .with_retry_policy(RetryPolicy::new(1, 1, max_retries).without_jitter())
    }

    #[test]
    fn test_map_status() {
        assert!(map_status(Provider::Helius, StatusCode::OK).is_none());
        assert!(matches!(
            map_status(Provider::Helius, StatusCode::TOO_MANY_REQUESTS),
            Some(ExplorerError::RateLimited { provider: Provider::Helius })
        ));
        assert!(matches!(
            map_status(Provider::Solscan, StatusCode::UNAUTHORIZED),
            Some(ExplorerError::InvalidApiKey { .. })
        ));
        assert!(matches!(
            map_status(Provider::Etherscan, StatusCode::BAD_GATEWAY),
            Some(ExplorerError::Status { status: 502, .. })
        ));
    }

    #[test]
    fn test_client_builds() {
        let client = ApiClient::new(Provider::CoinGecko, Duration::from_secs(5)).unwrap();
        assert_eq!(client.provider(), Provider::CoinGecko);
    }

    #[tokio::test]
    async fn test_transient_status_is_retried() {
        let server = FakeServer::start(vec![
            (503, "{}".to_string()),
            (503, "{}".to_string()),
            (200, "1.0".to_string()),
        ])
        .await;
        let client = fast_client(Provider::SolanaRpc, 3);

        let value: f64 = client.get_json(&server.url, &[], &[]).await.unwrap();
        assert_eq!(value, 1.0);
        assert_eq!(server.hits(), 3);
    }

    #[tokio::test]
    async fn test_permanent_status_is_not_retried() {
        let server = FakeServer::always(401, "{}").await;
        let client = fast_client(Provider::Helius, 3);

        let err = client
            .get_json::<serde_json::Value>(&server.url, &[], &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ExplorerError::InvalidApiKey { provider: Provider::Helius }));
        assert_eq!(server.hits(), 1);
    }

    #[tokio::test]
    async fn test_retries_stop_after_policy_limit() {
        let server = FakeServer::always(502, "{}").await;
        let client = fast_client(Provider::Solscan, 2);

        let err = client
            .get_json::<serde_json::Value>(&server.url, &[], &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ExplorerError::Status { status: 502, .. }));
        assert_eq!(server.hits(), 3);
    }

    #[tokio::test]
    async fn test_extract_error_goes_through_retry() {
        let server = FakeServer::start(vec![
            (200, r#"{"ok":false}"#.to_string()),
            (200, r#"{"ok":true}"#.to_string()),
        ])
        .await;
        let client = fast_client(Provider::SolanaRpc, 3);

        let ok = client
            .post_with(&server.url, &serde_json::json!({}), |v: serde_json::Value| {
                if v["ok"] == true {
                    Ok(true)
                } else {
                    Err(ExplorerError::RateLimited {
                        provider: Provider::SolanaRpc,
                    })
                }
            })
            .await
            .unwrap();
        assert!(ok);
        assert_eq!(server.hits(), 2);
    }
}
