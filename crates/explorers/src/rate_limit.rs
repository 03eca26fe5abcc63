//! Per-provider request rate limiting and retry backoff.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// External API a request is sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Provider {
    Etherscan,
    SolanaRpc,
    Helius,
    Solscan,
    CoinGecko,
}

impl Provider {
    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Etherscan => "Etherscan",
            Provider::SolanaRpc => "Solana RPC",
            Provider::Helius => "Helius",
            Provider::Solscan => "Solscan",
            Provider::CoinGecko => "CoinGecko",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request budget for a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderRateLimit {
    /// Maximum requests per window
    pub max_requests: u32,
    /// Time window in milliseconds
    pub window_ms: u64,
    /// Minimum delay between requests in milliseconds
    pub min_delay_ms: u64,
}

impl ProviderRateLimit {
    pub const fn new(max_requests: u32, window_ms: u64, min_delay_ms: u64) -> Self {
        Self {
            max_requests,
            window_ms,
            min_delay_ms,
        }
    }

    /// Free-tier limits:
    /// - **Etherscan**: 5 calls/sec per key
    /// - **Solana RPC**: public mainnet endpoint tolerates ~10 req/sec per IP
    /// - **Helius**: 10 req/sec on the free plan
    /// - **Solscan**: 10 req/sec (conservative)
    /// - **CoinGecko**: 30 calls/min demo plan, kept at 25
    pub fn for_provider(provider: Provider) -> Self {
        match provider {
            Provider::Etherscan => Self::new(5, 1000, 200),
            Provider::SolanaRpc => Self::new(10, 1000, 100),
            Provider::Helius => Self::new(10, 1000, 100),
            Provider::Solscan => Self::new(10, 1000, 100),
            Provider::CoinGecko => Self::new(25, 60_000, 500),
        }
    }

    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay_ms)
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

/// Token bucket rate limiter.
///
/// Tokens are replenished continuously over the window and one token is
/// consumed per request.
#[derive(Debug)]
pub struct RateLimiter {
    config: ProviderRateLimit,
    tokens: f64,
    last_update: Instant,
    last_send: Option<Instant>,
}

impl RateLimiter {
    pub fn new(config: ProviderRateLimit) -> Self {
        Self {
            tokens: config.max_requests as f64,
            last_update: Instant::now(),
            last_send: None,
            config,
        }
    }

    pub fn for_provider(provider: Provider) -> Self {
        Self::new(ProviderRateLimit::for_provider(provider))
    }

    fn replenish(&mut self) {
        let now = Instant::now();
        let elapsed_ms = now.duration_since(self.last_update).as_millis() as f64;
        let tokens_to_add =
            (elapsed_ms / self.config.window_ms as f64) * self.config.max_requests as f64;

        self.tokens = (self.tokens + tokens_to_add).min(self.config.max_requests as f64);
        self.last_update = now;
    }

    /// Try to take a token. Returns `false` if rate limited.
    pub fn try_acquire(&mut self) -> bool {
        self.replenish();

        if let Some(last) = self.last_send {
            if last.elapsed() < self.config.min_delay() {
                return false;
            }
        }

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            self.last_send = Some(Instant::now());
            true
        } else {
            false
        }
    }

    /// Time until a token becomes available, `Duration::ZERO` if one is now.
    pub fn time_until_available(&mut self) -> Duration {
        self.replenish();

        if let Some(last) = self.last_send {
            let since_last = last.elapsed();
            let min_delay = self.config.min_delay();
            if since_last < min_delay {
                return min_delay - since_last;
            }
        }

        if self.tokens >= 1.0 {
            Duration::ZERO
        } else {
            let tokens_needed = 1.0 - self.tokens;
            let time_per_token = self.config.window_ms as f64 / self.config.max_requests as f64;
            Duration::from_millis((tokens_needed * time_per_token).ceil() as u64)
        }
    }
}

/// Rate limiter shared by every request to one provider.
#[derive(Debug, Clone)]
pub struct SharedRateLimiter {
    inner: Arc<Mutex<RateLimiter>>,
}

impl SharedRateLimiter {
    pub fn new(config: ProviderRateLimit) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RateLimiter::new(config))),
        }
    }

    pub fn for_provider(provider: Provider) -> Self {
        Self::new(ProviderRateLimit::for_provider(provider))
    }

    /// Wait until a token is available and take it.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut limiter = self.inner.lock().await;
                if limiter.try_acquire() {
                    return;
                }
                limiter.time_until_available()
            };
            tokio::time::sleep(wait.max(Duration::from_millis(1))).await;
        }
    }
}

/// Exponential backoff for retrying transient failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    initial_delay_ms: u64,
    max_delay_ms: u64,
    max_retries: u32,
    jitter_enabled: bool,
}

impl RetryPolicy {
    pub fn new(initial_delay_ms: u64, max_delay_ms: u64, max_retries: u32) -> Self {
        Self {
            initial_delay_ms,
            max_delay_ms,
            max_retries,
            jitter_enabled: true,
        }
    }

    /// No retries at all.
    pub fn none() -> Self {
        Self::new(0, 0, 0)
    }

    /// Disable jitter (useful for testing).
    pub fn without_jitter(mut self) -> Self {
        self.jitter_enabled = false;
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Delay before retry `attempt` (1-based): 500ms → 1s → 2s → ...
    /// capped at `max_delay_ms`, plus 0-25% jitter.
    pub fn calculate_delay(&self, attempt: u32) -> u64 {
        let backoff_power = attempt.saturating_sub(1).min(8);
        let exponential = self.initial_delay_ms.saturating_mul(1 << backoff_power);
        let capped = exponential.min(self.max_delay_ms);

        if self.jitter_enabled {
            let jitter = (capped as f64 * rand::thread_rng().gen::<f64>() * 0.25) as u64;
            capped + jitter
        } else {
            capped
        }
    }

    pub fn calculate_delay_duration(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.calculate_delay(attempt))
    }

    /// Returns `true` if `attempt <= max_retries`.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt <= self.max_retries
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: 500,
            max_delay_ms: 8_000,
            max_retries: 3,
            jitter_enabled: true,
        }
    }
}
