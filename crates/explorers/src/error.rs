//! Error types for explorer API calls.

use crate::rate_limit::Provider;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while talking to an explorer or price API.
#[derive(Debug, Error)]
pub enum ExplorerError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("{provider} returned HTTP {status}")]
    Status { provider: Provider, status: u16 },

    #[error("{provider} rate limit exceeded")]
    RateLimited { provider: Provider },

    #[error("{provider} rejected the API key")]
    InvalidApiKey { provider: Provider },

    #[error("{provider}: {message}")]
    Api { provider: Provider, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("{0} is not configured")]
    NotConfigured(&'static str),
}

impl From<reqwest::Error> for ExplorerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ExplorerError::Timeout(err.to_string())
        } else if err.is_decode() {
            ExplorerError::Parse(err.to_string())
        } else {
            ExplorerError::Http(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ExplorerError {
    fn from(err: serde_json::Error) -> Self {
        ExplorerError::Parse(err.to_string())
    }
}

impl ExplorerError {
    /// Returns true if this error is transient and likely to succeed on retry.
    pub fn is_transient(&self) -> bool {
        match self {
            ExplorerError::Http(_)
            | ExplorerError::Timeout(_)
            | ExplorerError::RateLimited { .. } => true,
            ExplorerError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns true if retrying cannot help until configuration changes.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            ExplorerError::InvalidApiKey { .. } | ExplorerError::NotConfigured(_)
        )
    }

    /// Returns a suggested retry delay for this error type, if applicable.
    /// Returns None for errors that should not be retried.
    pub fn suggested_retry_delay(&self) -> Option<Duration> {
        match self {
            ExplorerError::RateLimited { .. } => Some(Duration::from_secs(2)),
            ExplorerError::Timeout(_) => Some(Duration::from_secs(1)),
            ExplorerError::Http(_) => Some(Duration::from_millis(500)),
            ExplorerError::Status { status, .. } if *status >= 500 => {
                Some(Duration::from_secs(1))
            }
            _ => None,
        }
    }

    /// Provider the error originated from, when known.
    pub fn provider(&self) -> Option<Provider> {
        match self {
            ExplorerError::Status { provider, .. }
            | ExplorerError::RateLimited { provider }
            | ExplorerError::InvalidApiKey { provider }
            | ExplorerError::Api { provider, .. } => Some(*provider),
            _ => None,
        }
    }
}
