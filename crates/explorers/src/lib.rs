//! Blockchain explorer and price API clients.
//!
//! ## Architecture
//!
//! - `http` - shared request execution (rate limit, status mapping, retries)
//! - `etherscan`, `solana_rpc`, `helius`, `solscan`, `price` - one client per upstream
//! - `config` - credentials and construction of the full client set
//!
//! Response parsing is exposed as free functions so it can be tested
//! against captured payloads without network access.

pub mod config;
pub mod error;
pub mod etherscan;
pub mod helius;
pub mod http;
pub mod price;
pub mod rate_limit;
pub mod solana_rpc;
pub mod solscan;
#[cfg(any(test, feature = "test-util"))]
pub mod test_server;
pub mod units;

pub use config::{EvmEndpoint, ExplorerClients, ExplorerConfig};
pub use error::ExplorerError;
pub use etherscan::EtherscanClient;
pub use helius::{HeliusClient, ParsedSolanaTx};
pub use http::ApiClient;
pub use price::PriceClient;
pub use rate_limit::{Provider, ProviderRateLimit, RateLimiter, RetryPolicy, SharedRateLimiter};
pub use solana_rpc::SolanaRpcClient;
pub use solscan::SolscanClient;
