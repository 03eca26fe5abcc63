//! Application configuration from environment variables.

use thiserror::Error;
use wallet_bot::telegram::DEFAULT_COOLDOWN_SECS;
use wallet_core::DEFAULT_MAX_WALLETS;
use wallet_engine::DEFAULT_CONCURRENCY;
use wallet_explorers::ExplorerConfig;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://wallet-bot.db";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Application configuration.
#[derive(Clone)]
pub struct AppConfig {
    pub telegram_bot_token: String,
    pub explorer: ExplorerConfig,
    pub database_url: String,
    pub cooldown_secs: u64,
    pub max_wallets: usize,
    pub concurrency: usize,
    /// Chat that receives start/stop and provider failure notices.
    pub status_chat_id: Option<i64>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("telegram_bot_token", &"<set>")
            .field("explorer", &self.explorer)
            .field("database_url", &self.database_url)
            .field("cooldown_secs", &self.cooldown_secs)
            .field("max_wallets", &self.max_wallets)
            .field("concurrency", &self.concurrency)
            .field("status_chat_id", &self.status_chat_id)
            .finish()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_or<T: std::str::FromStr>(
    name: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match non_empty(value) {
        Some(v) => v.parse().map_err(|_| ConfigError::Invalid { name, value: v }),
        None => Ok(default),
    }
}

fn parse_bool(name: &'static str, value: Option<String>) -> Result<bool, ConfigError> {
    match non_empty(value).map(|v| v.to_ascii_lowercase()) {
        None => Ok(false),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid { name, value: v }),
        },
    }
}

impl AppConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load using `lookup` to read variables.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| non_empty(lookup(name));

        let telegram_bot_token =
            var("TELEGRAM_BOT_TOKEN").ok_or(ConfigError::Missing("TELEGRAM_BOT_TOKEN"))?;
        let etherscan_api_key =
            var("ETHERSCAN_API_KEY").ok_or(ConfigError::Missing("ETHERSCAN_API_KEY"))?;

        let defaults = ExplorerConfig::default();
        let explorer = ExplorerConfig {
            etherscan_api_key,
            bsc_api_key: var("BSC_SCAN_API_KEY"),
            polygon_api_key: var("POLYGONSCAN_API_KEY"),
            evm_multichain: parse_bool("EVM_MULTICHAIN", lookup("EVM_MULTICHAIN"))?,
            helius_api_key: var("HELIUS_API_KEY"),
            solscan_api_key: var("SOLSCAN_API_KEY"),
            solana_rpc_url: var("SOLANA_RPC_URL").unwrap_or(defaults.solana_rpc_url.clone()),
            coingecko_api_key: var("COINGECKO_API_KEY"),
            helius_max_pages: parse_or(
                "HELIUS_MAX_PAGES",
                lookup("HELIUS_MAX_PAGES"),
                defaults.helius_max_pages,
            )?,
            ..defaults
        };

        let status_chat_id = match var("TELEGRAM_STATUS_CHAT_ID") {
            Some(v) => Some(v.parse().map_err(|_| ConfigError::Invalid {
                name: "TELEGRAM_STATUS_CHAT_ID",
                value: v.clone(),
            })?),
            None => None,
        };

        Ok(Self {
            telegram_bot_token,
            explorer,
            database_url: var("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            cooldown_secs: parse_or(
                "ANALYZE_COOLDOWN_SECS",
                lookup("ANALYZE_COOLDOWN_SECS"),
                DEFAULT_COOLDOWN_SECS,
            )?,
            max_wallets: parse_or("MAX_WALLETS", lookup("MAX_WALLETS"), DEFAULT_MAX_WALLETS)?,
            concurrency: parse_or(
                "ANALYZE_CONCURRENCY",
                lookup("ANALYZE_CONCURRENCY"),
                DEFAULT_CONCURRENCY,
            )?,
            status_chat_id,
        })
    }
}
