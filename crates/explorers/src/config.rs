//! Explorer credentials and client construction.

use crate::error::ExplorerError;
use crate::etherscan::EtherscanClient;
use crate::helius::HeliusClient;
use crate::http::ApiClient;
use crate::price::PriceClient;
use crate::rate_limit::Provider;
use crate::solana_rpc::{SolanaRpcClient, DEFAULT_RPC_URL};
use crate::solscan::SolscanClient;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;
use wallet_core::Chain;

/// API keys and tuning for every upstream service.
#[derive(Clone, Serialize, Deserialize)]
pub struct ExplorerConfig {
    pub etherscan_api_key: String,
    pub bsc_api_key: Option<String>,
    pub polygon_api_key: Option<String>,
    /// Query BSC and Polygon through Etherscan V2 with the Etherscan key
    /// when they have no key of their own.
    pub evm_multichain: bool,
    pub helius_api_key: Option<String>,
    pub solscan_api_key: Option<String>,
    pub solana_rpc_url: String,
    pub coingecko_api_key: Option<String>,
    pub request_timeout_secs: u64,
    /// Page size for Etherscan `txlist`/`tokentx`.
    pub evm_tx_limit: u32,
    pub solana_signature_limit: u32,
    pub helius_max_pages: u32,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            etherscan_api_key: String::new(),
            bsc_api_key: None,
            polygon_api_key: None,
            evm_multichain: false,
            helius_api_key: None,
            solscan_api_key: None,
            solana_rpc_url: DEFAULT_RPC_URL.to_string(),
            coingecko_api_key: None,
            request_timeout_secs: 15,
            evm_tx_limit: 1000,
            solana_signature_limit: 1000,
            helius_max_pages: 3,
        }
    }
}

fn redact(key: &Option<String>) -> &'static str {
    if key.as_deref().is_some_and(|k| !k.is_empty()) {
        "<set>"
    } else {
        "<unset>"
    }
}

impl std::fmt::Debug for ExplorerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExplorerConfig")
            .field("etherscan_api_key", &redact(&Some(self.etherscan_api_key.clone())))
            .field("bsc_api_key", &redact(&self.bsc_api_key))
            .field("polygon_api_key", &redact(&self.polygon_api_key))
            .field("evm_multichain", &self.evm_multichain)
            .field("helius_api_key", &redact(&self.helius_api_key))
            .field("solscan_api_key", &redact(&self.solscan_api_key))
            .field("solana_rpc_url", &self.solana_rpc_url)
            .field("coingecko_api_key", &redact(&self.coingecko_api_key))
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("evm_tx_limit", &self.evm_tx_limit)
            .field("solana_signature_limit", &self.solana_signature_limit)
            .field("helius_max_pages", &self.helius_max_pages)
            .finish()
    }
}

/// How an EVM chain is reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvmEndpoint {
    /// Etherscan V2 with `chainid`.
    V2 { api_key: String },
    /// Chain's own explorer with its own key.
    Legacy { api_key: String },
}

impl ExplorerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Endpoint for an EVM chain, `None` when the chain is disabled.
    pub fn evm_endpoint(&self, chain: Chain) -> Option<EvmEndpoint> {
        let own_key = match chain {
            Chain::Ethereum => {
                return Some(EvmEndpoint::V2 {
                    api_key: self.etherscan_api_key.clone(),
                })
            }
            Chain::Bsc => self.bsc_api_key.as_ref(),
            Chain::Polygon => self.polygon_api_key.as_ref(),
            Chain::Solana => return None,
        };

        match own_key.filter(|k| !k.is_empty()) {
            Some(key) => Some(EvmEndpoint::Legacy { api_key: key.clone() }),
            None if self.evm_multichain => Some(EvmEndpoint::V2 {
                api_key: self.etherscan_api_key.clone(),
            }),
            None => None,
        }
    }

    /// EVM chains that will be queried, in query order.
    pub fn enabled_evm_chains(&self) -> Vec<Chain> {
        Chain::evm()
            .iter()
            .copied()
            .filter(|c| self.evm_endpoint(*c).is_some())
            .collect()
    }
}

/// Every client the analyzers need, built once at startup.
#[derive(Debug, Clone)]
pub struct ExplorerClients {
    pub evm: Vec<EtherscanClient>,
    pub solana_rpc: SolanaRpcClient,
    pub helius: Option<HeliusClient>,
    pub solscan: Option<SolscanClient>,
    pub prices: PriceClient,
}

impl ExplorerClients {
    pub fn from_config(config: &ExplorerConfig) -> Result<Self, ExplorerError> {
        let timeout = config.timeout();
        // One ApiClient per provider so the rate limit is shared across chains
        let etherscan_api = ApiClient::new(Provider::Etherscan, timeout)?;

        let mut evm = Vec::new();
        for chain in Chain::evm() {
            match config.evm_endpoint(*chain) {
                Some(EvmEndpoint::V2 { api_key }) => {
                    evm.push(EtherscanClient::v2(etherscan_api.clone(), *chain, api_key));
                }
                Some(EvmEndpoint::Legacy { api_key }) => {
                    evm.push(EtherscanClient::legacy(
                        ApiClient::new(Provider::Etherscan, timeout)?,
                        *chain,
                        api_key,
                    )?);
                }
                None => {}
            }
        }

        let solana_rpc = SolanaRpcClient::new(
            ApiClient::new(Provider::SolanaRpc, timeout)?,
            config.solana_rpc_url.clone(),
        );

        let helius = match config.helius_api_key.as_ref().filter(|k| !k.is_empty()) {
            Some(key) => Some(HeliusClient::new(
                ApiClient::new(Provider::Helius, timeout)?,
                key.clone(),
            )),
            None => None,
        };

        let solscan = match config.solscan_api_key.as_ref().filter(|k| !k.is_empty()) {
            Some(key) => Some(SolscanClient::new(
                ApiClient::new(Provider::Solscan, timeout)?,
                key.clone(),
            )),
            None => None,
        };

        let prices = PriceClient::new(
            ApiClient::new(Provider::CoinGecko, timeout)?,
            config.coingecko_api_key.clone().filter(|k| !k.is_empty()),
        );

        info!(
            evm_chains = ?evm.iter().map(|c| c.chain().as_str()).collect::<Vec<_>>(),
            helius = helius.is_some(),
            solscan = solscan.is_some(),
            "Explorer clients ready"
        );

        Ok(Self {
            evm,
            solana_rpc,
            helius,
            solscan,
            prices,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn config() -> ExplorerConfig {
        ExplorerConfig {
            etherscan_api_key: "ETH_KEY".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_only_ethereum_by_default() {
        assert_eq!(config().enabled_evm_chains(), vec![Chain::Ethereum]);
    }

    #[test]
    fn test_own_key_uses_legacy_endpoint() {
        let mut config = config();
        config.bsc_api_key = Some("BSC_KEY".to_string());
        assert_eq!(
            config.evm_endpoint(Chain::Bsc),
            Some(EvmEndpoint::Legacy {
                api_key: "BSC_KEY".to_string()
            })
        );
        assert_eq!(config.enabled_evm_chains(), vec![Chain::Ethereum, Chain::Bsc]);
    }

    #[test]
    fn test_multichain_falls_back_to_etherscan_key() {
        let mut config = config();
        config.evm_multichain = true;
        config.polygon_api_key = Some(String::new());
        assert_eq!(
            config.evm_endpoint(Chain::Polygon),
            Some(EvmEndpoint::V2 {
                api_key: "ETH_KEY".to_string()
            })
        );
        assert_eq!(config.enabled_evm_chains().len(), 3);
    }

    #[test]
    fn test_debug_redacts_keys() {
        let mut config = config();
        config.helius_api_key = Some("SECRET".to_string());
        let debug = format!("{:?}", config);
        assert!(!debug.contains("SECRET"));
        assert!(!debug.contains("ETH_KEY"));
        assert!(debug.contains("<set>"));
    }

    #[test]
    fn test_clients_from_config() {
        let mut config = config();
        config.helius_api_key = Some("H".to_string());
        let clients = ExplorerClients::from_config(&config).unwrap();
        assert_eq!(clients.evm.len(), 1);
        assert!(clients.helius.is_some());
        assert!(clients.solscan.is_none());
    }
}
