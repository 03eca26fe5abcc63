//! Blockchain chain identifiers and utilities.

use serde::{Deserialize, Serialize};

/// Blockchain network identifier.
/// Uses u8 representation for compact serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Chain {
    // EVM chains (1-9)
    Ethereum = 1,
    Bsc = 2,
    Polygon = 3,

    // Non-EVM chains (10+)
    Solana = 10,
}

/// Address family a chain belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChainFamily {
    Evm,
    Solana,
}

impl Chain {
    /// Create Chain from u8 ID.
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Chain::Ethereum),
            2 => Some(Chain::Bsc),
            3 => Some(Chain::Polygon),
            10 => Some(Chain::Solana),
            _ => None,
        }
    }

    /// Get u8 ID of this chain.
    #[inline]
    pub fn id(self) -> u8 {
        self as u8
    }

    /// EIP-155 chain id used by Etherscan-family explorers.
    pub fn evm_chain_id(self) -> Option<u64> {
        match self {
            Chain::Ethereum => Some(1),
            Chain::Bsc => Some(56),
            Chain::Polygon => Some(137),
            Chain::Solana => None,
        }
    }

    /// Check if this chain is EVM-compatible.
    #[inline]
    pub fn is_evm(self) -> bool {
        matches!(self, Chain::Ethereum | Chain::Bsc | Chain::Polygon)
    }

    #[inline]
    pub fn family(self) -> ChainFamily {
        if self.is_evm() {
            ChainFamily::Evm
        } else {
            ChainFamily::Solana
        }
    }

    /// Get string representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Chain::Ethereum => "Ethereum",
            Chain::Bsc => "BSC",
            Chain::Polygon => "Polygon",
            Chain::Solana => "Solana",
        }
    }

    /// Ticker of the chain's native coin.
    pub fn native_symbol(self) -> &'static str {
        match self {
            Chain::Ethereum => "ETH",
            Chain::Bsc => "BNB",
            Chain::Polygon => "POL",
            Chain::Solana => "SOL",
        }
    }

    /// Decimals of the native coin's smallest unit (wei, lamports).
    pub fn native_decimals(self) -> u32 {
        match self {
            Chain::Solana => 9,
            _ => 18,
        }
    }

    /// Get all chain variants.
    pub fn all() -> &'static [Chain] {
        &[Chain::Ethereum, Chain::Bsc, Chain::Polygon, Chain::Solana]
    }

    /// EVM chains in the order they are queried.
    pub fn evm() -> &'static [Chain] {
        &[Chain::Ethereum, Chain::Bsc, Chain::Polygon]
    }
}

impl std::fmt::Display for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
