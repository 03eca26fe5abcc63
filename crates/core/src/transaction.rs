//! Normalized transaction records shared by all explorers.
//!
//! Amounts are already scaled to human units (ETH, SOL, token units) and
//! timestamps are unix seconds.

use serde::{Deserialize, Serialize};

/// Movement of a chain's native coin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativeTransfer {
    pub hash: String,
    pub timestamp: i64,
    pub from: String,
    pub to: String,
    pub amount: f64,
    /// Fee paid by `from` for this transaction.
    pub fee: f64,
    pub failed: bool,
}

/// Movement of a fungible token (ERC-20, SPL).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenTransfer {
    pub hash: String,
    pub timestamp: i64,
    /// Contract address or mint.
    pub token: String,
    pub symbol: Option<String>,
    pub from: String,
    pub to: String,
    pub amount: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxKind {
    Transfer,
    Swap,
    Other,
}

/// Minimal per-transaction record used for activity counting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxActivity {
    pub hash: String,
    pub timestamp: i64,
    pub kind: TxKind,
}

impl TxActivity {
    pub fn new(hash: impl Into<String>, timestamp: i64, kind: TxKind) -> Self {
        Self {
            hash: hash.into(),
            timestamp,
            kind,
        }
    }
}
