//! Per-wallet analysis results.

use crate::address::WalletAddress;
use crate::chain::Chain;
use serde::{Deserialize, Serialize};

const SECS_PER_DAY: i64 = 86_400;

/// Current native balance of a wallet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holdings {
    pub native_balance: f64,
    pub native_symbol: String,
    /// None when no price was available.
    pub usd_value: Option<f64>,
}

/// Profit/loss over the fetched transaction window.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PnlSummary {
    pub native_received: f64,
    pub native_sent: f64,
    pub fees: f64,
    /// `native_received - native_sent - fees`
    pub native_net: f64,
    pub usd_net: Option<f64>,
    pub swaps: u32,
    /// Tokens with a positive net position.
    pub active_tokens: u32,
}

/// Net flow of a single token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenPnl {
    pub token: String,
    pub symbol: Option<String>,
    pub received: f64,
    pub sent: f64,
    pub net: f64,
    pub first_trade: i64,
    pub last_trade: i64,
    pub trades: u32,
}

impl TokenPnl {
    /// Whole days between first and last trade.
    pub fn hold_days(&self) -> i64 {
        (self.last_trade - self.first_trade).max(0) / SECS_PER_DAY
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActivitySummary {
    pub total_txs: u32,
    pub txs_in_window: u32,
    pub window_days: u32,
}

/// Everything reported for one wallet on one chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletReport {
    /// 1-based position in the user's request.
    pub index: usize,
    pub address: WalletAddress,
    pub chain: Chain,
    pub last_active: Option<i64>,
    pub holdings: Holdings,
    pub pnl: Option<PnlSummary>,
    pub most_profitable: Option<TokenPnl>,
    pub activity: ActivitySummary,
    /// Short remarks shown under the report (missing keys, partial data).
    pub notes: Vec<String>,
}

/// Result for one entry of a batch request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WalletOutcome {
    Report(WalletReport),
    Failed {
        index: usize,
        address: WalletAddress,
        chain: Option<Chain>,
        error: String,
    },
    Invalid {
        index: usize,
        input: String,
        reason: String,
    },
}

impl WalletOutcome {
    pub fn index(&self) -> usize {
        match self {
            WalletOutcome::Report(r) => r.index,
            WalletOutcome::Failed { index, .. } | WalletOutcome::Invalid { index, .. } => *index,
        }
    }

    pub fn is_report(&self) -> bool {
        matches!(self, WalletOutcome::Report(_))
    }
}
