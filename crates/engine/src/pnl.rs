//! Profit/loss over normalized transfers.
//!
//! All functions are pure: they take the wallet and the transfers fetched
//! for it and never touch the network.

use std::collections::{BTreeMap, HashMap, HashSet};
use wallet_core::{NativeTransfer, TokenPnl, TokenTransfer, TxActivity, TxKind, WalletAddress};

/// Native coin flows of one wallet.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NativePnl {
    pub received: f64,
    pub sent: f64,
    pub fees: f64,
    pub net: f64,
}

/// Sum native coin flows.
///
/// Failed transfers move no value but their fee is still charged to the sender.
pub fn native_pnl(wallet: &WalletAddress, transfers: &[NativeTransfer]) -> NativePnl {
    let mut pnl = NativePnl::default();

    for transfer in transfers {
        let outgoing = wallet.matches(&transfer.from);
        if outgoing {
            pnl.fees += transfer.fee;
        }
        if transfer.failed {
            continue;
        }
        if wallet.matches(&transfer.to) {
            pnl.received += transfer.amount;
        }
        if outgoing {
            pnl.sent += transfer.amount;
        }
    }

    pnl.net = pnl.received - pnl.sent - pnl.fees;
    pnl
}

#[derive(Debug, Clone)]
struct LedgerEntry {
    symbol: Option<String>,
    received: f64,
    sent: f64,
    first_trade: i64,
    last_trade: i64,
    trades: u32,
}

/// Per-token running totals for one wallet.
#[derive(Debug, Default)]
pub struct TokenLedger {
    entries: BTreeMap<String, LedgerEntry>,
}

impl TokenLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a transfer. Transfers not touching the wallet are ignored.
    pub fn record(&mut self, wallet: &WalletAddress, transfer: &TokenTransfer) {
        let incoming = wallet.matches(&transfer.to);
        let outgoing = wallet.matches(&transfer.from);
        if !incoming && !outgoing {
            return;
        }

        let entry = self
            .entries
            .entry(transfer.token.clone())
            .or_insert_with(|| LedgerEntry {
                symbol: None,
                received: 0.0,
                sent: 0.0,
                first_trade: transfer.timestamp,
                last_trade: transfer.timestamp,
                trades: 0,
            });

        if entry.symbol.is_none() {
            entry.symbol = transfer.symbol.clone();
        }
        if incoming {
            entry.received += transfer.amount;
        }
        if outgoing {
            entry.sent += transfer.amount;
        }
        entry.first_trade = entry.first_trade.min(transfer.timestamp);
        entry.last_trade = entry.last_trade.max(transfer.timestamp);
        entry.trades += 1;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Results sorted by token id.
    pub fn into_pnl(self) -> Vec<TokenPnl> {
        self.entries
            .into_iter()
            .map(|(token, e)| TokenPnl {
                token,
                symbol: e.symbol,
                received: e.received,
                sent: e.sent,
                net: e.received - e.sent,
                first_trade: e.first_trade,
                last_trade: e.last_trade,
                trades: e.trades,
            })
            .collect()
    }
}

pub fn token_pnl(wallet: &WalletAddress, transfers: &[TokenTransfer]) -> Vec<TokenPnl> {
    let mut ledger = TokenLedger::new();
    for transfer in transfers {
        ledger.record(wallet, transfer);
    }
    ledger.into_pnl()
}

/// Token with the highest strictly positive net. Ties go to the earlier first trade.
pub fn most_profitable(tokens: &[TokenPnl]) -> Option<&TokenPnl> {
    tokens
        .iter()
        .filter(|t| t.net > 0.0)
        .fold(None, |best: Option<&TokenPnl>, t| match best {
            Some(b) if b.net > t.net => Some(b),
            Some(b) if b.net == t.net && b.first_trade <= t.first_trade => Some(b),
            _ => Some(t),
        })
}

pub fn active_tokens(tokens: &[TokenPnl]) -> u32 {
    tokens.iter().filter(|t| t.net > 0.0).count() as u32
}

const NATIVE_ASSET: &str = "";

#[derive(Default)]
struct HashFlows<'a> {
    sent: HashSet<&'a str>,
    received: HashSet<&'a str>,
}

/// Count distinct transactions that look like swaps.
///
/// A transaction is a swap when it is tagged as one, or when the wallet
/// both sent one asset and received a different one under the same hash.
pub fn count_swaps(
    wallet: &WalletAddress,
    native: &[NativeTransfer],
    tokens: &[TokenTransfer],
    activity: &[TxActivity],
) -> u32 {
    let mut swaps: HashSet<&str> = activity
        .iter()
        .filter(|a| a.kind == TxKind::Swap)
        .map(|a| a.hash.as_str())
        .collect();

    let mut flows: HashMap<&str, HashFlows<'_>> = HashMap::new();
    let native_legs = native
        .iter()
        .filter(|t| !t.failed && t.amount > 0.0)
        .map(|t| (t.hash.as_str(), NATIVE_ASSET, t.from.as_str(), t.to.as_str()));
    let token_legs = tokens
        .iter()
        .filter(|t| t.amount > 0.0)
        .map(|t| (t.hash.as_str(), t.token.as_str(), t.from.as_str(), t.to.as_str()));

    for (hash, asset, from, to) in native_legs.chain(token_legs) {
        let entry = flows.entry(hash).or_default();
        if wallet.matches(from) {
            entry.sent.insert(asset);
        }
        if wallet.matches(to) {
            entry.received.insert(asset);
        }
    }

    for (hash, f) in &flows {
        let swapped = f
            .sent
            .iter()
            .any(|sent| f.received.iter().any(|received| received != sent));
        if swapped {
            swaps.insert(*hash);
        }
    }

    swaps.len() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const WALLET: &str = "0xd8da6bf26964af9d7eed9e03e53415d37aa96045";
    const OTHER: &str = "0x1111111111111111111111111111111111111111";

    fn wallet() -> WalletAddress {
        WalletAddress::parse(WALLET).unwrap()
    }

    fn native(
        hash: &str,
        from: &str,
        to: &str,
        amount: f64,
        fee: f64,
        failed: bool,
    ) -> NativeTransfer {
        NativeTransfer {
            hash: hash.to_string(),
            timestamp: 1_700_000_000,
            from: from.to_string(),
            to: to.to_string(),
            amount,
            fee,
            failed,
        }
    }

    fn token(hash: &str, token: &str, from: &str, to: &str, amount: f64, ts: i64) -> TokenTransfer {
        TokenTransfer {
            hash: hash.to_string(),
            timestamp: ts,
            token: token.to_string(),
            symbol: Some(token.to_uppercase()),
            from: from.to_string(),
            to: to.to_string(),
            amount,
        }
    }

    #[test]
    fn test_native_pnl_counts_failed_fees_only() {
        let transfers = vec![
            native("a", OTHER, WALLET, 2.0, 0.001, false),
            native("b", WALLET, OTHER, 0.5, 0.002, false),
            native("c", WALLET, OTHER, 1.0, 0.003, true),
            native("d", OTHER, WALLET, 9.0, 0.0, true),
        ];
        let pnl = native_pnl(&wallet(), &transfers);
        assert_eq!(pnl.received, 2.0);
        assert_eq!(pnl.sent, 0.5);
        assert!((pnl.fees - 0.005).abs() < 1e-12);
        assert!((pnl.net - 1.495).abs() < 1e-12);
    }

    #[test]
    fn test_native_pnl_is_case_insensitive_for_evm() {
        let upper = "0xD8DA6BF26964AF9D7EED9E03E53415D37AA96045";
        let pnl = native_pnl(&wallet(), &[native("a", OTHER, upper, 1.0, 0.0, false)]);
        assert_eq!(pnl.received, 1.0);
    }

    #[test]
    fn test_self_transfer_nets_to_minus_fee() {
        let pnl = native_pnl(&wallet(), &[native("a", WALLET, WALLET, 1.0, 0.01, false)]);
        assert_eq!(pnl.received, 1.0);
        assert_eq!(pnl.sent, 1.0);
        assert!((pnl.net + 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_token_pnl_tracks_ledger() {
        let transfers = vec![
            token("a", "bonk", OTHER, WALLET, 1000.0, 100),
            token("b", "bonk", WALLET, OTHER, 400.0, 300),
            token("c", "usdc", OTHER, WALLET, 50.0, 200),
            token("d", "wif", OTHER, OTHER, 10.0, 50),
        ];
        let pnl = token_pnl(&wallet(), &transfers);
        assert_eq!(pnl.len(), 2);
        assert_eq!(pnl[0].token, "bonk");
        assert_eq!(pnl[0].net, 600.0);
        assert_eq!(pnl[0].first_trade, 100);
        assert_eq!(pnl[0].last_trade, 300);
        assert_eq!(pnl[0].trades, 2);
        assert_eq!(pnl[1].token, "usdc");
        assert_eq!(pnl[1].symbol.as_deref(), Some("USDC"));
    }

    #[test]
    fn test_most_profitable_requires_positive_net() {
        let pnl = token_pnl(
            &wallet(),
            &[token("a", "bonk", WALLET, OTHER, 10.0, 100)],
        );
        assert_eq!(most_profitable(&pnl), None);
        assert_eq!(active_tokens(&pnl), 0);
    }

    #[test]
    fn test_most_profitable_tie_prefers_earlier_trade() {
        let pnl = token_pnl(
            &wallet(),
            &[
                token("a", "aaa", OTHER, WALLET, 5.0, 500),
                token("b", "bbb", OTHER, WALLET, 5.0, 100),
                token("c", "ccc", OTHER, WALLET, 2.0, 50),
            ],
        );
        assert_eq!(most_profitable(&pnl).map(|t| t.token.as_str()), Some("bbb"));
        assert_eq!(active_tokens(&pnl), 3);
    }

    #[test]
    fn test_count_swaps() {
        let natives = vec![
            native("swap1", WALLET, OTHER, 1.0, 0.0, false),
            native("plain", WALLET, OTHER, 1.0, 0.0, false),
        ];
        let tokens = vec![
            token("swap1", "usdc", OTHER, WALLET, 3000.0, 1),
            token("swap2", "usdc", WALLET, OTHER, 10.0, 2),
            token("swap2", "bonk", OTHER, WALLET, 10.0, 2),
            token("same", "usdc", WALLET, OTHER, 10.0, 3),
            token("same", "usdc", OTHER, WALLET, 10.0, 3),
        ];
        let activity = vec![
            TxActivity::new("tagged", 4, TxKind::Swap),
            TxActivity::new("swap1", 1, TxKind::Swap),
            TxActivity::new("plain", 1, TxKind::Transfer),
        ];
        assert_eq!(count_swaps(&wallet(), &natives, &tokens, &activity), 3);
    }
}
