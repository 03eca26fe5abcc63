//! Per-chain wallet analyzers.
//!
//! Each analyzer fetches raw explorer data for one wallet and turns it
//! into [`WalletOutcome`]s. Report assembly lives in the `build_*_report`
//! functions so it can be tested without network access.

use crate::activity::{last_active, now_unix, summarize_activity, DEFAULT_WINDOW_DAYS};
use crate::pnl::{active_tokens, count_swaps, most_profitable, native_pnl, token_pnl};
use crate::tokens::known_symbol;
use async_trait::async_trait;
use futures_util::future::join_all;
use std::sync::Arc;
use tracing::{debug, warn};
use wallet_core::{
    Chain, ChainFamily, Holdings, NativeTransfer, PnlSummary, TokenTransfer, TxActivity, TxKind,
    WalletAddress, WalletOutcome, WalletReport,
};
use wallet_explorers::{
    EtherscanClient, ExplorerClients, ExplorerConfig, ExplorerError, HeliusClient, ParsedSolanaTx,
    PriceClient, Provider, SolanaRpcClient, SolscanClient,
};

/// Called whenever an upstream request fails, after retries.
pub type FailureHook = Arc<dyn Fn(Provider, &ExplorerError) + Send + Sync>;

pub const HELIUS_REQUIRED_NOTE: &str = "P&L requires HELIUS_API_KEY";

/// Analyzes wallets of one chain family.
#[async_trait]
pub trait ChainAnalyzer: Send + Sync {
    fn family(&self) -> ChainFamily;

    /// Analyze one wallet. May return several outcomes (one per chain).
    async fn analyze(&self, index: usize, address: &WalletAddress) -> Vec<WalletOutcome>;
}

fn usd(amount: f64, price: Option<f64>) -> Option<f64> {
    price.map(|p| amount * p)
}

fn holdings(chain: Chain, balance: f64, price: Option<f64>) -> Holdings {
    Holdings {
        native_balance: balance,
        native_symbol: chain.native_symbol().to_string(),
        usd_value: usd(balance, price),
    }
}

// ============================================================================
// EVM
// ============================================================================

/// Raw data fetched for one wallet on one EVM chain.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EvmChainData {
    pub balance: f64,
    pub transactions: Vec<NativeTransfer>,
    pub token_transfers: Vec<TokenTransfer>,
}

impl EvmChainData {
    pub fn has_activity(&self) -> bool {
        self.balance > 0.0 || !self.transactions.is_empty() || !self.token_transfers.is_empty()
    }

    /// Distinct transactions touching the wallet.
    pub fn activity(&self) -> Vec<TxActivity> {
        self.transactions
            .iter()
            .map(|t| (t.hash.as_str(), t.timestamp))
            .chain(self.token_transfers.iter().map(|t| (t.hash.as_str(), t.timestamp)))
            .map(|(hash, ts)| TxActivity::new(hash, ts, TxKind::Transfer))
            .collect()
    }
}

/// Assemble the report for one EVM chain.
pub fn build_evm_report(
    index: usize,
    address: &WalletAddress,
    chain: Chain,
    data: &EvmChainData,
    price: Option<f64>,
    tx_limit: u32,
    now: i64,
) -> WalletReport {
    let activity = data.activity();
    let native = native_pnl(address, &data.transactions);
    let tokens = token_pnl(address, &data.token_transfers);

    let pnl = PnlSummary {
        native_received: native.received,
        native_sent: native.sent,
        fees: native.fees,
        native_net: native.net,
        usd_net: usd(native.net, price),
        swaps: count_swaps(address, &data.transactions, &data.token_transfers, &activity),
        active_tokens: active_tokens(&tokens),
    };

    let mut notes = Vec::new();
    if tx_limit > 0 && data.transactions.len() >= tx_limit as usize {
        notes.push(format!("P&L covers the latest {} transactions", tx_limit));
    }

    WalletReport {
        index,
        address: address.clone(),
        chain,
        last_active: last_active(activity.iter().map(|a| a.timestamp)),
        holdings: holdings(chain, data.balance, price),
        pnl: Some(pnl),
        most_profitable: most_profitable(&tokens).cloned(),
        activity: summarize_activity(&activity, now, DEFAULT_WINDOW_DAYS),
        notes,
    }
}

/// Analyzer for Ethereum, BSC and Polygon wallets.
pub struct EvmAnalyzer {
    clients: Vec<EtherscanClient>,
    prices: PriceClient,
    tx_limit: u32,
    on_failure: Option<FailureHook>,
}

impl EvmAnalyzer {
    pub fn new(clients: Vec<EtherscanClient>, prices: PriceClient, tx_limit: u32) -> Self {
        Self {
            clients,
            prices,
            tx_limit,
            on_failure: None,
        }
    }

    pub fn with_failure_hook(mut self, hook: FailureHook) -> Self {
        self.on_failure = Some(hook);
        self
    }

    async fn fetch_chain(
        &self,
        client: &EtherscanClient,
        address: &str,
    ) -> Result<EvmChainData, ExplorerError> {
        let (balance, transactions, token_transfers) = tokio::try_join!(
            client.balance(address),
            client.transactions(address, self.tx_limit),
            client.token_transfers(address, self.tx_limit),
        )?;
        Ok(EvmChainData {
            balance,
            transactions,
            token_transfers,
        })
    }
}

#[async_trait]
impl ChainAnalyzer for EvmAnalyzer {
    fn family(&self) -> ChainFamily {
        ChainFamily::Evm
    }

    async fn analyze(&self, index: usize, address: &WalletAddress) -> Vec<WalletOutcome> {
        let results = join_all(
            self.clients
                .iter()
                .map(|client| self.fetch_chain(client, address.as_str())),
        )
        .await;
        let chains = self.clients.iter().map(|c| c.chain());
        let (reported, failures) = select_evm_chains(chains.zip(results).collect());

        for (chain, e) in &failures {
            warn!(
                index,
                chain = %chain,
                address = %address,
                error = %e,
                "EVM chain query failed"
            );
            if let Some(hook) = &self.on_failure {
                hook(Provider::Etherscan, e);
            }
        }
        debug!(
            index,
            active_chains = reported.len(),
            failed = failures.len(),
            "EVM analysis done"
        );

        let now = now_unix();
        let mut reports = Vec::with_capacity(reported.len());
        for (chain, data) in reported {
            let price = self.prices.native_usd(chain).await;
            reports.push(build_evm_report(
                index,
                address,
                chain,
                &data,
                price,
                self.tx_limit,
                now,
            ));
        }
        evm_outcomes(index, address, reports, failures)
    }
}

/// Split per-chain fetch results into chains worth reporting and failures.
///
/// Chains without balance or transactions are dropped. When no chain has
/// activity, the idle Ethereum result is kept so the wallet still gets a
/// report.
pub fn select_evm_chains(
    results: Vec<(Chain, Result<EvmChainData, ExplorerError>)>,
) -> (Vec<(Chain, EvmChainData)>, Vec<(Chain, ExplorerError)>) {
    let mut reported = Vec::new();
    let mut idle = Vec::new();
    let mut failures = Vec::new();
    for (chain, result) in results {
        match result {
            Ok(data) if data.has_activity() => reported.push((chain, data)),
            Ok(data) => idle.push((chain, data)),
            Err(e) => failures.push((chain, e)),
        }
    }

    if reported.is_empty() {
        if let Some(pos) = idle.iter().position(|(c, _)| *c == Chain::Ethereum) {
            reported.push(idle.swap_remove(pos));
        }
    }
    (reported, failures)
}

/// Reports and failures as outcomes, in chain query order.
pub fn evm_outcomes(
    index: usize,
    address: &WalletAddress,
    reports: Vec<WalletReport>,
    failures: Vec<(Chain, ExplorerError)>,
) -> Vec<WalletOutcome> {
    let mut outcomes: Vec<(Chain, WalletOutcome)> = reports
        .into_iter()
        .map(|r| (r.chain, WalletOutcome::Report(r)))
        .collect();
    outcomes.extend(failures.into_iter().map(|(chain, e)| {
        let failed = WalletOutcome::Failed {
            index,
            address: address.clone(),
            chain: Some(chain),
            error: e.to_string(),
        };
        (chain, failed)
    }));

    outcomes.sort_by_key(|(chain, _)| Chain::evm().iter().position(|c| c == chain));
    outcomes.into_iter().map(|(_, o)| o).collect()
}

// ============================================================================
// Solana
// ============================================================================

/// Raw data fetched for one Solana wallet.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SolanaData {
    pub balance: f64,
    pub signatures: Vec<TxActivity>,
    /// `None` when Helius is not configured or failed.
    pub parsed: Option<Vec<ParsedSolanaTx>>,
    pub notes: Vec<String>,
}

/// Assemble a Solana report. `most_profitable` symbols are left as fetched.
pub fn build_solana_report(
    index: usize,
    address: &WalletAddress,
    data: &SolanaData,
    price: Option<f64>,
    now: i64,
) -> WalletReport {
    let parsed_activity: Vec<TxActivity> = data
        .parsed
        .iter()
        .flatten()
        .map(ParsedSolanaTx::activity)
        .collect();

    let activity = if data.signatures.is_empty() {
        summarize_activity(&parsed_activity, now, DEFAULT_WINDOW_DAYS)
    } else {
        summarize_activity(&data.signatures, now, DEFAULT_WINDOW_DAYS)
    };
    let last = last_active(
        data.signatures
            .iter()
            .chain(parsed_activity.iter())
            .map(|a| a.timestamp),
    );

    let (pnl, best) = match &data.parsed {
        Some(txs) => {
            let natives: Vec<NativeTransfer> = txs
                .iter()
                .flat_map(|tx| tx.native_transfers.iter().cloned().chain(tx.fee_transfer()))
                .collect();
            let token_transfers: Vec<TokenTransfer> = txs
                .iter()
                .flat_map(|tx| tx.token_transfers.iter().cloned())
                .collect();

            let native = native_pnl(address, &natives);
            let tokens = token_pnl(address, &token_transfers);
            let pnl = PnlSummary {
                native_received: native.received,
                native_sent: native.sent,
                fees: native.fees,
                native_net: native.net,
                usd_net: usd(native.net, price),
                swaps: count_swaps(address, &natives, &token_transfers, &parsed_activity),
                active_tokens: active_tokens(&tokens),
            };
            (Some(pnl), most_profitable(&tokens).cloned())
        }
        None => (None, None),
    };

    WalletReport {
        index,
        address: address.clone(),
        chain: Chain::Solana,
        last_active: last,
        holdings: holdings(Chain::Solana, data.balance, price),
        pnl,
        most_profitable: best,
        activity,
        notes: data.notes.clone(),
    }
}

/// Analyzer for Solana wallets.
pub struct SolanaAnalyzer {
    rpc: SolanaRpcClient,
    helius: Option<HeliusClient>,
    solscan: Option<SolscanClient>,
    prices: PriceClient,
    signature_limit: u32,
    helius_max_pages: u32,
    on_failure: Option<FailureHook>,
}

impl SolanaAnalyzer {
    pub fn new(rpc: SolanaRpcClient, prices: PriceClient) -> Self {
        Self {
            rpc,
            helius: None,
            solscan: None,
            prices,
            signature_limit: 1000,
            helius_max_pages: 3,
            on_failure: None,
        }
    }

    pub fn with_helius(mut self, helius: Option<HeliusClient>, max_pages: u32) -> Self {
        self.helius = helius;
        self.helius_max_pages = max_pages;
        self
    }

    pub fn with_solscan(mut self, solscan: Option<SolscanClient>) -> Self {
        self.solscan = solscan;
        self
    }

    pub fn with_signature_limit(mut self, limit: u32) -> Self {
        self.signature_limit = limit;
        self
    }

    pub fn with_failure_hook(mut self, hook: FailureHook) -> Self {
        self.on_failure = Some(hook);
        self
    }

    fn failed(&self, provider: Provider, error: &ExplorerError) {
        if let Some(hook) = &self.on_failure {
            hook(provider, error);
        }
    }

    async fn fetch_balance(&self, address: &str) -> Result<f64, ExplorerError> {
        let rpc_err = match self.rpc.balance(address).await {
            Ok(balance) => return Ok(balance),
            Err(e) => e,
        };
        warn!(address, error = %rpc_err, "Solana RPC balance failed");
        self.failed(Provider::SolanaRpc, &rpc_err);

        let Some(solscan) = &self.solscan else {
            return Err(rpc_err);
        };
        solscan.account_balance(address).await.map_err(|e| {
            warn!(address, error = %e, "Solscan balance fallback failed");
            self.failed(Provider::Solscan, &e);
            e
        })
    }

    async fn fetch(&self, address: &str) -> Result<SolanaData, ExplorerError> {
        let balance = self.fetch_balance(address).await?;
        let mut notes = Vec::new();

        let signatures = match self.rpc.signatures(address, self.signature_limit).await {
            Ok(s) => s,
            Err(e) => {
                warn!(address, error = %e, "Signature lookup failed");
                self.failed(Provider::SolanaRpc, &e);
                notes.push("Transaction history unavailable".to_string());
                Vec::new()
            }
        };

        let parsed = match &self.helius {
            Some(helius) => {
                match helius
                    .enhanced_transactions(address, self.helius_max_pages)
                    .await
                {
                    Ok(txs) => Some(txs),
                    Err(e) => {
                        warn!(address, error = %e, "Helius enhanced transactions failed");
                        self.failed(Provider::Helius, &e);
                        notes.push(format!("P&L unavailable: {}", e));
                        None
                    }
                }
            }
            None => {
                notes.push(HELIUS_REQUIRED_NOTE.to_string());
                None
            }
        };

        Ok(SolanaData {
            balance,
            signatures,
            parsed,
            notes,
        })
    }

    async fn resolve_symbol(&self, mint: &str) -> Option<String> {
        if let Some(solscan) = &self.solscan {
            match solscan.token_symbol(mint).await {
                Ok(Some(symbol)) => return Some(symbol),
                Ok(None) => {}
                Err(e) => {
                    debug!(mint, error = %e, "Token symbol lookup failed");
                    self.failed(Provider::Solscan, &e);
                }
            }
        }
        known_symbol(mint).map(str::to_string)
    }
}

#[async_trait]
impl ChainAnalyzer for SolanaAnalyzer {
    fn family(&self) -> ChainFamily {
        ChainFamily::Solana
    }

    async fn analyze(&self, index: usize, address: &WalletAddress) -> Vec<WalletOutcome> {
        let data = match self.fetch(address.as_str()).await {
            Ok(data) => data,
            Err(e) => {
                return vec![WalletOutcome::Failed {
                    index,
                    address: address.clone(),
                    chain: Some(Chain::Solana),
                    error: e.to_string(),
                }]
            }
        };

        let price = self.prices.native_usd(Chain::Solana).await;
        let mut report = build_solana_report(index, address, &data, price, now_unix());

        if let Some(best) = report.most_profitable.as_mut() {
            if best.symbol.is_none() {
                best.symbol = self.resolve_symbol(&best.token).await;
            }
        }
        debug!(index, total_txs = report.activity.total_txs, "Solana analysis done");

        vec![WalletOutcome::Report(report)]
    }
}

/// Build both analyzers from the configured clients.
pub fn analyzers_from_clients(
    clients: ExplorerClients,
    config: &ExplorerConfig,
    hook: Option<FailureHook>,
) -> (EvmAnalyzer, SolanaAnalyzer) {
    let mut evm = EvmAnalyzer::new(clients.evm, clients.prices.clone(), config.evm_tx_limit);
    let mut solana = SolanaAnalyzer::new(clients.solana_rpc, clients.prices)
        .with_helius(clients.helius, config.helius_max_pages)
        .with_solscan(clients.solscan)
        .with_signature_limit(config.solana_signature_limit);

    if let Some(hook) = hook {
        evm = evm.with_failure_hook(hook.clone());
        solana = solana.with_failure_hook(hook);
    }
    (evm, solana)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;
    use wallet_core::TokenPnl;
    use wallet_explorers::test_server::FakeServer;
    use wallet_explorers::{ApiClient, RetryPolicy};

    const NOW: i64 = 1_700_000_000;
    const DAY: i64 = 86_400;
    const EVM: &str = "0xd8da6bf26964af9d7eed9e03e53415d37aa96045";
    const OTHER: &str = "0x1111111111111111111111111111111111111111";
    const SOL: &str = "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM";
    const SOL_OTHER: &str = "7GCihgDB8fe6KNjn2MYtkzZcRjQy3t9GHdC8uHYmW2hr";
    const BONK: &str = "DezXAZ8z7PnrnRJjz3wXBoRgixCa6xjnB7YaB1pPB263";

    fn transfer(
        hash: &str,
        from: &str,
        to: &str,
        amount: f64,
        fee: f64,
        ts: i64,
    ) -> NativeTransfer {
        NativeTransfer {
            hash: hash.to_string(),
            timestamp: ts,
            from: from.to_string(),
            to: to.to_string(),
            amount,
            fee,
            failed: false,
        }
    }

    fn token_transfer(
        hash: &str,
        mint: &str,
        from: &str,
        to: &str,
        amount: f64,
        ts: i64,
    ) -> TokenTransfer {
        TokenTransfer {
            hash: hash.to_string(),
            timestamp: ts,
            token: mint.to_string(),
            symbol: None,
            from: from.to_string(),
            to: to.to_string(),
            amount,
        }
    }

    #[test]
    fn test_evm_report() {
        let address = WalletAddress::parse(EVM).unwrap();
        let data = EvmChainData {
            balance: 1.5,
            transactions: vec![
                transfer("0xa", OTHER, EVM, 2.0, 0.0, NOW - 2 * DAY),
                transfer("0xb", EVM, OTHER, 0.5, 0.01, NOW - 40 * DAY),
            ],
            token_transfers: vec![token_transfer("0xc", "0xusdc", OTHER, EVM, 100.0, NOW - DAY)],
        };

        let report = build_evm_report(1, &address, Chain::Ethereum, &data, Some(2000.0), 1000, NOW);
        assert_eq!(report.chain, Chain::Ethereum);
        assert_eq!(report.last_active, Some(NOW - DAY));
        assert_eq!(report.holdings.native_symbol, "ETH");
        assert_eq!(report.holdings.usd_value, Some(3000.0));
        assert_eq!(report.activity.total_txs, 3);
        assert_eq!(report.activity.txs_in_window, 2);

        let pnl = report.pnl.unwrap();
        assert!((pnl.native_net - 1.49).abs() < 1e-9);
        assert!((pnl.usd_net.unwrap() - 2980.0).abs() < 1e-6);
        assert_eq!(pnl.active_tokens, 1);
        assert_eq!(report.most_profitable.map(|t| t.token), Some("0xusdc".to_string()));
        assert!(report.notes.is_empty());
    }

    #[test]
    fn test_evm_report_without_price() {
        let address = WalletAddress::parse(EVM).unwrap();
        let data = EvmChainData::default();
        let report = build_evm_report(2, &address, Chain::Bsc, &data, None, 1000, NOW);
        assert_eq!(report.holdings.native_symbol, "BNB");
        assert_eq!(report.holdings.usd_value, None);
        assert_eq!(report.pnl.unwrap().usd_net, None);
        assert_eq!(report.last_active, None);
    }

    #[test]
    fn test_evm_report_notes_truncated_history() {
        let address = WalletAddress::parse(EVM).unwrap();
        let data = EvmChainData {
            balance: 0.0,
            transactions: vec![
                transfer("0xa", OTHER, EVM, 1.0, 0.0, NOW),
                transfer("0xb", OTHER, EVM, 1.0, 0.0, NOW),
            ],
            token_transfers: vec![],
        };
        let report = build_evm_report(1, &address, Chain::Polygon, &data, None, 2, NOW);
        assert_eq!(report.notes, vec!["P&L covers the latest 2 transactions".to_string()]);
    }

    #[test]
    fn test_evm_has_activity() {
        assert!(!EvmChainData::default().has_activity());
        let funded = EvmChainData {
            balance: 0.1,
            ..Default::default()
        };
        assert!(funded.has_activity());
    }

    fn parsed_swap() -> ParsedSolanaTx {
        ParsedSolanaTx {
            signature: "sig1".to_string(),
            timestamp: NOW - 3 * DAY,
            kind: TxKind::Swap,
            fee: 0.000005,
            fee_payer: SOL.to_string(),
            failed: false,
            native_transfers: vec![transfer("sig1", SOL, SOL_OTHER, 1.0, 0.0, NOW - 3 * DAY)],
            token_transfers: vec![token_transfer(
                "sig1",
                BONK,
                SOL_OTHER,
                SOL,
                150_000.0,
                NOW - 3 * DAY,
            )],
        }
    }

    #[test]
    fn test_solana_report_with_helius() {
        let address = WalletAddress::parse(SOL).unwrap();
        let data = SolanaData {
            balance: 0.0139,
            signatures: vec![
                TxActivity::new("sig1", NOW - 3 * DAY, TxKind::Other),
                TxActivity::new("sig0", NOW - 60 * DAY, TxKind::Other),
            ],
            parsed: Some(vec![parsed_swap()]),
            notes: vec![],
        };

        let report = build_solana_report(1, &address, &data, Some(100.0), NOW);
        assert_eq!(report.chain, Chain::Solana);
        assert_eq!(report.last_active, Some(NOW - 3 * DAY));
        assert_eq!(report.activity.total_txs, 2);
        assert_eq!(report.activity.txs_in_window, 1);

        let pnl = report.pnl.unwrap();
        assert_eq!(pnl.swaps, 1);
        assert_eq!(pnl.active_tokens, 1);
        assert!((pnl.fees - 0.000005).abs() < 1e-12);
        assert!((pnl.native_net + 1.000005).abs() < 1e-9);

        let best: TokenPnl = report.most_profitable.unwrap();
        assert_eq!(best.token, BONK);
        assert_eq!(best.net, 150_000.0);
    }

    #[test]
    fn test_solana_report_without_helius() {
        let address = WalletAddress::parse(SOL).unwrap();
        let data = SolanaData {
            balance: 1.0,
            signatures: vec![TxActivity::new("sig1", NOW - 10, TxKind::Other)],
            parsed: None,
            notes: vec![HELIUS_REQUIRED_NOTE.to_string()],
        };

        let report = build_solana_report(3, &address, &data, None, NOW);
        assert_eq!(report.index, 3);
        assert_eq!(report.pnl, None);
        assert_eq!(report.most_profitable, None);
        assert_eq!(report.notes, vec![HELIUS_REQUIRED_NOTE.to_string()]);
        assert_eq!(report.activity.total_txs, 1);
    }

    #[test]
    fn test_solana_activity_falls_back_to_parsed() {
        let address = WalletAddress::parse(SOL).unwrap();
        let data = SolanaData {
            balance: 0.0,
            signatures: vec![],
            parsed: Some(vec![parsed_swap()]),
            notes: vec![],
        };
        let report = build_solana_report(1, &address, &data, None, NOW);
        assert_eq!(report.activity.total_txs, 1);
        assert_eq!(report.last_active, Some(NOW - 3 * DAY));
    }

    fn active() -> EvmChainData {
        EvmChainData {
            balance: 0.2,
            ..Default::default()
        }
    }

    fn api_failure(message: &str) -> ExplorerError {
        ExplorerError::Api {
            provider: Provider::Etherscan,
            message: message.to_string(),
        }
    }

    fn chains_of<T>(items: &[(Chain, T)]) -> Vec<Chain> {
        items.iter().map(|(c, _)| *c).collect()
    }

    #[test]
    fn test_select_idle_wallet_keeps_ethereum() {
        let (reported, failures) = select_evm_chains(vec![
            (Chain::Ethereum, Ok(EvmChainData::default())),
            (Chain::Bsc, Ok(EvmChainData::default())),
            (Chain::Polygon, Ok(EvmChainData::default())),
        ]);
        assert_eq!(chains_of(&reported), vec![Chain::Ethereum]);
        assert!(failures.is_empty());
    }

    #[test]
    fn test_select_reports_only_active_chains() {
        let (reported, failures) = select_evm_chains(vec![
            (Chain::Ethereum, Ok(EvmChainData::default())),
            (Chain::Bsc, Ok(active())),
            (Chain::Polygon, Ok(active())),
        ]);
        assert_eq!(chains_of(&reported), vec![Chain::Bsc, Chain::Polygon]);
        assert!(failures.is_empty());
    }

    #[test]
    fn test_select_failure_is_isolated_to_its_chain() {
        let (reported, failures) = select_evm_chains(vec![
            (Chain::Ethereum, Ok(EvmChainData::default())),
            (Chain::Bsc, Err(api_failure("Error! Invalid address format"))),
        ]);
        assert_eq!(chains_of(&reported), vec![Chain::Ethereum]);
        assert_eq!(chains_of(&failures), vec![Chain::Bsc]);
    }

    #[test]
    fn test_select_all_failed() {
        let (reported, failures) = select_evm_chains(vec![
            (Chain::Ethereum, Err(api_failure("down"))),
            (Chain::Polygon, Err(api_failure("down"))),
        ]);
        assert!(reported.is_empty());
        assert_eq!(chains_of(&failures), vec![Chain::Ethereum, Chain::Polygon]);
    }

    #[test]
    fn test_evm_outcomes_follow_chain_order() {
        let address = WalletAddress::parse(EVM).unwrap();
        let polygon = build_evm_report(1, &address, Chain::Polygon, &active(), None, 1000, NOW);
        let ethereum = build_evm_report(1, &address, Chain::Ethereum, &active(), None, 1000, NOW);

        let outcomes = evm_outcomes(
            1,
            &address,
            vec![polygon, ethereum],
            vec![(Chain::Bsc, api_failure("Error! Invalid address format"))],
        );

        let summary: Vec<String> = outcomes
            .iter()
            .map(|o| match o {
                WalletOutcome::Report(r) => format!("Report({})", r.chain),
                WalletOutcome::Failed { chain, error, .. } => {
                    format!("Failed({:?}: {})", chain, error)
                }
                WalletOutcome::Invalid { input, .. } => format!("Invalid({})", input),
            })
            .collect();
        assert_eq!(
            summary,
            vec![
                "Report(Ethereum)".to_string(),
                "Failed(Some(Bsc): Etherscan: Error! Invalid address format)".to_string(),
                "Report(Polygon)".to_string(),
            ]
        );
    }

    fn no_retry(provider: Provider) -> ApiClient {
        ApiClient::new(provider, Duration::from_secs(5))
            .unwrap()
            .with_retry_policy(RetryPolicy::none())
    }

    fn solana_analyzer(
        rpc_url: &str,
        solscan_url: &str,
    ) -> (SolanaAnalyzer, Arc<Mutex<Vec<Provider>>>) {
        let prices = PriceClient::new(no_retry(Provider::CoinGecko), None).with_base_url(rpc_url);
        prices.store(&HashMap::from([(Chain::Solana, 100.0)]));

        let failed = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&failed);
        let hook: FailureHook = Arc::new(move |provider: Provider, _: &ExplorerError| {
            seen.lock().unwrap().push(provider);
        });

        let rpc = SolanaRpcClient::new(no_retry(Provider::SolanaRpc), rpc_url);
        let solscan =
            SolscanClient::new(no_retry(Provider::Solscan), "KEY").with_base_url(solscan_url);
        let analyzer = SolanaAnalyzer::new(rpc, prices)
            .with_solscan(Some(solscan))
            .with_failure_hook(hook);
        (analyzer, failed)
    }

    #[tokio::test]
    async fn test_solana_balance_falls_back_to_solscan() {
        let rpc = FakeServer::always(500, "{}").await;
        let body = r#"{"success":true,"data":{"lamports":2500000000}}"#;
        let solscan = FakeServer::always(200, body).await;
        let (analyzer, failed) = solana_analyzer(&rpc.url, &solscan.url);
        let address = WalletAddress::parse(SOL).unwrap();

        let outcomes = analyzer.analyze(4, &address).await;

        let [WalletOutcome::Report(report)] = outcomes.as_slice() else {
            panic!("expected one report, got {:?}", outcomes);
        };
        assert_eq!(report.index, 4);
        assert_eq!(report.holdings.native_balance, 2.5);
        assert_eq!(report.holdings.usd_value, Some(250.0));
        assert_eq!(
            report.notes,
            vec![
                "Transaction history unavailable".to_string(),
                HELIUS_REQUIRED_NOTE.to_string(),
            ]
        );
        assert_eq!(solscan.hits(), 1);
        assert_eq!(*failed.lock().unwrap(), vec![Provider::SolanaRpc, Provider::SolanaRpc]);
    }

    #[tokio::test]
    async fn test_solana_fails_when_every_balance_source_fails() {
        let rpc = FakeServer::always(500, "{}").await;
        let body = r#"{"success":false,"errors":{"message":"bad address"}}"#;
        let solscan = FakeServer::always(200, body).await;
        let (analyzer, failed) = solana_analyzer(&rpc.url, &solscan.url);
        let address = WalletAddress::parse(SOL).unwrap();

        let outcomes = analyzer.analyze(1, &address).await;

        assert_eq!(
            outcomes,
            vec![WalletOutcome::Failed {
                index: 1,
                address,
                chain: Some(Chain::Solana),
                error: "Solscan: bad address".to_string(),
            }]
        );
        assert_eq!(*failed.lock().unwrap(), vec![Provider::SolanaRpc, Provider::Solscan]);
    }
}
