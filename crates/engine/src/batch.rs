//! Batch analysis of a user supplied address list.

use crate::analyzer::ChainAnalyzer;
use futures_util::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;
use wallet_core::{
    parse_address_list, AddressEntry, AddressListError, ChainFamily, WalletOutcome,
    DEFAULT_MAX_WALLETS,
};

/// Default number of wallets analyzed at once.
pub const DEFAULT_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, PartialEq)]
pub struct BatchResult {
    /// Outcomes in input order. One wallet may yield several (EVM chains).
    pub outcomes: Vec<WalletOutcome>,
    /// Distinct entries in the request, valid or not.
    pub wallet_count: usize,
    pub elapsed: Duration,
}

impl BatchResult {
    pub fn report_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_report()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, WalletOutcome::Failed { .. }))
            .count()
    }
}

/// Dispatches wallets to the analyzer of their chain family.
pub struct BatchAnalyzer {
    evm: Arc<dyn ChainAnalyzer>,
    solana: Arc<dyn ChainAnalyzer>,
    concurrency: usize,
    max_wallets: usize,
}

impl BatchAnalyzer {
    pub fn new(evm: Arc<dyn ChainAnalyzer>, solana: Arc<dyn ChainAnalyzer>) -> Self {
        Self {
            evm,
            solana,
            concurrency: DEFAULT_CONCURRENCY,
            max_wallets: DEFAULT_MAX_WALLETS,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_max_wallets(mut self, max_wallets: usize) -> Self {
        self.max_wallets = max_wallets.max(1);
        self
    }

    pub fn max_wallets(&self) -> usize {
        self.max_wallets
    }

    fn analyzer_for(&self, family: ChainFamily) -> &Arc<dyn ChainAnalyzer> {
        match family {
            ChainFamily::Evm => &self.evm,
            ChainFamily::Solana => &self.solana,
        }
    }

    async fn analyze_entry(&self, entry: AddressEntry) -> Vec<WalletOutcome> {
        match entry.parsed {
            Ok(address) => {
                self.analyzer_for(address.family())
                    .analyze(entry.index, &address)
                    .await
            }
            Err(e) => vec![WalletOutcome::Invalid {
                index: entry.index,
                input: entry.input,
                reason: e.to_string(),
            }],
        }
    }

    /// Parse `input` and analyze every wallet in it.
    ///
    /// At most `concurrency` wallets are in flight; outcomes keep input order.
    pub async fn analyze_input(&self, input: &str) -> Result<BatchResult, AddressListError> {
        let parsed = parse_address_list(input, self.max_wallets)?;
        let wallet_count = parsed.len();
        let start = Instant::now();

        let outcomes: Vec<WalletOutcome> = stream::iter(parsed.entries)
            .map(|entry| self.analyze_entry(entry))
            .buffered(self.concurrency)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .flatten()
            .collect();

        let result = BatchResult {
            outcomes,
            wallet_count,
            elapsed: start.elapsed(),
        };
        info!(
            wallets = wallet_count,
            reports = result.report_count(),
            failures = result.failure_count(),
            elapsed_ms = result.elapsed.as_millis() as u64,
            "Batch analysis complete"
        );
        Ok(result)
    }
}
