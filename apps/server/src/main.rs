//! Wallet Analyzer Bot - worker process
//!
//! Telegram bot that reports activity, holdings and profit/loss for
//! Ethereum, BSC, Polygon and Solana wallets.

mod config;
mod status_notifier;

use clap::Parser;
use config::{AppConfig, ConfigError};
use status_notifier::{try_start_status_notifier, StatusEvent};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use wallet_bot::{BotSettings, Database, DbError, TelegramBot};
use wallet_core::Chain;
use wallet_engine::{analyzers_from_clients, BatchAnalyzer};
use wallet_explorers::{ExplorerClients, ExplorerError};

/// Days of request history kept for cooldowns and stats.
const REQUEST_RETENTION_DAYS: i64 = 30;

/// Wallet Analyzer Bot CLI
#[derive(Parser, Debug)]
#[command(name = "wallet-bot")]
#[command(about = "Telegram bot for multi-chain wallet analysis", long_about = None)]
struct Args {
    /// Log level: trace, debug, info, warn, error
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// SQLite database URL (overrides DATABASE_URL)
    #[arg(long)]
    database_url: Option<String>,

    /// Wallets analyzed concurrently (overrides ANALYZE_CONCURRENCY)
    #[arg(short, long)]
    concurrency: Option<usize>,
}

#[derive(Debug, Error)]
enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to build explorer clients: {0}")]
    Explorer(#[from] ExplorerError),
    #[error("failed to open database: {0}")]
    Db(#[from] DbError),
}

fn init_logging(level: &str) {
    let level = match level {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");
}

fn apply_args(config: &mut AppConfig, args: &Args) {
    if let Some(url) = &args.database_url {
        config.database_url = url.clone();
    }
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency.max(1);
    }
}

fn enabled_chains(config: &AppConfig) -> Vec<String> {
    config
        .explorer
        .enabled_evm_chains()
        .into_iter()
        .chain(std::iter::once(Chain::Solana))
        .map(|c| c.as_str().to_string())
        .collect()
}

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    init_logging(&args.log_level);

    let mut config = AppConfig::from_env()?;
    apply_args(&mut config, &args);

    let chains = enabled_chains(&config);
    info!("🚀 Wallet Analyzer Bot starting...");
    info!("  Chains: {}", chains.join(", "));
    info!("  Helius P&L: {}", config.explorer.helius_api_key.is_some());
    info!("  Solscan: {}", config.explorer.solscan_api_key.is_some());
    info!("  Max wallets: {}", config.max_wallets);
    info!("  Concurrency: {}", config.concurrency);
    info!("  Cooldown: {}s", config.cooldown_secs);
    info!("  Database: {}", config.database_url);

    let notifier = try_start_status_notifier(&config.telegram_bot_token, config.status_chat_id);
    let hook = notifier.as_ref().map(|(handle, _)| handle.failure_hook());

    let clients = ExplorerClients::from_config(&config.explorer)?;
    let (evm, solana) = analyzers_from_clients(clients, &config.explorer, hook);
    let analyzer = BatchAnalyzer::new(Arc::new(evm), Arc::new(solana))
        .with_concurrency(config.concurrency)
        .with_max_wallets(config.max_wallets);

    let db = Database::connect(&config.database_url).await?;
    match db.cleanup_old_requests(REQUEST_RETENTION_DAYS).await {
        Ok(removed) if removed > 0 => info!(removed, "Cleaned up old request log entries"),
        Ok(_) => {}
        Err(e) => warn!(error = %e, "Request log cleanup failed"),
    }

    let settings = BotSettings {
        cooldown_secs: config.cooldown_secs,
        max_wallets: config.max_wallets,
    };
    let bot = Arc::new(TelegramBot::new(
        &config.telegram_bot_token,
        db,
        Arc::new(analyzer),
        settings,
    ));

    if let Some((handle, _)) = &notifier {
        handle.send(StatusEvent::Started { chains }).await;
    }

    info!("Bot is running. Press Ctrl+C to stop...");
    bot.clone().run().await;

    warn!("Shutdown signal received");

    if let Some((handle, task)) = notifier {
        handle.send(StatusEvent::Stopping).await;
        drop(handle);
        drop(bot);
        // Give the notifier a moment to flush queued messages
        let _ = tokio::time::timeout(Duration::from_secs(3), task).await;
    }

    info!("👋 Wallet Analyzer Bot stopped");
    Ok(())
}
