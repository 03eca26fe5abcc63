//! Telegram bot handlers.

use crate::db::{Database, DbError};
use crate::format::format_batch;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use teloxide::utils::command::BotCommands;
use thiserror::Error;
use tracing::{error, info, warn};
use wallet_core::AddressListError;
use wallet_engine::{now_unix, BatchAnalyzer};

pub const DEFAULT_COOLDOWN_SECS: u64 = 10;

const GENERIC_FAILURE: &str =
    "⚠️ Something went wrong while analyzing. Please try again later.";

const EXAMPLE_EVM: &str = "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045";
const EXAMPLE_SOLANA: &str = "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM";

#[derive(Error, Debug)]
pub enum TelegramError {
    #[error("Telegram API error: {0}")]
    Api(#[from] teloxide::RequestError),
    #[error("Database error: {0}")]
    Db(#[from] DbError),
}

/// Bot commands.
#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum Command {
    #[command(description = "Show the welcome message")]
    Start,
    #[command(description = "Show help")]
    Help,
    #[command(description = "Analyze wallets. Usage: /analyze addr1,addr2")]
    Analyze(String),
}

#[derive(Debug, Clone)]
pub struct BotSettings {
    /// Minimum seconds between two `/analyze` requests of one chat.
    pub cooldown_secs: u64,
    pub max_wallets: usize,
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            cooldown_secs: DEFAULT_COOLDOWN_SECS,
            max_wallets: wallet_core::DEFAULT_MAX_WALLETS,
        }
    }
}

/// Seconds left before a chat may analyze again, `None` when allowed.
pub fn cooldown_remaining(last_request: Option<i64>, now: i64, cooldown_secs: u64) -> Option<u64> {
    let last = last_request?;
    let elapsed = now.saturating_sub(last).max(0) as u64;
    if elapsed < cooldown_secs {
        Some(cooldown_secs - elapsed)
    } else {
        None
    }
}

pub fn welcome_text(max_wallets: usize) -> String {
    format!(
        "👋 <b>Welcome to Wallet Analyzer Bot!</b>\n\n\
         I look up wallets on <b>Ethereum, BSC, Polygon and Solana</b> and report:\n\
         • Last activity\n\
         • Current holdings\n\
         • Profit/loss and swap counts\n\
         • Most profitable token\n\
         • 30 day activity\n\n\
         Send <code>/analyze address1,address2</code> with up to {} wallets.\n\
         Use /help for examples.",
        max_wallets
    )
}

pub fn help_text(max_wallets: usize) -> String {
    format!(
        "{}\n\n\
         <b>Examples:</b>\n\
         <code>/analyze {}</code>\n\
         <code>/analyze {},{}</code>\n\n\
         Up to {} wallets per request, separated by commas or spaces.\n\
         EVM addresses are checked on every supported EVM chain.",
        teloxide::utils::html::escape(&Command::descriptions().to_string()),
        EXAMPLE_EVM,
        EXAMPLE_EVM,
        EXAMPLE_SOLANA,
        max_wallets
    )
}

pub fn usage_text() -> String {
    format!(
        "Usage: <code>/analyze address1,address2</code>\nExample: <code>/analyze {}</code>",
        EXAMPLE_EVM
    )
}

pub fn list_error_text(err: &AddressListError) -> String {
    match err {
        AddressListError::Empty => usage_text(),
        AddressListError::TooMany { count, max } => format!(
            "❌ Too many wallets: you sent {}, the limit is {} per request.",
            count, max
        ),
    }
}

pub fn analyzing_text(wallets: usize) -> String {
    format!("🔍 Analyzing {} wallet(s)…", wallets)
}

/// Telegram bot wrapper.
pub struct TelegramBot {
    bot: Bot,
    db: Database,
    analyzer: Arc<BatchAnalyzer>,
    settings: BotSettings,
}

impl TelegramBot {
    /// Create a new bot with the given token.
    pub fn new(
        token: &str,
        db: Database,
        analyzer: Arc<BatchAnalyzer>,
        settings: BotSettings,
    ) -> Self {
        let bot = Bot::new(token);
        Self {
            bot,
            db,
            analyzer,
            settings,
        }
    }

    /// Run the bot command handler until Ctrl+C.
    pub async fn run(self: Arc<Self>) {
        let bot = self.bot.clone();
        let handler = Update::filter_message().filter_command::<Command>().endpoint(
            move |bot: Bot, msg: Message, cmd: Command| {
                let this = Arc::clone(&self);
                async move { this.handle_command(bot, msg, cmd).await }
            },
        );

        Dispatcher::builder(bot, handler)
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;
    }

    async fn handle_command(
        &self,
        bot: Bot,
        msg: Message,
        cmd: Command,
    ) -> Result<(), TelegramError> {
        match cmd {
            Command::Start => {
                bot.send_message(msg.chat.id, welcome_text(self.settings.max_wallets))
                    .parse_mode(ParseMode::Html)
                    .await?;
            }

            Command::Help => {
                bot.send_message(msg.chat.id, help_text(self.settings.max_wallets))
                    .parse_mode(ParseMode::Html)
                    .await?;
            }

            Command::Analyze(input) => {
                if let Err(e) = self.handle_analyze(&bot, &msg, input.trim()).await {
                    error!(chat_id = msg.chat.id.0, error = %e, "Analyze request failed");
                    bot.send_message(msg.chat.id, GENERIC_FAILURE).await?;
                }
            }
        }

        Ok(())
    }

    async fn handle_analyze(
        &self,
        bot: &Bot,
        msg: &Message,
        input: &str,
    ) -> Result<(), TelegramError> {
        let chat_id = msg.chat.id;

        if input.is_empty() {
            bot.send_message(chat_id, usage_text())
                .parse_mode(ParseMode::Html)
                .await?;
            return Ok(());
        }

        let last = self.db.last_request_at(chat_id.0).await?;
        if let Some(wait) = cooldown_remaining(last, now_unix(), self.settings.cooldown_secs) {
            bot.send_message(
                chat_id,
                format!("⏳ Please wait {}s before the next analysis.", wait),
            )
            .await?;
            return Ok(());
        }

        // Count up front so the progress message is accurate
        let wallet_count = match wallet_core::parse_address_list(input, self.settings.max_wallets) {
            Ok(parsed) => parsed.len(),
            Err(e) => {
                bot.send_message(chat_id, list_error_text(&e))
                    .parse_mode(ParseMode::Html)
                    .await?;
                return Ok(());
            }
        };

        self.db.record_request(chat_id.0, wallet_count).await?;
        info!(chat_id = chat_id.0, wallets = wallet_count, "Analyze request");
        bot.send_message(chat_id, analyzing_text(wallet_count)).await?;

        let result = match self.analyzer.analyze_input(input).await {
            Ok(result) => result,
            Err(e) => {
                warn!(chat_id = chat_id.0, error = %e, "Address list rejected");
                bot.send_message(chat_id, list_error_text(&e))
                    .parse_mode(ParseMode::Html)
                    .await?;
                return Ok(());
            }
        };

        for message in format_batch(&result, now_unix()) {
            bot.send_message(chat_id, message)
                .parse_mode(ParseMode::Html)
                .await?;
        }

        Ok(())
    }
}
