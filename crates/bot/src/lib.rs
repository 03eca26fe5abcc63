//! Telegram front-end for the wallet analyzer.
//!
//! This crate provides:
//! - Command dispatch (`/start`, `/help`, `/analyze`)
//! - HTML report formatting and message splitting
//! - SQLite request log for per-chat cooldowns

pub mod db;
pub mod format;
pub mod telegram;

pub use db::{Database, DbError};
pub use format::{
    format_batch, format_outcome, format_report, split_message, TELEGRAM_MESSAGE_LIMIT,
};
pub use telegram::{BotSettings, Command, TelegramBot, TelegramError};
