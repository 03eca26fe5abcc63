//! HTML rendering of analysis results for Telegram.

use teloxide::utils::html::escape;
use wallet_core::{TokenPnl, WalletOutcome, WalletReport};
use wallet_engine::tokens::display_symbol;
use wallet_engine::{format_time_ago, BatchResult};

/// Telegram's maximum message length.
pub const TELEGRAM_MESSAGE_LIMIT: usize = 4096;

const SECTION_SEPARATOR: &str = "\n\n";

/// Native coin amount, 4 decimals.
pub fn format_native(amount: f64) -> String {
    format!("{:.4}", amount)
}

pub fn format_signed_native(amount: f64) -> String {
    if amount >= 0.0 {
        format!("+{:.4}", amount)
    } else {
        format!("{:.4}", amount)
    }
}

pub fn format_usd(amount: f64) -> String {
    format!("${:.2}", amount)
}

/// USD delta with explicit sign, e.g. `+$0.46` or `-$12.00`.
pub fn format_signed_usd(amount: f64) -> String {
    if amount >= 0.0 {
        format!("+${:.2}", amount)
    } else {
        format!("-${:.2}", amount.abs())
    }
}

/// Token amounts: whole numbers from 1000 up, otherwise up to 4 decimals.
pub fn format_token_amount(amount: f64) -> String {
    let sign = if amount >= 0.0 { "+" } else { "-" };
    let abs = amount.abs();
    if abs >= 1000.0 {
        return format!("{}{:.0}", sign, abs);
    }
    let fixed = format!("{:.4}", abs);
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    format!("{}{}", sign, trimmed)
}

fn token_label(token: &TokenPnl) -> String {
    match &token.symbol {
        Some(symbol) => escape(symbol),
        None => escape(&display_symbol(&token.token)),
    }
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("{} {}", n, unit)
    } else {
        format!("{} {}s", n, unit)
    }
}

/// One wallet report.
pub fn format_report(report: &WalletReport, now: i64) -> String {
    let symbol = escape(&report.holdings.native_symbol);
    let mut lines = vec![
        format!("✅ <b>Wallet {} - {}</b>", report.index, report.chain),
        format!("<code>{}</code>", escape(report.address.as_str())),
        format!(
            "Last Active: {}",
            report
                .last_active
                .map(|ts| format_time_ago(ts, now))
                .unwrap_or_else(|| "never".to_string())
        ),
        String::new(),
        "💰 <b>Current Holdings:</b>".to_string(),
        format!("   {} {}", format_native(report.holdings.native_balance), symbol),
    ];
    if let Some(usd) = report.holdings.usd_value {
        lines.push(format!("   ≈ {} USD", format_usd(usd)));
    }

    if let Some(pnl) = &report.pnl {
        let trend = if pnl.native_net >= 0.0 { "📈" } else { "📉" };
        let usd = pnl
            .usd_net
            .map(|u| format!(" ({})", format_signed_usd(u)))
            .unwrap_or_default();
        lines.push(String::new());
        lines.push("📈 <b>P&amp;L Analysis:</b>".to_string());
        lines.push(format!(
            "   {} {}: {} {}{}",
            trend,
            symbol,
            format_signed_native(pnl.native_net),
            symbol,
            usd
        ));
        lines.push(format!("   ⛽ Fees: {} {}", format_native(pnl.fees), symbol));
        lines.push(format!("   🔄 Swaps/Trades: {}", pnl.swaps));
        lines.push(format!("   🎯 Active Tokens: {}", pnl.active_tokens));
    }

    if let Some(best) = &report.most_profitable {
        lines.push(String::new());
        lines.push("🏆 <b>Most Profitable:</b>".to_string());
        lines.push(format!("   Token: {}", token_label(best)));
        lines.push(format!("   P&amp;L: {} tokens", format_token_amount(best.net)));
        lines.push(format!("   Hold Time: {}", plural(best.hold_days(), "day")));
    }

    lines.push(String::new());
    lines.push(format!("📊 <b>Activity ({}D):</b>", report.activity.window_days));
    lines.push(format!("   Total Txs: {}", report.activity.total_txs));
    lines.push(format!(
        "   Last {}D: {}",
        report.activity.window_days, report.activity.txs_in_window
    ));

    for note in &report.notes {
        lines.push(format!("ℹ️ <i>{}</i>", escape(note)));
    }

    lines.join("\n")
}

pub fn format_outcome(outcome: &WalletOutcome, now: i64) -> String {
    match outcome {
        WalletOutcome::Report(report) => format_report(report, now),
        WalletOutcome::Failed {
            index,
            address,
            chain,
            error,
        } => {
            let title = match chain {
                Some(chain) => format!("❌ <b>Wallet {} - {}</b>", index, chain),
                None => format!("❌ <b>Wallet {}</b>", index),
            };
            format!(
                "{}\n<code>{}</code>\nError: {}",
                title,
                escape(address.as_str()),
                escape(error)
            )
        }
        WalletOutcome::Invalid {
            index,
            input,
            reason,
        } => format!(
            "⚠️ <b>Wallet {}</b>\n<code>{}</code>\nInvalid address: {}",
            index,
            escape(input),
            escape(reason)
        ),
    }
}

/// Render a whole batch as messages under the Telegram size limit.
pub fn format_batch(result: &BatchResult, now: i64) -> Vec<String> {
    let header = format!(
        "📋 <b>Wallet Analysis</b>\n{} analyzed in {:.1}s",
        plural(result.wallet_count as i64, "wallet"),
        result.elapsed.as_secs_f64()
    );

    let mut sections = vec![header];
    sections.extend(result.outcomes.iter().map(|o| format_outcome(o, now)));
    split_message(&sections, TELEGRAM_MESSAGE_LIMIT)
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Break one line into pieces of at most `limit` characters.
fn split_line(line: &str, limit: usize) -> Vec<String> {
    let chars: Vec<char> = line.chars().collect();
    chars.chunks(limit).map(|c| c.iter().collect()).collect()
}

/// Split an oversize section on line boundaries.
fn split_section(section: &str, limit: usize) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();

    for line in section.lines() {
        let pieces = if char_len(line) > limit {
            split_line(line, limit)
        } else {
            vec![line.to_string()]
        };
        for piece in pieces {
            let needed = if current.is_empty() {
                char_len(&piece)
            } else {
                char_len(&current) + 1 + char_len(&piece)
            };
            if needed > limit && !current.is_empty() {
                parts.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push('\n');
            }
            current.push_str(&piece);
        }
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

/// Pack whole sections into messages of at most `limit` characters.
///
/// A section larger than `limit` is split on its line boundaries.
pub fn split_message(sections: &[String], limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let separator_len = char_len(SECTION_SEPARATOR);
    let mut messages = Vec::new();
    let mut current = String::new();

    for section in sections.iter().filter(|s| !s.is_empty()) {
        let pieces = if char_len(section) > limit {
            split_section(section, limit)
        } else {
            vec![section.clone()]
        };

        for piece in pieces {
            let needed = if current.is_empty() {
                char_len(&piece)
            } else {
                char_len(&current) + separator_len + char_len(&piece)
            };
            if needed > limit && !current.is_empty() {
                messages.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push_str(SECTION_SEPARATOR);
            }
            current.push_str(&piece);
        }
    }
    if !current.is_empty() {
        messages.push(current);
    }
    messages
}
