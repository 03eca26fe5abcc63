//! Activity counting and "last active" calculations.

use std::collections::HashSet;
use wallet_core::{ActivitySummary, TxActivity};

/// Window used for the "Activity (30D)" section.
pub const DEFAULT_WINDOW_DAYS: u32 = 30;

const SECS_PER_MINUTE: i64 = 60;
const SECS_PER_HOUR: i64 = 3_600;
const SECS_PER_DAY: i64 = 86_400;

/// Current unix time in seconds.
pub fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Most recent timestamp, if any.
pub fn last_active<I>(timestamps: I) -> Option<i64>
where
    I: IntoIterator<Item = i64>,
{
    timestamps.into_iter().max()
}

/// Count distinct transactions overall and within the trailing window.
pub fn summarize_activity(activity: &[TxActivity], now: i64, window_days: u32) -> ActivitySummary {
    let cutoff = now - window_days as i64 * SECS_PER_DAY;
    let mut seen = HashSet::new();
    let mut total = 0u32;
    let mut in_window = 0u32;

    for tx in activity {
        if !seen.insert(tx.hash.as_str()) {
            continue;
        }
        total += 1;
        if tx.timestamp >= cutoff {
            in_window += 1;
        }
    }

    ActivitySummary {
        total_txs: total,
        txs_in_window: in_window,
        window_days,
    }
}

/// Human readable age, e.g. "5m ago", "1h ago", "12d ago".
pub fn format_time_ago(timestamp: i64, now: i64) -> String {
    let elapsed = now - timestamp;
    if elapsed < SECS_PER_MINUTE {
        "just now".to_string()
    } else if elapsed < SECS_PER_HOUR {
        format!("{}m ago", elapsed / SECS_PER_MINUTE)
    } else if elapsed < SECS_PER_DAY {
        format!("{}h ago", elapsed / SECS_PER_HOUR)
    } else {
        format!("{}d ago", elapsed / SECS_PER_DAY)
    }
}
