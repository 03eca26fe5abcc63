//! Status notifier for operational events.
//!
//! Sends Telegram notifications to an ops chat for:
//! - Bot start and stop
//! - Upstream API failures, at most once per provider per interval

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, info, warn};
use wallet_engine::FailureHook;
use wallet_explorers::{ExplorerError, Provider};

/// Minimum time between two failure notices for the same provider.
pub const FAILURE_NOTIFY_INTERVAL: Duration = Duration::from_secs(600);

/// Status event types for notification.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusEvent {
    /// Bot started, with the chains it will query.
    Started { chains: Vec<String> },
    /// Bot stopping
    Stopping,
    /// An upstream request failed after retries.
    ProviderFailure { provider: Provider, error: String },
}

/// Configuration for status notifications.
#[derive(Debug, Clone)]
pub struct StatusNotifierConfig {
    pub bot_token: String,
    pub chat_id: i64,
}

/// Remembers when each provider last triggered a notice.
#[derive(Debug)]
pub struct FailureThrottle {
    last_sent: DashMap<Provider, Instant>,
    interval: Duration,
}

impl FailureThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            last_sent: DashMap::new(),
            interval,
        }
    }

    /// Returns true (and records the time) when a notice may be sent now.
    pub fn should_notify(&self, provider: Provider) -> bool {
        let now = Instant::now();
        match self.last_sent.entry(provider) {
            Entry::Occupied(mut last) => {
                if now.duration_since(*last.get()) >= self.interval {
                    last.insert(now);
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(now);
                true
            }
        }
    }
}

/// Render an event as an HTML message.
pub fn format_event(
    event: &StatusEvent,
    hostname: &str,
    now: chrono::DateTime<chrono::Utc>,
) -> String {
    let body = match event {
        StatusEvent::Started { chains } => {
            format!("🚀 Wallet bot started\nChains: {}", chains.join(", "))
        }
        StatusEvent::Stopping => "👋 Wallet bot stopping".to_string(),
        StatusEvent::ProviderFailure { provider, error } => format!(
            "⚠️ <b>{}</b> request failed\n{}",
            provider,
            escape_html(error)
        ),
    };

    format!(
        "<b>{}</b>\n{}\n\n⏰ {}",
        escape_html(hostname),
        body,
        now.format("%Y-%m-%d %H:%M:%S UTC")
    )
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Status notifier that sends Telegram messages for ops events.
pub struct StatusNotifier {
    config: StatusNotifierConfig,
    http_client: reqwest::Client,
    hostname: String,
}

impl StatusNotifier {
    pub fn new(config: StatusNotifierConfig) -> Self {
        let hostname = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        Self {
            config,
            http_client: reqwest::Client::new(),
            hostname,
        }
    }

    pub async fn notify(&self, event: &StatusEvent) {
        let message = format_event(event, &self.hostname, chrono::Utc::now());
        if let Err(e) = self.send_telegram_message(&message).await {
            error!(error = %e, "Failed to send status notification");
        }
    }

    /// Send a message via Telegram Bot API.
    async fn send_telegram_message(&self, message: &str) -> Result<(), reqwest::Error> {
        let url = format!(
            "https://api.telegram.org/bot{}/sendMessage",
            self.config.bot_token
        );

        let chat_id = self.config.chat_id.to_string();
        let params = [
            ("chat_id", chat_id.as_str()),
            ("text", message),
            ("parse_mode", "HTML"),
            ("disable_web_page_preview", "true"),
        ];

        let response = self.http_client.post(&url).form(&params).send().await?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "Telegram API returned non-success status");
        }

        Ok(())
    }
}

/// Shared status notifier handle for sending events from multiple tasks.
#[derive(Clone)]
pub struct StatusNotifierHandle {
    tx: mpsc::Sender<StatusEvent>,
    throttle: Arc<FailureThrottle>,
}

impl StatusNotifierHandle {
    pub async fn send(&self, event: StatusEvent) {
        if let Err(e) = self.tx.send(event).await {
            warn!(error = %e, "Failed to send status event");
        }
    }

    /// Queue a provider failure unless one was sent recently.
    pub fn report_failure(&self, provider: Provider, error: &ExplorerError) {
        if !self.throttle.should_notify(provider) {
            return;
        }
        let event = StatusEvent::ProviderFailure {
            provider,
            error: error.to_string(),
        };
        if let Err(e) = self.tx.try_send(event) {
            warn!(error = %e, "Failed to queue status event");
        }
    }

    /// Hook for the analyzers.
    pub fn failure_hook(&self) -> FailureHook {
        let handle = self.clone();
        Arc::new(move |provider: Provider, error: &ExplorerError| {
            handle.report_failure(provider, error)
        })
    }
}

/// Start the status notifier background task.
///
/// The task ends once every handle has been dropped.
pub fn start_status_notifier(
    config: StatusNotifierConfig,
) -> (StatusNotifierHandle, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<StatusEvent>(100);
    let notifier = StatusNotifier::new(config);

    let task = tokio::spawn(async move {
        info!("Status notifier started");

        while let Some(event) = rx.recv().await {
            notifier.notify(&event).await;
        }

        info!("Status notifier stopped");
    });

    let handle = StatusNotifierHandle {
        tx,
        throttle: Arc::new(FailureThrottle::new(FAILURE_NOTIFY_INTERVAL)),
    };
    (handle, task)
}

/// Start the notifier when a status chat is configured.
pub fn try_start_status_notifier(
    bot_token: &str,
    chat_id: Option<i64>,
) -> Option<(StatusNotifierHandle, JoinHandle<()>)> {
    match chat_id {
        Some(chat_id) => {
            info!(chat_id, "Status notifier enabled");
            Some(start_status_notifier(StatusNotifierConfig {
                bot_token: bot_token.to_string(),
                chat_id,
            }))
        }
        None => {
            info!("Status notifier disabled (TELEGRAM_STATUS_CHAT_ID not set)");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    #[tokio::test(start_paused = true)]
    async fn test_failure_throttle() {
        let throttle = FailureThrottle::new(Duration::from_secs(600));
        assert!(throttle.should_notify(Provider::Helius));
        assert!(!throttle.should_notify(Provider::Helius));
        assert!(throttle.should_notify(Provider::Etherscan));

        tokio::time::advance(Duration::from_secs(599)).await;
        assert!(!throttle.should_notify(Provider::Helius));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(throttle.should_notify(Provider::Helius));
        assert!(!throttle.should_notify(Provider::Helius));
    }

    #[test]
    fn test_format_event() {
        let now = chrono::Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let event = StatusEvent::ProviderFailure {
            provider: Provider::Solscan,
            error: "Solscan: <oops>".to_string(),
        };
        assert_eq!(
            format_event(&event, "worker-1", now),
            "<b>worker-1</b>\n⚠️ <b>Solscan</b> request failed\nSolscan: &lt;oops&gt;\n\n\
             ⏰ 2024-05-01 12:00:00 UTC"
        );
    }

    #[tokio::test]
    async fn test_report_failure_is_throttled() {
        let (tx, mut rx) = mpsc::channel(10);
        let handle = StatusNotifierHandle {
            tx,
            throttle: Arc::new(FailureThrottle::new(FAILURE_NOTIFY_INTERVAL)),
        };
        let hook = handle.failure_hook();
        let err = ExplorerError::RateLimited {
            provider: Provider::Etherscan,
        };

        hook(Provider::Etherscan, &err);
        hook(Provider::Etherscan, &err);
        drop(hook);
        drop(handle);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert_eq!(
            events,
            vec![StatusEvent::ProviderFailure {
                provider: Provider::Etherscan,
                error: "Etherscan rate limit exceeded".to_string(),
            }]
        );
    }
}
