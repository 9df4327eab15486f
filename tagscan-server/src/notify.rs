//! Outbound scan notifications
//!
//! Delivery is best-effort. A notifier never reports failure to its caller;
//! problems are logged and the scan carries on.

use async_trait::async_trait;
use std::time::Duration;
use tagscan_common::config::TelegramConfig;
use tracing::{info, warn};

/// Sink for human-readable scan messages
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &str);
}

/// Writes notifications to the log when no messaging channel is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, message: &str) {
        info!(message, "Notification (no Telegram configured)");
    }
}

/// Telegram Bot API notifier, one `sendMessage` call per configured chat
pub struct TelegramNotifier {
    http_client: reqwest::Client,
    send_url: String,
    chat_ids: Vec<i64>,
}

impl TelegramNotifier {
    /// `request_timeout` bounds each `sendMessage` call; pass the scan timeout
    pub fn new(config: &TelegramConfig, request_timeout: Duration) -> reqwest::Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("tagscan/", env!("CARGO_PKG_VERSION")))
            .timeout(request_timeout)
            .build()?;

        Ok(Self {
            http_client,
            send_url: format!(
                "{}/bot{}/sendMessage",
                config.api_url.trim_end_matches('/'),
                config.token
            ),
            chat_ids: config.chat_ids.clone(),
        })
    }

    async fn send_to_chat(&self, chat_id: i64, message: &str) -> Result<(), String> {
        let chat_id = chat_id.to_string();
        let params = [
            ("chat_id", chat_id.as_str()),
            ("text", message),
            ("disable_web_page_preview", "true"),
        ];

        // Errors are stringified without the URL, which carries the bot token
        let response = self
            .http_client
            .get(&self.send_url)
            .query(&params)
            .send()
            .await
            .map_err(|e| e.without_url().to_string())?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!("HTTP {}: {}", status.as_u16(), body));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, message: &str) {
        for &chat_id in &self.chat_ids {
            if let Err(e) = self.send_to_chat(chat_id, message).await {
                warn!(chat_id, error = %e, "Telegram sendMessage failed");
            }
        }
    }
}
