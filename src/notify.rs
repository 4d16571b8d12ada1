// =============================================================================
// Notifications — best-effort Telegram delivery
// =============================================================================
//
// `send` never fails from the caller's point of view: delivery errors are
// logged at WARN and dropped so a broken chat integration cannot stall a
// scan or monitor cycle.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Credentials;
use crate::error::{BotError, BotResult};

const TELEGRAM_API: &str = "https://api.telegram.org";
const SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Callers await `send` inline between exchange calls, so an implementation
/// must bound its own latency: the Telegram notifier gives up after
/// `SEND_TIMEOUT`.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &str);
}

/// Fallback when no chat is configured: messages only reach the log.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, message: &str) {
        info!(message, "notification");
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    disable_web_page_preview: bool,
}

pub struct TelegramNotifier {
    client: reqwest::Client,
    base_url: String,
    token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(token: impl Into<String>, chat_id: impl Into<String>) -> anyhow::Result<Self> {
        Self::with_base_url(TELEGRAM_API, token, chat_id)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        token: impl Into<String>,
        chat_id: impl Into<String>,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .context("failed to build reqwest client for TelegramNotifier")?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            token: token.into(),
            chat_id: chat_id.into(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.base_url, self.token)
    }

    async fn try_send(&self, message: &str) -> BotResult<()> {
        let body = SendMessage {
            chat_id: &self.chat_id,
            text: message,
            disable_web_page_preview: true,
        };
        let resp = self
            .client
            .post(self.endpoint())
            .json(&body)
            .send()
            .await
            // Strip the URL: it embeds the bot token.
            .map_err(|e| BotError::Notification(e.without_url().to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(BotError::Notification(format!("HTTP {status}: {text}")));
        }
        debug!("telegram message delivered");
        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, message: &str) {
        if let Err(e) = self.try_send(message).await {
            warn!(error = %e, "telegram notification dropped");
        }
    }
}

impl std::fmt::Debug for TelegramNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramNotifier")
            .field("token", &"<redacted>")
            .field("chat_id", &self.chat_id)
            .finish()
    }
}

/// `YYYY-MM-DD HH:MM UTC` for a funding timestamp in Unix milliseconds.
pub fn format_funding_time(ms: i64) -> String {
    match DateTime::<Utc>::from_timestamp_millis(ms) {
        Some(t) if ms > 0 => t.format("%Y-%m-%d %H:%M UTC").to_string(),
        _ => "unknown".to_string(),
    }
}

/// Telegram when both token and chat id are present, otherwise log-only.
pub fn from_credentials(creds: &Credentials) -> anyhow::Result<Arc<dyn Notifier>> {
    match (&creds.telegram_token, &creds.telegram_chat_id) {
        (Some(token), Some(chat)) => Ok(Arc::new(TelegramNotifier::new(token, chat)?)),
        _ => {
            warn!("TELEGRAM_BOT_TOKEN / TELEGRAM_CHAT_ID not set, notifications go to the log only");
            Ok(Arc::new(LogNotifier))
        }
    }
}
