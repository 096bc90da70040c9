//! Signal delivery
//!
//! A [`Distributor`] fans one rendered message out to every recipient and
//! reports each attempt separately. Delivery is at-most-once: failures are
//! logged, never retried.

pub mod message;

#[cfg(test)]
mod tests;

pub use message::{escape_html, SignalMessage};

use crate::config::TelegramConfig;
use crate::error::{BotError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Outcome of sending to one recipient
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub recipient: String,
    pub error: Option<String>,
}

impl Delivery {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Distributor: Send + Sync {
    async fn deliver(&self, text: &str) -> Vec<Delivery>;
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    description: Option<String>,
}

/// Telegram Bot API sender
pub struct TelegramNotifier {
    http: Client,
    bot_token: String,
    chat_ids: Vec<String>,
}

impl TelegramNotifier {
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        let http = Client::builder().timeout(Duration::from_secs(15)).build()?;
        Ok(Self {
            http,
            bot_token: config.bot_token.clone(),
            chat_ids: config.chat_ids.clone(),
        })
    }

    async fn send(&self, chat_id: &str, text: &str) -> Result<()> {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.bot_token);
        let request = SendMessageRequest {
            chat_id,
            text,
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };

        let response: TelegramResponse = self.http.post(&url).json(&request).send().await?.json().await?;
        if !response.ok {
            return Err(BotError::Api(
                response
                    .description
                    .unwrap_or_else(|| "sendMessage rejected".to_string()),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Distributor for TelegramNotifier {
    async fn deliver(&self, text: &str) -> Vec<Delivery> {
        let mut deliveries = Vec::with_capacity(self.chat_ids.len());
        for chat_id in &self.chat_ids {
            let error = match self.send(chat_id, text).await {
                Ok(()) => None,
                Err(e) => {
                    tracing::error!("Failed to send Telegram message to {}: {}", chat_id, e);
                    Some(e.to_string())
                }
            };
            deliveries.push(Delivery {
                recipient: chat_id.clone(),
                error,
            });
        }
        deliveries
    }
}

/// Writes messages to the log instead of sending them.
pub struct LogDistributor;

#[async_trait]
impl Distributor for LogDistributor {
    async fn deliver(&self, text: &str) -> Vec<Delivery> {
        tracing::info!("📨 [dry-run]\n{}", text);
        vec![Delivery {
            recipient: "log".to_string(),
            error: None,
        }]
    }
}
