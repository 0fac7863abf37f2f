use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::config::{ConfigError, Settings};

const API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Error)]
pub enum TelegramError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Telegram API error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("Unable to determine Telegram chat ID. Provide TELEGRAM_DEFAULT_CHAT_ID or send a message to the bot first.")]
    NoChat,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<IncomingMessage>,
    #[serde(default)]
    pub edited_message: Option<IncomingMessage>,
}

impl Update {
    pub fn any_message(&self) -> Option<&IncomingMessage> {
        self.message.as_ref().or(self.edited_message.as_ref())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    #[serde(default)]
    pub text: Option<String>,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Delivery {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub success: bool,
    pub message_id: Option<i64>,
    pub chat_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryReport {
    pub success: bool,
    pub message_id: Option<i64>,
    pub chat_id: String,
    pub sent_at: DateTime<Utc>,
    pub results: Vec<Delivery>,
}

pub struct TelegramClient {
    client: Client,
    base_url: String,
    default_chat_id: Option<String>,
    channel_id: Option<String>,
}

impl TelegramClient {
    pub fn new(settings: &Settings) -> Result<Self, TelegramError> {
        let token = settings.require_telegram_token()?;
        let client = Client::builder().timeout(Duration::from_secs(70)).build()?;
        Ok(Self {
            client,
            base_url: format!("{API_BASE}/bot{token}"),
            default_chat_id: settings.default_chat_id.clone(),
            channel_id: settings.telegram_channel_id.clone(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, payload: serde_json::Value) -> Result<T, TelegramError> {
        let response = self
            .client
            .post(format!("{}/{}", self.base_url, method))
            .json(&payload)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(TelegramError::Api {
                status: status.as_u16(),
                body,
            });
        }
        let envelope: Envelope<T> = serde_json::from_str(&body).map_err(|_| TelegramError::Api {
            status: status.as_u16(),
            body: body.clone(),
        })?;
        match envelope.result {
            Some(result) if envelope.ok => Ok(result),
            _ => Err(TelegramError::Api {
                status: status.as_u16(),
                body: envelope.description.unwrap_or(body),
            }),
        }
    }

    async fn post_message(&self, chat_id: &str, text: &str) -> Result<Option<i64>, TelegramError> {
        let sent: SentMessage = self
            .call(
                "sendMessage",
                json!({
                    "chat_id": chat_id,
                    "text": text,
                    "parse_mode": "HTML",
                    "disable_web_page_preview": true,
                }),
            )
            .await?;
        Ok(sent.message_id)
    }

    /// Answer a single chat directly, without mirroring.
    pub async fn reply(&self, chat_id: i64, text: &str) -> Result<Option<i64>, TelegramError> {
        self.post_message(&chat_id.to_string(), text).await
    }

    /// Long-poll for updates after `offset`.
    pub async fn get_updates(&self, offset: Option<i64>, timeout_secs: u64) -> Result<Vec<Update>, TelegramError> {
        let mut payload = json!({ "timeout": timeout_secs });
        if let Some(offset) = offset {
            payload["offset"] = json!(offset);
        }
        self.call("getUpdates", payload).await
    }

    /// Most recent private chat that wrote to the bot.
    async fn recent_private_chat(&self) -> Option<String> {
        let updates: Vec<Update> = match self.call("getUpdates", json!({"limit": 10, "offset": -10})).await {
            Ok(updates) => updates,
            Err(err) => {
                tracing::warn!("Unable to fetch Telegram updates: {}", err);
                return None;
            }
        };
        updates
            .iter()
            .rev()
            .filter_map(|update| update.message.as_ref())
            .find(|message| message.chat.kind.as_deref() == Some("private"))
            .map(|message| message.chat.id.to_string())
    }

    /// Send to the given chat (or the configured default, or the latest private
    /// chat), then mirror to the channel when one is configured. A failed mirror
    /// is logged and left out of the report.
    pub async fn send_message(&self, text: &str, chat_id: Option<&str>) -> Result<DeliveryReport, TelegramError> {
        let chat_id = match chat_id.map(str::to_string).or_else(|| self.default_chat_id.clone()) {
            Some(chat_id) => chat_id,
            None => self.recent_private_chat().await.ok_or(TelegramError::NoChat)?,
        };

        tracing::info!("Sending message to Telegram chat {} ({} chars)", chat_id, text.chars().count());
        let message_id = self.post_message(&chat_id, text).await?;
        let mut results = vec![Delivery {
            kind: "private_chat",
            success: true,
            message_id,
            chat_id: chat_id.clone(),
        }];

        if let Some(channel) = self.channel_id.as_deref() {
            match self.post_message(channel, text).await {
                Ok(message_id) => results.push(Delivery {
                    kind: "channel",
                    success: true,
                    message_id,
                    chat_id: channel.to_string(),
                }),
                Err(err) => tracing::error!("Failed to send message to Telegram channel: {}", err),
            }
        }

        Ok(DeliveryReport {
            success: true,
            message_id,
            chat_id,
            sent_at: Utc::now(),
            results,
        })
    }
}
