//! Telegram Bot API client.
//!
//! Thin wrapper over the bot HTTP API: long polling via `getUpdates`,
//! `sendMessage` and `sendPhoto`. Messages sent as Markdown are retried
//! as plain text when Telegram rejects the entity parse.

use std::time::Duration;

use async_trait::async_trait;
use marquee_core::ChatId;
use reqwest::{multipart, Client};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors from the Telegram Bot API.
#[derive(Debug, Error)]
pub enum TelegramError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Telegram answered with `ok: false`.
    #[error("Telegram API error: {description}")]
    ApiError { description: String },
}

// ============================================================================
// Wire types
// ============================================================================

/// One long-poll result.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

/// An incoming message. Only the fields the bot reads are kept; the rest
/// of the payload is ignored on deserialization.
#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub from: Option<User>,
    pub chat: Chat,
    pub text: Option<String>,
    /// Set on the service message Telegram posts when someone leaves.
    pub left_chat_member: Option<User>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    pub is_bot: bool,
    pub first_name: String,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to_message_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct SendPhotoRequest<'a> {
    chat_id: i64,
    photo: &'a str,
    caption: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to_message_id: Option<i64>,
}

// ============================================================================
// Client
// ============================================================================

/// The sending side of the client. Command dispatch talks to this trait.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Send a text message. With `markdown` set the text goes out with
    /// Markdown parsing first and falls back to plain text if Telegram
    /// rejects it.
    async fn send_message(
        &self,
        chat: ChatId,
        text: &str,
        reply_to: Option<i64>,
        markdown: bool,
    ) -> Result<(), TelegramError>;

    /// Send a photo by source URL; Telegram fetches it itself.
    async fn send_photo_url(
        &self,
        chat: ChatId,
        photo_url: &str,
        caption: &str,
        reply_to: Option<i64>,
    ) -> Result<(), TelegramError>;

    /// Upload a JPEG as a photo via multipart.
    async fn send_photo_bytes(
        &self,
        chat: ChatId,
        jpeg: Vec<u8>,
        caption: &str,
        reply_to: Option<i64>,
    ) -> Result<(), TelegramError>;
}

/// Telegram Bot API client.
pub struct TelegramClient {
    client: Client,
    base_url: String,
    poll_timeout_secs: u64,
}

impl TelegramClient {
    /// Create a new client for the given bot token.
    pub fn new(token: &str, poll_timeout_secs: u64) -> Result<Self, TelegramError> {
        // The HTTP timeout must outlast the long-poll window.
        let client = Client::builder()
            .timeout(Duration::from_secs(poll_timeout_secs + 10))
            .build()?;

        Ok(Self {
            client,
            base_url: format!("https://api.telegram.org/bot{}", token),
            poll_timeout_secs,
        })
    }

    /// Fetch the bot's own identity. Also doubles as a token check at
    /// startup.
    pub async fn get_me(&self) -> Result<User, TelegramError> {
        let url = format!("{}/getMe", self.base_url);
        let response = self.client.get(&url).send().await?;
        parse_response(response).await
    }

    /// Long-poll for updates with ids at or above `offset`.
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>, TelegramError> {
        let url = format!("{}/getUpdates", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("offset", &offset.to_string()),
                ("timeout", &self.poll_timeout_secs.to_string()),
            ])
            .send()
            .await?;
        parse_response(response).await
    }

    async fn send_message_once(
        &self,
        chat: ChatId,
        text: &str,
        reply_to: Option<i64>,
        parse_mode: Option<&str>,
    ) -> Result<(), TelegramError> {
        debug!(%chat, len = text.len(), "sending message");

        let url = format!("{}/sendMessage", self.base_url);
        let request = SendMessageRequest {
            chat_id: chat.0,
            text,
            reply_to_message_id: reply_to,
            parse_mode,
        };
        let response = self.client.post(&url).json(&request).send().await?;
        parse_response::<Message>(response).await.map(|_| ())
    }
}

#[async_trait]
impl Messenger for TelegramClient {
    async fn send_message(
        &self,
        chat: ChatId,
        text: &str,
        reply_to: Option<i64>,
        markdown: bool,
    ) -> Result<(), TelegramError> {
        if markdown {
            match self
                .send_message_once(chat, text, reply_to, Some("Markdown"))
                .await
            {
                Ok(()) => return Ok(()),
                Err(TelegramError::ApiError { description }) => {
                    warn!(%chat, error = %description, "Markdown send rejected, retrying as plain text");
                }
                Err(e) => return Err(e),
            }
        }
        self.send_message_once(chat, text, reply_to, None).await
    }

    async fn send_photo_url(
        &self,
        chat: ChatId,
        photo_url: &str,
        caption: &str,
        reply_to: Option<i64>,
    ) -> Result<(), TelegramError> {
        debug!(%chat, url = photo_url, "sending photo by URL");

        let url = format!("{}/sendPhoto", self.base_url);
        let request = SendPhotoRequest {
            chat_id: chat.0,
            photo: photo_url,
            caption,
            reply_to_message_id: reply_to,
        };
        let response = self.client.post(&url).json(&request).send().await?;
        parse_response::<Message>(response).await.map(|_| ())
    }

    async fn send_photo_bytes(
        &self,
        chat: ChatId,
        jpeg: Vec<u8>,
        caption: &str,
        reply_to: Option<i64>,
    ) -> Result<(), TelegramError> {
        debug!(%chat, bytes = jpeg.len(), "uploading photo");

        let photo_part = multipart::Part::bytes(jpeg)
            .file_name("cover.jpg")
            .mime_str("image/jpeg")?;

        let mut form = multipart::Form::new()
            .text("chat_id", chat.0.to_string())
            .text("caption", caption.to_string())
            .part("photo", photo_part);
        if let Some(message_id) = reply_to {
            form = form.text("reply_to_message_id", message_id.to_string());
        }

        let url = format!("{}/sendPhoto", self.base_url);
        let response = self.client.post(&url).multipart(form).send().await?;
        parse_response::<Message>(response).await.map(|_| ())
    }
}

/// Unwrap the `{ok, result, description}` envelope every endpoint uses.
async fn parse_response<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, TelegramError> {
    let api: ApiResponse<T> = response.json().await?;
    if !api.ok {
        return Err(TelegramError::ApiError {
            description: api
                .description
                .unwrap_or_else(|| "no description".to_string()),
        });
    }
    api.result.ok_or(TelegramError::ApiError {
        description: "ok response without result".to_string(),
    })
}
