//! HTTP client for the Telegram Bot API

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Body;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};
use vidmp3_core::{TelegramConfig, VidMp3Error, VidMp3Result};

use crate::traits::{AudioUpload, ChatApi, UpdateSource};
use crate::types::{ApiResponse, Message, ParseMode, Update, User};

/// Timeout for plain requests
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Bot API client
pub struct BotClient {
    /// `<api_url>/bot<token>`
    base_url: String,
    client: reqwest::Client,
    poll_timeout_secs: u64,
    upload_timeout: Duration,
    max_upload_bytes: u64,
}

impl BotClient {
    /// Create a new client
    pub fn new(config: &TelegramConfig) -> VidMp3Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| VidMp3Error::Telegram(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: format!(
                "{}/bot{}",
                config.api_url.trim_end_matches('/'),
                config.token
            ),
            client,
            poll_timeout_secs: config.poll_timeout_secs,
            upload_timeout: Duration::from_secs(config.upload_timeout_secs),
            max_upload_bytes: config.max_upload_bytes,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }

    /// Call a JSON method
    async fn call<P, T>(&self, method: &str, params: &P, timeout: Duration) -> VidMp3Result<T>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.method_url(method))
            .timeout(timeout)
            .json(params)
            .send()
            .await
            .map_err(transport_error)?;

        decode(method, response).await
    }

    /// Identify the bot, validating the token
    pub async fn get_me(&self) -> VidMp3Result<User> {
        self.call("getMe", &serde_json::json!({}), REQUEST_TIMEOUT)
            .await
    }
}

/// Strip the URL from transport errors so the token never reaches the logs
fn transport_error(err: reqwest::Error) -> VidMp3Error {
    if err.is_timeout() {
        VidMp3Error::Timeout(err.without_url().to_string())
    } else {
        VidMp3Error::Telegram(err.without_url().to_string())
    }
}

/// Decode a Bot API envelope
async fn decode<T: DeserializeOwned>(method: &str, response: reqwest::Response) -> VidMp3Result<T> {
    let status = response.status();
    let body = response.bytes().await.map_err(transport_error)?;

    let envelope: ApiResponse<T> = serde_json::from_slice(&body).map_err(|e| {
        VidMp3Error::Telegram(format!("{} returned HTTP {} with unreadable body: {}", method, status, e))
    })?;

    match envelope {
        ApiResponse {
            ok: true,
            result: Some(result),
            ..
        } => Ok(result),
        ApiResponse {
            description,
            error_code,
            parameters,
            ..
        } => {
            let description = description.unwrap_or_else(|| "no description".to_string());
            let retry = parameters
                .and_then(|p| p.retry_after)
                .map(|s| format!(", retry after {}s", s))
                .unwrap_or_default();
            debug!(method = method, status = %status, "Bot API call failed");
            Err(VidMp3Error::Telegram(format!(
                "{} failed ({}): {}{}",
                method,
                error_code.unwrap_or(i64::from(status.as_u16())),
                description,
                retry
            )))
        }
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<ParseMode>,
}

#[derive(Serialize)]
struct EditMessageText<'a> {
    chat_id: i64,
    message_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<ParseMode>,
}

#[derive(Serialize)]
struct DeleteMessage {
    chat_id: i64,
    message_id: i64,
}

/// File name shown to the user, derived from the title
fn upload_file_name(audio: &AudioUpload) -> String {
    let stem: String = audio
        .title
        .chars()
        .map(|c| if c.is_control() || matches!(c, '/' | '\\') { '_' } else { c })
        .collect();
    let extension = audio
        .path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "mp3".to_string());
    let stem = match stem.trim() {
        "" => vidmp3_core::DEFAULT_TITLE,
        trimmed => trimmed,
    };
    format!("{}.{}", stem, extension)
}

#[async_trait]
impl ChatApi for BotClient {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        parse_mode: Option<ParseMode>,
    ) -> VidMp3Result<Message> {
        let params = SendMessage {
            chat_id,
            text,
            parse_mode,
        };
        self.call("sendMessage", &params, REQUEST_TIMEOUT).await
    }

    async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        parse_mode: Option<ParseMode>,
    ) -> VidMp3Result<()> {
        let params = EditMessageText {
            chat_id,
            message_id,
            text,
            parse_mode,
        };
        // the result is the edited message, or `true` for inline messages
        let _: serde_json::Value = self
            .call("editMessageText", &params, REQUEST_TIMEOUT)
            .await?;
        Ok(())
    }

    async fn delete_message(&self, chat_id: i64, message_id: i64) -> VidMp3Result<()> {
        let params = DeleteMessage {
            chat_id,
            message_id,
        };
        let _: bool = self
            .call("deleteMessage", &params, REQUEST_TIMEOUT)
            .await?;
        Ok(())
    }

    async fn send_audio(&self, chat_id: i64, audio: &AudioUpload) -> VidMp3Result<Message> {
        let size = tokio::fs::metadata(&audio.path).await?.len();
        if size > self.max_upload_bytes {
            warn!(
                chat_id = chat_id,
                size = size,
                limit = self.max_upload_bytes,
                "Audio exceeds upload limit"
            );
            return Err(VidMp3Error::UploadTooLarge {
                size,
                limit: self.max_upload_bytes,
            });
        }

        let file = tokio::fs::File::open(&audio.path).await?;
        let part = Part::stream_with_length(Body::from(file), size)
            .file_name(upload_file_name(audio))
            .mime_str("audio/mpeg")
            .map_err(|e| VidMp3Error::Internal(e.to_string()))?;

        let mut form = Form::new()
            .text("chat_id", chat_id.to_string())
            .text("title", audio.title.clone())
            .text("caption", audio.caption.clone())
            .part("audio", part);
        if let Some(mode) = audio.parse_mode {
            form = form.text("parse_mode", mode.as_str());
        }

        debug!(chat_id = chat_id, size = size, "Uploading audio");

        let response = self
            .client
            .post(self.method_url("sendAudio"))
            .timeout(self.upload_timeout)
            .multipart(form)
            .send()
            .await
            .map_err(transport_error)?;

        decode("sendAudio", response).await
    }
}

#[async_trait]
impl UpdateSource for BotClient {
    /// Long-poll for message updates starting at `offset`
    async fn get_updates(&self, offset: i64) -> VidMp3Result<Vec<Update>> {
        #[derive(Serialize)]
        struct GetUpdates<'a> {
            offset: i64,
            timeout: u64,
            allowed_updates: &'a [&'a str],
        }

        let params = GetUpdates {
            offset,
            timeout: self.poll_timeout_secs,
            allowed_updates: &["message"],
        };

        // the HTTP request must outlive the server-side poll
        let timeout = Duration::from_secs(self.poll_timeout_secs) + Duration::from_secs(10);
        self.call("getUpdates", &params, timeout).await
    }
}
