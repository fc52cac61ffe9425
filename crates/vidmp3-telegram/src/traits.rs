//! Chat API trait definitions

use async_trait::async_trait;
use std::path::PathBuf;
use vidmp3_core::VidMp3Result;

use crate::types::{Message, ParseMode, Update};

/// An audio file to send
#[derive(Debug, Clone)]
pub struct AudioUpload {
    /// File on disk
    pub path: PathBuf,
    /// Track title shown by Telegram clients
    pub title: String,
    /// Caption below the audio
    pub caption: String,
    /// Caption formatting
    pub parse_mode: Option<ParseMode>,
}

/// Chat operations used by the handlers
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Send a text message
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        parse_mode: Option<ParseMode>,
    ) -> VidMp3Result<Message>;

    /// Replace the text of a sent message
    async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        parse_mode: Option<ParseMode>,
    ) -> VidMp3Result<()>;

    /// Delete a message
    async fn delete_message(&self, chat_id: i64, message_id: i64) -> VidMp3Result<()>;

    /// Upload an audio file
    async fn send_audio(&self, chat_id: i64, audio: &AudioUpload) -> VidMp3Result<Message>;
}

/// Source of incoming updates
#[async_trait]
pub trait UpdateSource: Send + Sync {
    /// Wait for updates with `update_id >= offset`
    async fn get_updates(&self, offset: i64) -> VidMp3Result<Vec<Update>>;
}
