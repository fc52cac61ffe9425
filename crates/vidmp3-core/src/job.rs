//! Conversion job, output, and user-facing text definitions

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

use crate::{VidMp3Error, VidMp3Result};

/// Reply to `/start`
pub const WELCOME_TEXT: &str = "👋 *Welcome to SuperFast Video → MP3 Bot!*\n\n\
🎥 Send a video link (YouTube, etc.) — I'll convert it into a high-quality MP3 **super fast!** 🚀";

/// Reply to text that is not a link
pub const INVALID_LINK_TEXT: &str = "❌ Please send a valid video link (e.g., YouTube).";

/// Title used when the extractor reports none
pub const DEFAULT_TITLE: &str = "audio";

/// Longest title quoted in a caption; Telegram caps captions at 1024 characters
pub const MAX_CAPTION_TITLE: usize = 200;

/// A single link-to-MP3 request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionJob {
    /// Unique identifier, also the prefix of every file the job creates
    pub id: Uuid,
    /// Telegram user who sent the link
    pub user_id: i64,
    /// Chat to reply in
    pub chat_id: i64,
    /// Validated link
    pub url: String,
}

impl ConversionJob {
    /// Create a job for an already validated link
    pub fn new(user_id: i64, chat_id: i64, url: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            chat_id,
            url,
        }
    }

    /// Prefix shared by all files of this job in the work dir
    pub fn file_prefix(&self) -> String {
        format!("{}_", self.id)
    }
}

/// Result of a finished download + extraction
#[derive(Debug, Clone)]
pub struct ConversionOutput {
    /// Path of the MP3 file
    pub path: PathBuf,
    /// Media title reported by the extractor
    pub title: String,
    /// Wall time spent downloading and converting
    pub elapsed: Duration,
    /// Size of the MP3 file in bytes
    pub size_bytes: u64,
}

impl ConversionOutput {
    /// File size in MiB
    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / (1024.0 * 1024.0)
    }

    /// Elapsed seconds rounded to one decimal
    pub fn elapsed_secs(&self) -> f64 {
        (self.elapsed.as_secs_f64() * 10.0).round() / 10.0
    }

    /// Markdown caption sent along with the audio
    pub fn caption(&self) -> String {
        let mut title: String = self.title.chars().take(MAX_CAPTION_TITLE).collect();
        if title.len() < self.title.len() {
            title.push('…');
        }
        format!(
            "✅ {} converted successfully!\n⏱️ Time taken: *{:.1}s*\n💾 File size: *{:.2} MB*",
            bold_markdown(&title),
            self.elapsed_secs(),
            self.size_mb()
        )
    }
}

/// Accept only text that looks like an http(s) link
pub fn validate_link(text: &str) -> VidMp3Result<String> {
    let url = text.trim();
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(url.to_string())
    } else {
        Err(VidMp3Error::InvalidLink(url.to_string()))
    }
}

/// Render `text` bold in legacy Telegram Markdown.
///
/// Inside a bold entity only `*` is special and it cannot be escaped there,
/// so the entity is closed around each asterisk, which is escaped outside it.
pub fn bold_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 4);
    for (i, segment) in text.split('*').enumerate() {
        if i > 0 {
            out.push_str("\\*");
        }
        if !segment.is_empty() {
            out.push('*');
            out.push_str(segment);
            out.push('*');
        }
    }
    out
}
