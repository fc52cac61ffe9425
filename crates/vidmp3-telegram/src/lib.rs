//! vidmp3-telegram: Telegram Bot API client
//!
//! This crate provides the chat side of the bot:
//! - Bot API wire types (updates, messages, users)
//! - An HTTP client for long polling, messages and audio uploads
//! - The `ChatApi` trait the handlers talk to

pub mod client;
pub mod traits;
pub mod types;

pub use client::BotClient;
pub use traits::{AudioUpload, ChatApi, UpdateSource};
pub use types::*;
