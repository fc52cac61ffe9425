//! vidmp3-core: Core types and configuration for the vidmp3 bot
//!
//! This crate provides the fundamental types used throughout vidmp3:
//! - Bot configuration (TOML file plus environment overrides)
//! - Error handling
//! - Conversion jobs and their outputs
//! - Progress stages and progress-bar rendering
//! - Link validation and caption formatting

pub mod config;
pub mod error;
pub mod job;
pub mod progress;

pub use config::*;
pub use error::*;
pub use job::*;
pub use progress::*;
