//! Error types for vidmp3

use thiserror::Error;

/// Main error type for vidmp3
#[derive(Error, Debug)]
pub enum VidMp3Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The message text is not a downloadable link
    #[error("Invalid link: {0}")]
    InvalidLink(String),

    /// yt-dlp failed to fetch the media
    #[error("Download error: {0}")]
    Download(String),

    /// Audio extraction produced no file
    #[error("{0}")]
    Conversion(String),

    /// Telegram Bot API error
    #[error("Telegram error: {0}")]
    Telegram(String),

    /// File exceeds the Bot API upload limit
    #[error("Audio is too large to upload: {size} bytes (limit {limit})")]
    UploadTooLarge { size: u64, limit: u64 },

    /// Operation did not finish in time
    #[error("Timed out: {0}")]
    Timeout(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for vidmp3 operations
pub type VidMp3Result<T> = Result<T, VidMp3Error>;

impl From<serde_json::Error> for VidMp3Error {
    fn from(err: serde_json::Error) -> Self {
        VidMp3Error::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for VidMp3Error {
    fn from(err: toml::de::Error) -> Self {
        VidMp3Error::Config(format!("Failed to parse config: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = VidMp3Error::Config("missing token".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing token");
    }

    #[test]
    fn test_conversion_error_is_bare() {
        let err = VidMp3Error::Conversion("Failed to convert video to MP3".to_string());
        assert_eq!(err.to_string(), "Failed to convert video to MP3");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: VidMp3Error = io_err.into();
        assert!(matches!(err, VidMp3Error::Io(_)));
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<u32>("nope").unwrap_err();
        let err: VidMp3Error = json_err.into();
        assert!(matches!(err, VidMp3Error::Serialization(_)));
    }
}
