//! Configuration types for vidmp3

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{VidMp3Error, VidMp3Result};

/// Environment variable holding the bot token
pub const TOKEN_ENV: &str = "bot";
/// Fallback environment variable for the bot token
pub const TOKEN_ENV_FALLBACK: &str = "BOT_TOKEN";
/// Environment variable holding Netscape-format YouTube cookies
pub const COOKIES_ENV: &str = "YOUTUBE_COOKIES";

/// Main bot configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Telegram Bot API configuration
    pub telegram: TelegramConfig,
    /// yt-dlp / ffmpeg configuration
    pub download: DownloadConfig,
    /// Status message animation
    pub progress: ProgressConfig,
    /// Job handling limits
    pub bot: BotSettings,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl BotConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> VidMp3Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| VidMp3Error::Config(format!("Failed to read config file: {}", e)))?;
        Ok(toml::from_str(&content)?)
    }

    /// Load from an optional file, then apply the process environment
    pub fn load(path: Option<&Path>) -> VidMp3Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Override file values with environment variables
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = lookup(TOKEN_ENV)
            .or_else(|| lookup(TOKEN_ENV_FALLBACK))
            .filter(|t| !t.trim().is_empty());
        if let Some(token) = token {
            self.telegram.token = token.trim().to_string();
        }

        if let Some(cookies) = lookup(COOKIES_ENV).filter(|c| !c.is_empty()) {
            self.download.cookies_content = Some(cookies);
        }
    }

    /// Check that the configuration can start a bot
    pub fn validate(&self) -> VidMp3Result<()> {
        if self.telegram.token.is_empty() {
            return Err(VidMp3Error::Config(format!(
                "bot token is not set (use the `{}` environment variable)",
                TOKEN_ENV
            )));
        }
        if self.bot.max_concurrent_jobs == 0 {
            return Err(VidMp3Error::Config(
                "bot.max_concurrent_jobs must be at least 1".to_string(),
            ));
        }
        if self.progress.tick_millis == 0 {
            return Err(VidMp3Error::Config(
                "progress.tick_millis must be at least 1".to_string(),
            ));
        }
        if self.download.timeout_secs == 0 {
            return Err(VidMp3Error::Config(
                "download.timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.progress.bar_width == 0 {
            return Err(VidMp3Error::Config(
                "progress.bar_width must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Telegram Bot API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot token issued by BotFather
    pub token: String,
    /// Bot API base URL
    pub api_url: String,
    /// Long-polling timeout in seconds
    pub poll_timeout_secs: u64,
    /// Delay before retrying a failed poll
    pub retry_delay_secs: u64,
    /// Largest file the Bot API accepts for upload
    pub max_upload_bytes: u64,
    /// Timeout for a single upload request
    pub upload_timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            api_url: "https://api.telegram.org".to_string(),
            poll_timeout_secs: 30,
            retry_delay_secs: 3,
            max_upload_bytes: 50 * 1024 * 1024, // 50 MiB
            upload_timeout_secs: 300,
        }
    }
}

/// yt-dlp and audio extraction configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Path to the yt-dlp executable
    pub ytdlp_path: PathBuf,
    /// Directory holding ffmpeg, if not on PATH
    pub ffmpeg_location: Option<PathBuf>,
    /// yt-dlp format selector
    pub format: String,
    /// Target audio codec
    pub audio_codec: String,
    /// Target audio bitrate in kbps
    pub audio_quality: String,
    /// Parallel fragment downloads for segmented streams
    pub concurrent_fragments: u32,
    /// Directory for intermediate and output files (system temp dir if unset)
    pub work_dir: Option<PathBuf>,
    /// Cookie file handed to yt-dlp when present
    pub cookies_path: PathBuf,
    /// Cookie file content, written to `cookies_path` at startup
    #[serde(skip_serializing)]
    pub cookies_content: Option<String>,
    /// Upper bound for one download + conversion
    pub timeout_secs: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            ytdlp_path: PathBuf::from("yt-dlp"),
            ffmpeg_location: None,
            format: "bestaudio/best".to_string(),
            audio_codec: "mp3".to_string(),
            audio_quality: "192".to_string(),
            concurrent_fragments: 5,
            work_dir: None,
            cookies_path: PathBuf::from("cookies.txt"),
            cookies_content: None,
            timeout_secs: 900,
        }
    }
}

impl DownloadConfig {
    /// Resolved working directory
    pub fn work_dir(&self) -> PathBuf {
        self.work_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Status message animation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    /// Interval between status message edits
    pub tick_millis: u64,
    /// Number of cells in the progress bar
    pub bar_width: usize,
    /// Pause after announcing the upload
    pub upload_pause_millis: u64,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            tick_millis: 600,
            bar_width: 20,
            upload_pause_millis: 500,
        }
    }
}

/// Job handling limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotSettings {
    /// Conversions allowed to run at the same time
    pub max_concurrent_jobs: usize,
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 4,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Log format
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per event
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_default_config() {
        let config = BotConfig::default();
        assert_eq!(config.download.format, "bestaudio/best");
        assert_eq!(config.download.audio_quality, "192");
        assert_eq!(config.download.concurrent_fragments, 5);
        assert_eq!(config.progress.tick_millis, 600);
        assert_eq!(config.progress.bar_width, 20);
        assert_eq!(config.telegram.poll_timeout_secs, 30);
        assert_eq!(config.logging.format, LogFormat::Text);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let toml_str = r#"
[telegram]
token = "123:abc"

[download]
ytdlp_path = "/opt/yt-dlp"
work_dir = "/var/tmp/vidmp3"

[logging]
format = "json"
"#;
        let config: BotConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.telegram.token, "123:abc");
        assert_eq!(config.telegram.api_url, "https://api.telegram.org");
        assert_eq!(config.download.ytdlp_path, PathBuf::from("/opt/yt-dlp"));
        assert_eq!(config.download.work_dir(), PathBuf::from("/var/tmp/vidmp3"));
        assert_eq!(config.download.audio_codec, "mp3");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_env_overrides_token_and_cookies() {
        let vars = env(&[("bot", " 42:xyz "), ("YOUTUBE_COOKIES", "# Netscape")]);
        let mut config = BotConfig::default();
        config.telegram.token = "from-file".to_string();
        config.apply_env(|k| vars.get(k).cloned());

        assert_eq!(config.telegram.token, "42:xyz");
        assert_eq!(config.download.cookies_content.as_deref(), Some("# Netscape"));
    }

    #[test]
    fn test_env_token_fallback() {
        let vars = env(&[("BOT_TOKEN", "7:fallback")]);
        let mut config = BotConfig::default();
        config.apply_env(|k| vars.get(k).cloned());
        assert_eq!(config.telegram.token, "7:fallback");
        assert!(config.download.cookies_content.is_none());
    }

    #[test]
    fn test_validate_requires_token() {
        let config = BotConfig::default();
        assert!(matches!(config.validate(), Err(VidMp3Error::Config(_))));

        let mut config = BotConfig::default();
        config.telegram.token = "1:a".to_string();
        assert!(config.validate().is_ok());

        config.bot.max_concurrent_jobs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_intervals() {
        let mut config = BotConfig::default();
        config.telegram.token = "1:a".to_string();
        config.progress.tick_millis = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("progress.tick_millis"));

        config.progress.tick_millis = 600;
        config.download.timeout_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("download.timeout_secs"));
    }

    #[test]
    fn test_from_file_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vidmp3.toml");
        std::fs::write(&path, "[telegram\ntoken = ").unwrap();
        let err = BotConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, VidMp3Error::Config(_)));
        assert!(err.to_string().contains("Failed to parse config"));
    }

    #[test]
    fn test_from_file_missing() {
        let err = BotConfig::from_file(Path::new("/nonexistent/vidmp3.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
