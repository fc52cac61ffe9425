//! Progress stages and status-message rendering

use serde::{Deserialize, Serialize};

/// Emoji cycled in front of the status text, one per animation tick
pub const ANIM_FRAMES: [&str; 6] = ["🔄", "🌀", "💿", "📀", "⏳", "➡️"];

/// Share of the bar reserved for downloading; the rest covers upload
pub const DOWNLOAD_SHARE: f64 = 90.0;

/// Where a conversion job currently is
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum ProgressStage {
    /// Job registered, nothing reported yet
    Starting,
    /// Media is being fetched
    Downloading {
        /// Overall progress, 0..=90
        percent: f64,
    },
    /// ffmpeg is extracting the audio
    Converting,
    /// File is being sent to Telegram
    Uploading,
}

impl ProgressStage {
    /// Status text for this stage
    pub fn render(&self, bar_width: usize) -> String {
        match self {
            ProgressStage::Starting => "Starting...".to_string(),
            ProgressStage::Downloading { percent } => {
                format!("📥 Downloading...\n{}", progress_bar(*percent, bar_width))
            }
            ProgressStage::Converting => "🔄 Converting to MP3...".to_string(),
            ProgressStage::Uploading => {
                format!("📤 Uploading...\n{}", progress_bar(100.0, bar_width))
            }
        }
    }
}

/// Receives stage changes from a running download
pub trait ProgressSink: Send + Sync {
    /// Record the new stage
    fn report(&self, stage: ProgressStage);
}

/// Render a text progress bar such as `[████░░░░] 50.0%`
pub fn progress_bar(percent: f64, width: usize) -> String {
    let percent = if percent.is_nan() {
        0.0
    } else {
        percent.clamp(0.0, 100.0)
    };
    let filled = ((width as f64 * percent / 100.0) as usize).min(width);
    format!(
        "[{}{}] {:.1}%",
        "█".repeat(filled),
        "░".repeat(width - filled),
        percent
    )
}

/// Map downloaded bytes onto the download share of the bar
pub fn download_percent(downloaded: u64, total: Option<u64>) -> f64 {
    let total = total.unwrap_or(1).max(1);
    (downloaded as f64 / total as f64 * DOWNLOAD_SHARE).min(DOWNLOAD_SHARE)
}

/// Status text with the animation frame for `tick`
pub fn animated_text(tick: usize, text: &str) -> String {
    format!("{} {}", ANIM_FRAMES[tick % ANIM_FRAMES.len()], text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_bar_shape() {
        assert_eq!(progress_bar(0.0, 20), format!("[{}] 0.0%", "░".repeat(20)));
        assert_eq!(progress_bar(100.0, 20), format!("[{}] 100.0%", "█".repeat(20)));
        assert_eq!(
            progress_bar(47.5, 20),
            format!("[{}{}] 47.5%", "█".repeat(9), "░".repeat(11))
        );
    }

    #[test]
    fn test_progress_bar_clamps() {
        assert_eq!(progress_bar(250.0, 10), format!("[{}] 100.0%", "█".repeat(10)));
        assert_eq!(progress_bar(-3.0, 10), format!("[{}] 0.0%", "░".repeat(10)));
        assert_eq!(progress_bar(f64::NAN, 4), "[░░░░] 0.0%");
    }

    #[test]
    fn test_download_percent() {
        assert_eq!(download_percent(50, Some(100)), 45.0);
        assert_eq!(download_percent(100, Some(100)), 90.0);
        // unknown size: never exceeds the download share
        assert_eq!(download_percent(5_000, None), 90.0);
        assert_eq!(download_percent(0, Some(0)), 0.0);
    }

    #[test]
    fn test_stage_render() {
        assert_eq!(ProgressStage::Starting.render(20), "Starting...");
        assert_eq!(ProgressStage::Converting.render(20), "🔄 Converting to MP3...");
        assert!(ProgressStage::Uploading.render(20).ends_with("] 100.0%"));
        let text = ProgressStage::Downloading { percent: 45.0 }.render(20);
        assert!(text.starts_with("📥 Downloading...\n["));
        assert!(text.ends_with("45.0%"));
    }

    #[test]
    fn test_animated_text_cycles() {
        assert_eq!(animated_text(0, "x"), "🔄 x");
        assert_eq!(animated_text(6, "x"), "🔄 x");
        assert_eq!(animated_text(5, "x"), "➡️ x");
    }
}
