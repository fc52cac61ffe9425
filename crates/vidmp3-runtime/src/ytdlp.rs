//! yt-dlp runtime implementation
//!
//! Each conversion runs yt-dlp as a child process. yt-dlp downloads the best
//! audio stream and hands it to ffmpeg for MP3 extraction. Progress and the
//! final title are read back from machine-readable lines on its output.

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use vidmp3_core::{
    download_percent, ConversionJob, ConversionOutput, DownloadConfig, ProgressSink,
    ProgressStage, VidMp3Error, VidMp3Result, DEFAULT_TITLE,
};

use crate::traits::Downloader;
use crate::workdir::find_job_output;

const PROGRESS_MARKER: &str = "vidmp3-progress";
const TITLE_MARKER: &str = "vidmp3-title";

/// yt-dlp runtime configuration
#[derive(Debug, Clone)]
pub struct YtDlpConfig {
    /// Path to the yt-dlp executable
    pub ytdlp_path: PathBuf,
    /// Directory holding ffmpeg, if not on PATH
    pub ffmpeg_location: Option<PathBuf>,
    /// Format selector
    pub format: String,
    /// Target audio codec, also the output file extension
    pub audio_codec: String,
    /// Target bitrate in kbps
    pub audio_quality: String,
    /// Parallel fragment downloads
    pub concurrent_fragments: u32,
    /// Where job files are written
    pub work_dir: PathBuf,
    /// Cookie file, passed only if it exists at run time
    pub cookies_path: PathBuf,
    /// Upper bound for one run
    pub timeout: Duration,
}

impl Default for YtDlpConfig {
    fn default() -> Self {
        Self::from(&DownloadConfig::default())
    }
}

impl From<&DownloadConfig> for YtDlpConfig {
    fn from(config: &DownloadConfig) -> Self {
        Self {
            ytdlp_path: config.ytdlp_path.clone(),
            ffmpeg_location: config.ffmpeg_location.clone(),
            format: config.format.clone(),
            audio_codec: config.audio_codec.clone(),
            audio_quality: config.audio_quality.clone(),
            concurrent_fragments: config.concurrent_fragments,
            work_dir: config.work_dir(),
            cookies_path: config.cookies_path.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

/// A line of yt-dlp output, as far as the runtime cares
#[derive(Debug, Clone, PartialEq)]
pub enum ToolLine {
    /// Download progress or stage change
    Progress(ProgressStage),
    /// Title of the finished file
    Title(String),
    /// Anything else
    Other,
}

/// Classify one line of yt-dlp output
pub fn parse_line(line: &str) -> ToolLine {
    let line = line.trim();

    if let Some(title) = line.strip_prefix(TITLE_MARKER) {
        let title = title.trim();
        if title.is_empty() || title == "NA" {
            return ToolLine::Other;
        }
        return ToolLine::Title(title.to_string());
    }

    let Some(rest) = line.strip_prefix(PROGRESS_MARKER) else {
        return ToolLine::Other;
    };

    let mut fields = rest.split_whitespace();
    let status = fields.next().unwrap_or_default();
    let downloaded = fields.next().and_then(parse_bytes);
    let total = fields.next().and_then(parse_bytes);
    let estimate = fields.next().and_then(parse_bytes);

    match status {
        "downloading" => ToolLine::Progress(ProgressStage::Downloading {
            percent: download_percent(downloaded.unwrap_or(0), total.or(estimate)),
        }),
        "finished" => ToolLine::Progress(ProgressStage::Converting),
        _ => ToolLine::Other,
    }
}

/// yt-dlp prints `NA` for unknown sizes and floats for estimates
fn parse_bytes(field: &str) -> Option<u64> {
    field
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| v as u64)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

/// Runtime that converts links with yt-dlp and ffmpeg
pub struct YtDlpRuntime {
    config: YtDlpConfig,
}

impl YtDlpRuntime {
    /// Create a new yt-dlp runtime
    pub fn new(config: YtDlpConfig) -> Self {
        Self { config }
    }

    /// Directory the runtime writes job files to
    pub fn work_dir(&self) -> &std::path::Path {
        &self.config.work_dir
    }

    /// Build the argument list for a job
    fn build_args(&self, job: &ConversionJob) -> Vec<OsString> {
        let output = self
            .config
            .work_dir
            .join(format!("{}%(title)s.%(ext)s", job.file_prefix()));

        let quality = if self.config.audio_quality.chars().all(|c| c.is_ascii_digit()) {
            format!("{}K", self.config.audio_quality)
        } else {
            self.config.audio_quality.clone()
        };

        let mut args: Vec<OsString> = vec![
            "--format".into(),
            self.config.format.clone().into(),
            "--output".into(),
            output.into_os_string(),
            "--no-playlist".into(),
            "--concurrent-fragments".into(),
            self.config.concurrent_fragments.to_string().into(),
            "--no-cache-dir".into(),
            "--no-warnings".into(),
            // Quiet, but keep one machine-readable progress line per update
            "--quiet".into(),
            "--progress".into(),
            "--newline".into(),
            "--progress-template".into(),
            format!(
                "download:{} %(progress.status)s %(progress.downloaded_bytes)s \
                 %(progress.total_bytes)s %(progress.total_bytes_estimate)s",
                PROGRESS_MARKER
            )
            .into(),
            "--extract-audio".into(),
            "--audio-format".into(),
            self.config.audio_codec.clone().into(),
            "--audio-quality".into(),
            quality.into(),
            "--no-simulate".into(),
            "--print".into(),
            format!("after_move:{} %(title)s", TITLE_MARKER).into(),
        ];

        if self.config.cookies_path.exists() {
            args.push("--cookies".into());
            args.push(self.config.cookies_path.clone().into_os_string());
        }

        if let Some(ffmpeg) = &self.config.ffmpeg_location {
            args.push("--ffmpeg-location".into());
            args.push(ffmpeg.clone().into_os_string());
        }

        args.push("--".into());
        args.push(job.url.clone().into());
        args
    }

    /// Build the command to run a job
    fn build_command(&self, job: &ConversionJob) -> Command {
        let mut cmd = Command::new(&self.config.ytdlp_path);
        cmd.args(self.build_args(job));

        // Configure process I/O
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        cmd
    }

    /// Run yt-dlp to completion, returning the reported title
    async fn run(
        &self,
        job: &ConversionJob,
        progress: &dyn ProgressSink,
    ) -> VidMp3Result<Option<String>> {
        let mut child = self.build_command(job).spawn().map_err(|e| {
            error!(job_id = %job.id, error = %e, "Failed to spawn yt-dlp");
            VidMp3Error::Download(format!(
                "failed to start {}: {}",
                self.config.ytdlp_path.display(),
                e
            ))
        })?;

        debug!(job_id = %job.id, pid = child.id().unwrap_or(0), "yt-dlp spawned");

        let (tx, mut rx) = mpsc::unbounded_channel();
        if let Some(stdout) = child.stdout.take() {
            forward_lines(stdout, Stream::Stdout, tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            forward_lines(stderr, Stream::Stderr, tx);
        }

        let mut title = None;
        let mut last_error = None;

        let work = async {
            while let Some((stream, line)) = rx.recv().await {
                match parse_line(&line) {
                    ToolLine::Progress(stage) => progress.report(stage),
                    ToolLine::Title(t) => title = Some(t),
                    ToolLine::Other if stream == Stream::Stderr && !line.trim().is_empty() => {
                        debug!(job_id = %job.id, line = %line, "yt-dlp stderr");
                        last_error = Some(line);
                    }
                    ToolLine::Other => {}
                }
            }
            child.wait().await
        };

        let outcome = tokio::time::timeout(self.config.timeout, work).await;
        let status = match outcome {
            Ok(status) => status?,
            Err(_) => {
                warn!(job_id = %job.id, "yt-dlp timed out, killing it");
                let _ = child.start_kill();
                return Err(VidMp3Error::Timeout(format!(
                    "conversion took longer than {}s",
                    self.config.timeout.as_secs()
                )));
            }
        };

        if !status.success() {
            let reason = last_error
                .map(|l| l.trim().trim_start_matches("ERROR:").trim().to_string())
                .unwrap_or_else(|| format!("yt-dlp exited with {}", status));
            return Err(VidMp3Error::Download(reason));
        }

        Ok(title)
    }
}

/// Pump lines from a child pipe into the shared channel
fn forward_lines<R>(reader: R, stream: Stream, tx: mpsc::UnboundedSender<(Stream, String)>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tx.send((stream, line)).is_err() {
                break;
            }
        }
    });
}

#[async_trait]
impl Downloader for YtDlpRuntime {
    async fn fetch_audio(
        &self,
        job: &ConversionJob,
        progress: &dyn ProgressSink,
    ) -> VidMp3Result<ConversionOutput> {
        info!(job_id = %job.id, user_id = job.user_id, url = %job.url, "Starting conversion");

        let started = Instant::now();
        let title = self.run(job, progress).await?;
        let elapsed = started.elapsed();

        let path = find_job_output(
            &self.config.work_dir,
            &job.file_prefix(),
            &self.config.audio_codec,
        )
        .await
        .ok_or_else(|| VidMp3Error::Conversion("Failed to convert video to MP3".to_string()))?;

        let size_bytes = tokio::fs::metadata(&path).await?.len();

        info!(
            job_id = %job.id,
            elapsed_ms = elapsed.as_millis() as u64,
            size_bytes = size_bytes,
            "Conversion finished"
        );

        Ok(ConversionOutput {
            path,
            title: title.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            elapsed,
            size_bytes,
        })
    }

    fn name(&self) -> &'static str {
        "yt-dlp"
    }
}
