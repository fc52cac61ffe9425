//! Command and link handlers

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use vidmp3_core::{
    progress_bar, validate_link, BotConfig, ConversionJob, ProgressStage, VidMp3Error,
    VidMp3Result, INVALID_LINK_TEXT, WELCOME_TEXT,
};
use vidmp3_runtime::{cleanup_job_files, Downloader};
use vidmp3_telegram::{AudioUpload, ChatApi, Message, ParseMode};

use crate::progress::{spawn_animator, JobProgress, ProgressBoard};

/// Timing knobs for a conversion
#[derive(Debug, Clone)]
pub struct HandlerSettings {
    /// Interval between status edits
    pub tick: Duration,
    /// Pause after announcing the upload
    pub upload_pause: Duration,
    /// Cells in the progress bar
    pub bar_width: usize,
    /// Conversions allowed at once
    pub max_concurrent_jobs: usize,
    /// Where job files are written
    pub work_dir: PathBuf,
}

impl From<&BotConfig> for HandlerSettings {
    fn from(config: &BotConfig) -> Self {
        Self {
            tick: Duration::from_millis(config.progress.tick_millis),
            upload_pause: Duration::from_millis(config.progress.upload_pause_millis),
            bar_width: config.progress.bar_width,
            max_concurrent_jobs: config.bot.max_concurrent_jobs,
            work_dir: config.download.work_dir(),
        }
    }
}

/// Handlers shared by every update task
pub struct Handlers {
    api: Arc<dyn ChatApi>,
    downloader: Arc<dyn Downloader>,
    board: Arc<ProgressBoard>,
    jobs: Semaphore,
    settings: HandlerSettings,
}

impl Handlers {
    pub fn new(
        api: Arc<dyn ChatApi>,
        downloader: Arc<dyn Downloader>,
        settings: HandlerSettings,
    ) -> Self {
        Self {
            api,
            downloader,
            board: Arc::new(ProgressBoard::new(settings.bar_width)),
            jobs: Semaphore::new(settings.max_concurrent_jobs),
            settings,
        }
    }

    /// Jobs currently converting or uploading
    pub fn active_jobs(&self) -> usize {
        self.board.active()
    }

    /// `/start`
    pub async fn start(&self, message: &Message) -> VidMp3Result<()> {
        self.api
            .send_message(message.chat.id, WELCOME_TEXT, Some(ParseMode::Markdown))
            .await?;
        Ok(())
    }

    /// Plain text: convert the link and send back the audio
    ///
    /// Failures of the conversion itself are reported to the user in the
    /// status message; only failures to talk to the chat are returned.
    pub async fn handle_link(&self, message: &Message) -> VidMp3Result<()> {
        let chat_id = message.chat.id;
        let Some(text) = message.text.as_deref() else {
            return Ok(());
        };

        let url = match validate_link(text) {
            Ok(url) => url,
            Err(e) => {
                debug!(chat_id = chat_id, error = %e, "Rejected message");
                self.api.send_message(chat_id, INVALID_LINK_TEXT, None).await?;
                return Ok(());
            }
        };

        let job = ConversionJob::new(message.sender_id(), chat_id, url);
        let status = self
            .api
            .send_message(
                chat_id,
                &format!("📡 Connecting...\n{}", progress_bar(0.0, self.settings.bar_width)),
                None,
            )
            .await?;

        let _permit = self
            .jobs
            .acquire()
            .await
            .map_err(|e| VidMp3Error::Internal(e.to_string()))?;

        info!(job_id = %job.id, user_id = job.user_id, "Job accepted");

        self.board.register(job.id);
        let animator = spawn_animator(
            self.api.clone(),
            self.board.clone(),
            job.id,
            chat_id,
            status.message_id,
            self.settings.tick,
        );

        let result = self.convert_and_upload(&job).await;

        self.board.remove(job.id);
        animator.abort();
        if let Err(e) = animator.await {
            if e.is_panic() {
                error!(job_id = %job.id, error = %e, "Status animator panicked");
            }
        }

        match result {
            Ok(()) => {
                if let Err(e) = self.api.delete_message(chat_id, status.message_id).await {
                    debug!(job_id = %job.id, error = %e, "Failed to delete status message");
                }
            }
            Err(e) => {
                error!(job_id = %job.id, error = %e, "Job failed");
                if let Err(edit_err) = self
                    .api
                    .edit_message_text(chat_id, status.message_id, &format!("❌ Error: {}", e), None)
                    .await
                {
                    warn!(job_id = %job.id, error = %edit_err, "Failed to report job error");
                }
            }
        }

        let removed = cleanup_job_files(&self.settings.work_dir, &job.file_prefix()).await;
        debug!(job_id = %job.id, removed = removed, "Cleaned up job files");

        Ok(())
    }

    async fn convert_and_upload(&self, job: &ConversionJob) -> VidMp3Result<()> {
        let progress = JobProgress::new(self.board.clone(), job.id);
        let output = self.downloader.fetch_audio(job, &progress).await?;

        self.board.update(job.id, ProgressStage::Uploading);
        tokio::time::sleep(self.settings.upload_pause).await;

        let upload = AudioUpload {
            path: output.path.clone(),
            title: output.title.clone(),
            caption: output.caption(),
            parse_mode: Some(ParseMode::Markdown),
        };
        self.api.send_audio(job.chat_id, &upload).await?;

        info!(
            job_id = %job.id,
            title = %output.title,
            elapsed_secs = output.elapsed_secs(),
            "Audio delivered"
        );
        Ok(())
    }
}
