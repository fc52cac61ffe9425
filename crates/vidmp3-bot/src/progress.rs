//! Progress board and status message animation

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;
use vidmp3_core::{animated_text, ProgressSink, ProgressStage};
use vidmp3_telegram::{ChatApi, ParseMode};

/// Current stage of every active job
///
/// A job is active exactly while it has an entry; its animator stops as soon
/// as the entry is removed.
pub struct ProgressBoard {
    stages: RwLock<HashMap<Uuid, ProgressStage>>,
    bar_width: usize,
}

impl ProgressBoard {
    /// Create an empty board
    pub fn new(bar_width: usize) -> Self {
        Self {
            stages: RwLock::new(HashMap::new()),
            bar_width,
        }
    }

    /// Start tracking a job
    pub fn register(&self, job_id: Uuid) {
        self.write().insert(job_id, ProgressStage::Starting);
    }

    /// Record a stage change; ignored once the job was removed
    pub fn update(&self, job_id: Uuid, stage: ProgressStage) {
        if let Some(current) = self.write().get_mut(&job_id) {
            *current = stage;
        }
    }

    /// Stop tracking a job
    pub fn remove(&self, job_id: Uuid) {
        self.write().remove(&job_id);
    }

    /// Status text of an active job
    pub fn text(&self, job_id: Uuid) -> Option<String> {
        self.read()
            .get(&job_id)
            .map(|stage| stage.render(self.bar_width))
    }

    /// Number of active jobs
    pub fn active(&self) -> usize {
        self.read().len()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<Uuid, ProgressStage>> {
        self.stages.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<Uuid, ProgressStage>> {
        self.stages.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// Progress sink that writes one job's stages to the board
pub struct JobProgress {
    board: Arc<ProgressBoard>,
    job_id: Uuid,
}

impl JobProgress {
    pub fn new(board: Arc<ProgressBoard>, job_id: Uuid) -> Self {
        Self { board, job_id }
    }
}

impl ProgressSink for JobProgress {
    fn report(&self, stage: ProgressStage) {
        self.board.update(self.job_id, stage);
    }
}

/// Keep a status message in sync with the board until the job leaves it
pub fn spawn_animator(
    api: Arc<dyn ChatApi>,
    board: Arc<ProgressBoard>,
    job_id: Uuid,
    chat_id: i64,
    message_id: i64,
    tick: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last = String::new();
        let mut frame = 0usize;
        let mut interval = tokio::time::interval(tick);

        loop {
            interval.tick().await;

            let Some(text) = board.text(job_id) else {
                break;
            };
            let text = animated_text(frame, &text);

            if text != last {
                if let Err(e) = api
                    .edit_message_text(chat_id, message_id, &text, Some(ParseMode::Markdown))
                    .await
                {
                    debug!(job_id = %job_id, error = %e, "Status edit failed");
                }
                last = text;
            }
            frame += 1;
        }

        debug!(job_id = %job_id, "Animator stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_board_lifecycle() {
        let board = ProgressBoard::new(10);
        let id = Uuid::new_v4();

        assert!(board.text(id).is_none());
        board.register(id);
        assert_eq!(board.text(id).as_deref(), Some("Starting..."));
        assert_eq!(board.active(), 1);

        board.update(id, ProgressStage::Converting);
        assert_eq!(board.text(id).as_deref(), Some("🔄 Converting to MP3..."));

        board.remove(id);
        assert!(board.text(id).is_none());
        assert_eq!(board.active(), 0);
    }

    #[test]
    fn test_update_after_removal_is_ignored() {
        let board = Arc::new(ProgressBoard::new(10));
        let id = Uuid::new_v4();
        let sink = JobProgress::new(board.clone(), id);

        sink.report(ProgressStage::Converting);
        assert!(board.text(id).is_none());

        board.register(id);
        sink.report(ProgressStage::Downloading { percent: 45.0 });
        assert_eq!(
            board.text(id).as_deref(),
            Some("📥 Downloading...\n[████░░░░░░] 45.0%")
        );
    }
}
