//! Runtime trait definitions

use async_trait::async_trait;
use vidmp3_core::{ConversionJob, ConversionOutput, ProgressSink, VidMp3Result};

/// Downloads a link and converts it to an audio file
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Fetch the job's link and produce the converted audio file
    async fn fetch_audio(
        &self,
        job: &ConversionJob,
        progress: &dyn ProgressSink,
    ) -> VidMp3Result<ConversionOutput>;

    /// Get the runtime name
    fn name(&self) -> &'static str;
}
