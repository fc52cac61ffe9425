//! Per-job files in the work directory

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Find the converted file `<prefix>*.<extension>` of a job
pub async fn find_job_output(dir: &Path, prefix: &str, extension: &str) -> Option<PathBuf> {
    let suffix = format!(".{}", extension);
    let mut entries = tokio::fs::read_dir(dir).await.ok()?;

    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(prefix) && name.ends_with(&suffix) {
            return Some(entry.path());
        }
    }

    None
}

/// Remove every file of a job, returning how many were deleted
///
/// Errors are logged and skipped so one stuck file does not keep the rest.
pub async fn cleanup_job_files(dir: &Path, prefix: &str) -> usize {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "Cannot scan work dir for cleanup");
            return 0;
        }
    };

    let mut removed = 0;
    while let Ok(Some(entry)) = entries.next_entry().await {
        if !entry.file_name().to_string_lossy().starts_with(prefix) {
            continue;
        }
        let path = entry.path();
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(path = %path.display(), "Removed job file");
                removed += 1;
            }
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove job file"),
        }
    }

    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"x").unwrap();
    }

    #[tokio::test]
    async fn test_find_job_output() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "job1_Song.webm");
        touch(dir.path(), "job1_Song.mp3");
        touch(dir.path(), "job2_Other.mp3");

        let found = find_job_output(dir.path(), "job1_", "mp3").await.unwrap();
        assert_eq!(found.file_name().unwrap(), "job1_Song.mp3");
        assert!(find_job_output(dir.path(), "job3_", "mp3").await.is_none());
    }

    #[tokio::test]
    async fn test_cleanup_only_touches_prefix() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "job1_Song.webm");
        touch(dir.path(), "job1_Song.mp3");
        touch(dir.path(), "job2_Other.mp3");

        assert_eq!(cleanup_job_files(dir.path(), "job1_").await, 2);
        assert!(!dir.path().join("job1_Song.mp3").exists());
        assert!(dir.path().join("job2_Other.mp3").exists());
    }

    #[tokio::test]
    async fn test_cleanup_missing_dir() {
        assert_eq!(
            cleanup_job_files(Path::new("/nonexistent/vidmp3"), "x_").await,
            0
        );
    }
}
