//! vidmp3-runtime: External process runtime
//!
//! This crate drives the tools that do the actual media work:
//! - yt-dlp, with ffmpeg audio extraction as its post-processor
//! - Cookie file provisioning for sites that need a login
//! - Cleanup of per-job files in the work directory

pub mod cookies;
pub mod traits;
pub mod workdir;
pub mod ytdlp;

pub use cookies::{setup_cookies, CookieSource};
pub use traits::Downloader;
pub use workdir::{cleanup_job_files, find_job_output};
pub use ytdlp::{YtDlpConfig, YtDlpRuntime};
