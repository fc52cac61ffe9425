//! Cookie file provisioning

use std::path::Path;
use tracing::{info, warn};

/// Where the cookies handed to yt-dlp come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CookieSource {
    /// A cookie file was already present
    Existing,
    /// The file was written from the environment
    Created,
    /// No cookies are configured
    None,
}

/// Make sure the cookie file exists if cookies were configured
///
/// An existing file always wins. Otherwise `content` is written to `path`.
/// A failed write is logged and treated as "no cookies"; the bot still runs.
pub fn setup_cookies(path: &Path, content: Option<&str>) -> CookieSource {
    if path.exists() {
        info!(path = %path.display(), "Using existing cookie file");
        return CookieSource::Existing;
    }

    match content {
        Some(content) => match std::fs::write(path, content) {
            Ok(()) => {
                info!(path = %path.display(), "Created cookie file from YOUTUBE_COOKIES");
                CookieSource::Created
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to create cookie file");
                CookieSource::None
            }
        },
        None => {
            info!("No cookies configured (YOUTUBE_COOKIES not set)");
            CookieSource::None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_existing_file_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.txt");
        std::fs::write(&path, "old").unwrap();

        assert_eq!(setup_cookies(&path, Some("new")), CookieSource::Existing);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "old");
    }

    #[test]
    fn test_file_created_from_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.txt");

        assert_eq!(
            setup_cookies(&path, Some("# Netscape HTTP Cookie File")),
            CookieSource::Created
        );
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "# Netscape HTTP Cookie File"
        );
    }

    #[test]
    fn test_nothing_configured() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.txt");

        assert_eq!(setup_cookies(&path, None), CookieSource::None);
        assert!(!path.exists());
    }

    #[test]
    fn test_unwritable_path_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("cookies.txt");

        assert_eq!(setup_cookies(&path, Some("x")), CookieSource::None);
    }
}
