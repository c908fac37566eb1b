//! Unified error types for tome.
//!
//! Display strings carry a stable upper-case code prefix so callers and logs
//! can match on the failure class without parsing the message.

use std::path::PathBuf;

/// Unified error type for the cache and fetch layers.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The cache root directory is unusable.
    #[error("CACHE_DIR: {}: {reason}", path.display())]
    CacheDir { path: PathBuf, reason: String },

    /// Filesystem operation failed.
    #[error("CACHE_ERROR: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Network or transport failure.
    #[error("HTTP_ERROR: {0}")]
    HttpError(String),

    /// Non-success, non-redirect HTTP response.
    #[error("HTTP_STATUS: {status} for {url}")]
    HttpStatus { status: u16, url: String },

    /// 3xx response without a usable `Location` header.
    #[error("REDIRECT_INVALID: {0}")]
    InvalidRedirect(String),

    /// Redirect chain longer than the configured bound.
    #[error("TOO_MANY_REDIRECTS: {url} (max {max})")]
    TooManyRedirects { url: String, max: usize },

    /// Network access is disabled and no cached data is available.
    #[error("OFFLINE: {0}")]
    Offline(String),

    /// Response body could not be decoded.
    #[error("DECODE_FAILED: {0}")]
    Decode(String),

    /// Fetch timeout.
    #[error("FETCH_TIMEOUT: {0}")]
    FetchTimeout(String),
}

impl Error {
    /// Whether this error was raised because the network is disabled.
    pub fn is_offline(&self) -> bool {
        matches!(self, Error::Offline(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Offline("https://example.com/".to_string());
        assert!(err.to_string().contains("OFFLINE"));
        assert!(err.to_string().contains("example.com"));
        assert!(err.is_offline());
    }

    #[test]
    fn test_error_display_redirects() {
        let err = Error::TooManyRedirects { url: "https://example.com/loop".into(), max: 10 };
        assert_eq!(err.to_string(), "TOO_MANY_REDIRECTS: https://example.com/loop (max 10)");
        assert!(!err.is_offline());
    }

    #[test]
    fn test_error_from_io() {
        let err: Error = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().starts_with("CACHE_ERROR"));
    }

    #[test]
    fn test_cache_dir_display() {
        let err = Error::CacheDir { path: PathBuf::from("/nope"), reason: "not a directory".into() };
        assert_eq!(err.to_string(), "CACHE_DIR: /nope: not a directory");
    }
}
