//! Error types for regmonitor.
//!
//! Library crates use [`MonitorError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all regmonitor operations.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error while fetching a source page or API endpoint.
    #[error("fetch error: {0}")]
    Fetch(String),

    /// Unrecoverable extraction failure (fetched body could not be processed).
    /// "No items found" is never an error; strategies return an empty list.
    #[error("extraction error: {message}")]
    Extraction { message: String },

    /// Content classifier call failed (timeout, provider error, bad response).
    /// Always recovered by the rule-based fallback before leaving the filter.
    #[error("classification error: {0}")]
    Classification(String),

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Impact-assessment notification error (best-effort, logged only).
    #[error("notification error: {0}")]
    Notification(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (unknown enum value, invalid URL, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// The running crawl job was cancelled externally.
    #[error("job cancelled")]
    Cancelled,
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, MonitorError>;

impl MonitorError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create an extraction error from any displayable message.
    pub fn extraction(msg: impl Into<String>) -> Self {
        Self::Extraction {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = MonitorError::config("missing classifier endpoint");
        assert_eq!(err.to_string(), "config error: missing classifier endpoint");

        let err = MonitorError::Fetch("https://example.gov: HTTP 503".into());
        assert!(err.to_string().contains("HTTP 503"));

        let err = MonitorError::validation("unknown source type 'blog'");
        assert!(err.to_string().contains("source type"));
    }
}
