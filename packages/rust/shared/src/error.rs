//! Error types for gamma-events.
//!
//! Library crates use [`EventsError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all gamma-events operations.
#[derive(Debug, thiserror::Error)]
pub enum EventsError {
    /// Transport failure or non-success status retrieving the manifest.
    #[error("manifest fetch error: {url}: {message}")]
    ManifestFetch { url: String, message: String },

    /// The manifest body is not the expected year-indexed structure.
    #[error("manifest parse error: {message}")]
    ManifestParse { message: String },

    /// A companion content document could not be retrieved.
    #[error("content fetch error for {filename}: {message}")]
    ContentFetch { filename: String, message: String },

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// HTTP client construction error.
    #[error("network error: {0}")]
    Network(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, EventsError>;

impl EventsError {
    /// Create a manifest fetch error for the given URL.
    pub fn manifest_fetch(url: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::ManifestFetch {
            url: url.into(),
            message: msg.into(),
        }
    }

    /// Create a manifest parse error from any displayable message.
    pub fn manifest_parse(msg: impl Into<String>) -> Self {
        Self::ManifestParse {
            message: msg.into(),
        }
    }

    /// Create a content fetch error for the given filename.
    pub fn content_fetch(filename: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::ContentFetch {
            filename: filename.into(),
            message: msg.into(),
        }
    }

    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
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
        let err = EventsError::manifest_fetch("https://example.com/events.json", "HTTP 500");
        assert_eq!(
            err.to_string(),
            "manifest fetch error: https://example.com/events.json: HTTP 500"
        );

        let err = EventsError::content_fetch("b.md", "HTTP 404 Not Found");
        assert!(err.to_string().contains("b.md"));
        assert!(err.to_string().contains("404"));
    }
}
