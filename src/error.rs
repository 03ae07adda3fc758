//! Crate-wide error type and result alias.
//!
//! Only genuinely fatal conditions live here. Unreadable cache or sidecar
//! JSON is deliberately absent: those files are treated as missing and
//! rebuilt, never surfaced as errors.

use std::path::PathBuf;

/// Common error type for damson.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The remote metadata provider failed after exhausting its retry budget.
    #[error("remote metadata provider unavailable: {0}")]
    RemoteUnavailable(String),

    /// A local file path matched none of the configured media sources.
    /// Indicates a configuration defect, not a user mistake.
    #[error("no configured source contains {}", .0.display())]
    UnknownSource(PathBuf),

    /// An artwork download failed. Aborts the surrounding reconciliation;
    /// nothing is partially persisted.
    #[error("failed to download {url}: {reason}")]
    Download { url: String, reason: String },

    /// A catalog lookup came back empty.
    #[error("movie not found: {0}")]
    MovieNotFound(i64),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a new Config error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new Download error.
    pub fn download<U: Into<String>, R: Into<String>>(url: U, reason: R) -> Self {
        Self::Download {
            url: url.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
