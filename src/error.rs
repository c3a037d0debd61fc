//! Error types for the synchronization core.

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by pipeline stages, codecs, and the scanner.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("File not found: {path}")]
    NotFound { path: PathBuf },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed content in {path}: {reason}")]
    Format { path: PathBuf, reason: String },

    #[error("Translation backend failed: {reason}")]
    Backend { reason: String },

    /// Diagnostic only: a write lock was added but the anticipated
    /// follow-up write event never arrived.
    #[error("Stale write lock on {path}")]
    LockLeak { path: PathBuf },
}

impl SyncError {
    /// Wrap an `io::Error`, mapping missing files to `NotFound`.
    pub fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            SyncError::NotFound { path }
        } else {
            SyncError::Io { path, source }
        }
    }

    pub fn format(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        SyncError::Format {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
