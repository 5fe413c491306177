//! Error taxonomy for the synchronization core.
//!
//! Batch operations (`check`, the initial sync, cache warming) never return
//! these for a single document: per-document failures are collected into the
//! operation's report instead. A [`SyncError`] escaping the core means the
//! whole operation failed and the CLI exits non-zero.

use std::io;
use thiserror::Error;

use crate::fetcher::FetchError;

/// Result alias used throughout the core.
pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Debug, Error)]
pub enum SyncError {
    /// A remote read failed after all retries.
    #[error("network error: {0}")]
    Network(#[from] FetchError),

    /// A manifest did not satisfy the catalog schema.
    #[error("validation error: {0}")]
    Validation(String),

    /// A changelog message was rejected.
    #[error("invalid changelog message: {0}")]
    InvalidMessage(String),

    /// The operation named a document with no catalog entry or Live Document.
    #[error("document not found: {0}")]
    NotFound(String),

    /// `commit` (or a diff lookup) was attempted with no pending update.
    #[error("{0}")]
    State(String),

    /// Another invocation holds the data directory lock.
    #[error("data directory is locked by another docsync process: {0}")]
    Locked(String),

    /// Every catalog source was unusable.
    #[error("no usable catalog: remote failed ({remote}); bundled failed ({bundled})")]
    Config { remote: String, bundled: String },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SyncError {
    pub fn not_found(filename: impl Into<String>) -> Self {
        SyncError::NotFound(filename.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        SyncError::Validation(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_names_both_causes() {
        let err = SyncError::Config {
            remote: "HTTP error: 503".to_string(),
            bundled: "category 0: empty name".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("HTTP error: 503"));
        assert!(msg.contains("category 0: empty name"));
    }

    #[test]
    fn fetch_error_converts_to_network() {
        let err: SyncError = FetchError::HttpStatus(404).into();
        assert!(matches!(err, SyncError::Network(_)));
    }
}
