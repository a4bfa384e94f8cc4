//! Error types for session storage.
//!
//! All storage errors are propagated via [`StoreError`], which wraps the
//! underlying I/O and JSON errors with the path or session they concern.

use std::path::PathBuf;

use tempo_types::{ReplayError, SessionId};

/// Errors that can occur in the storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A filesystem operation failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// The file or directory involved.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },

    /// A serialization or deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored event line could not be decoded.
    #[error("corrupt event log {path} at line {line}: {reason}")]
    Corrupt {
        /// The event log.
        path: PathBuf,
        /// 1-based line number.
        line: usize,
        /// Decoder message.
        reason: String,
    },

    /// An appended record was not the next in its session's log.
    #[error("session {session_id}: expected seq {expected}, got {found}")]
    Conflict {
        /// The session.
        session_id: SessionId,
        /// The next contiguous sequence number.
        expected: u64,
        /// The sequence number offered.
        found: u64,
    },

    /// Nothing is stored for the session.
    #[error("session {0} not found in store")]
    NotFound(SessionId),

    /// The stored records do not fold into a valid state.
    #[error("replay failed: {0}")]
    Replay(#[from] ReplayError),
}

impl StoreError {
    /// Wrap an I/O error with the path it concerns.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
