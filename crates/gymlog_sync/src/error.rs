//! Error types for syncing.

use gymlog_replica::ReplicaError;
use std::time::Duration;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can end an upload, a pull or a whole cycle.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The server's version moved past the one the change was made against.
    #[error("version conflict")]
    VersionConflict,

    /// Another client holds the server's write lock.
    #[error("server write lock busy")]
    WriteLockBusy {
        /// Delay the server asked for, if it gave one.
        retry_after: Option<Duration>,
    },

    /// The credentials were refused or could not be refreshed.
    #[error("not authenticated")]
    Unauthenticated,

    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// The server answered with an unexpected status.
    #[error("server returned {status}: {message}")]
    ServerError {
        /// HTTP status.
        status: u16,
        /// Response body, possibly truncated.
        message: String,
    },

    /// A body could not be encoded or decoded.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Uploads kept hitting version conflicts.
    #[error("gave up after {attempts} version conflicts in a row")]
    ConflictRetriesExhausted {
        /// Conflicts seen before giving up.
        attempts: u32,
    },

    /// The local replica failed.
    #[error("replica error: {0}")]
    Replica(#[from] ReplicaError),

    /// A replica call panicked or was cancelled on the blocking pool.
    #[error("storage task failed: {0}")]
    StorageTask(String),
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if a later cycle may succeed without user action.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::WriteLockBusy { .. } | SyncError::ConflictRetriesExhausted { .. } => true,
            SyncError::ServerError { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns true if the user has to log in again.
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, SyncError::Unauthenticated)
    }

    /// Delay requested by the server before the next attempt.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            SyncError::WriteLockBusy { retry_after } => *retry_after,
            _ => None,
        }
    }
}
