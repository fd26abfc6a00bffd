//! Error types for the sync layer.

use contactsync_storage::StorageError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur in sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A request was rejected before touching storage.
    #[error("validation error: {0}")]
    Validation(String),

    /// Contact not found, locally or on the remote service.
    #[error("contact not found: {0}")]
    NotFound(String),

    /// The remote service could not be reached.
    #[error("network error: {0}")]
    Network(String),

    /// The remote service answered with an error status.
    #[error("remote error ({status}): {message}")]
    Remote { status: u16, message: String },

    /// Local storage failure.
    #[error("storage error: {0}")]
    Storage(StorageError),
}

impl SyncError {
    /// True for failures of the remote service itself (unreachable, error
    /// status, unknown record), the class of errors a read recovers from by
    /// falling back to the local cache.
    pub fn is_remote_failure(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Remote { .. } | Self::NotFound(_)
        )
    }
}

impl From<StorageError> for SyncError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(id) => Self::NotFound(id),
            other => Self::Storage(other),
        }
    }
}
