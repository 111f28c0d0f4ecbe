//! Error types for task tracking.
//!
//! Two layers mirror the two layers of the crate:
//!
//! - [`StorageError`] is what a [`TaskStore`](crate::store::TaskStore)
//!   returns. Stores are blob stores, so these errors know nothing about
//!   task semantics.
//! - [`TaskError`] is what [`TaskService`](crate::service::TaskService)
//!   returns. Storage errors pass through it unchanged.
//!
//! "Not found" on a read is not an error anywhere in this crate: reads
//! return `Option`. [`TaskError::NotFound`] is only produced when a caller
//! tries to *mutate* a task that does not exist.

use thiserror::Error;

use crate::domain::TaskIdentity;

/// Convenience alias used throughout the crate.
pub type Result<T, E = TaskError> = std::result::Result<T, E>;

/// Errors raised by a [`TaskStore`](crate::store::TaskStore) implementation.
///
/// # Examples
///
/// ```
/// use orion_tasks::StorageError;
///
/// let err = StorageError::CorruptRecord {
///     key: "test/42".to_string(),
///     reason: "invalid UTF-8".to_string(),
/// };
/// assert!(err.to_string().contains("test/42"));
/// ```
#[derive(Debug, Error)]
pub enum StorageError {
    /// The storage medium rejected a read, write or delete.
    #[error("I/O failure on {key}: {source}")]
    Io {
        /// The record key (`owner/task`) or owner directory involved.
        key: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Stored bytes exist but are not a readable record.
    #[error("corrupt record at {key}: {reason}")]
    CorruptRecord {
        /// The record key.
        key: String,
        /// What was wrong with the content.
        reason: String,
    },

    /// The identity cannot be mapped to a storage location.
    #[error("invalid key {key:?}: {reason}")]
    InvalidKey {
        /// The offending key component.
        key: String,
        /// Why it was rejected.
        reason: String,
    },
}

impl StorageError {
    pub(crate) fn io(key: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            key: key.into(),
            source,
        }
    }
}

/// Errors raised by [`TaskService`](crate::service::TaskService).
#[derive(Debug, Error)]
pub enum TaskError {
    /// Storage failure, surfaced unchanged.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A stored document exists but does not deserialize into a task record.
    #[error("corrupt task record {identity}: {source}")]
    CorruptRecord {
        /// The task whose document is corrupt.
        identity: TaskIdentity,
        /// The parse failure.
        #[source]
        source: serde_json::Error,
    },

    /// A task record could not be encoded for storage.
    #[error("failed to serialize task record {identity}: {source}")]
    Serialization {
        /// The task being written.
        identity: TaskIdentity,
        /// The encoding failure.
        #[source]
        source: serde_json::Error,
    },

    /// Attempted to mutate a task that does not exist.
    #[error("task not found: {identity}")]
    NotFound {
        /// The missing task.
        identity: TaskIdentity,
    },

    /// Attempted to mutate a task that already finished.
    #[error("cannot {operation} task {identity}: task is already done")]
    InvalidTransition {
        /// The terminal task.
        identity: TaskIdentity,
        /// The rejected operation (`update_progress`, `set_message`, `complete`).
        operation: &'static str,
    },
}

impl TaskError {
    /// Returns `true` for errors caused by the storage medium or by stored
    /// content, as opposed to caller mistakes.
    ///
    /// The REST layer maps fatal errors to 500 and the rest to 4xx.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Storage(_) | Self::CorruptRecord { .. } | Self::Serialization { .. }
        )
    }
}
