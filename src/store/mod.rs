//! Task store trait and implementations.
//!
//! # Architecture
//!
//! The task tracking system has two layers:
//!
//! 1. **[`TaskService`](crate::service::TaskService)**: all domain logic
//!    (id allocation, the lifecycle state machine, per-identity
//!    read-modify-write, serialization).
//!
//! 2. **[`TaskStore`]**: a dumb blob store addressed by
//!    [`TaskIdentity`]. It never looks inside a record.
//!
//! # Implementations
//!
//! - [`FileTaskStore`](file::FileTaskStore): durable. One file per task
//!   under a per-owner directory, published with write-then-rename.
//! - [`InMemoryTaskStore`](memory::InMemoryTaskStore): transient. A sharded
//!   `DashMap`; holds non-durable tasks.

pub mod file;
pub mod memory;

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::domain::TaskIdentity;
use crate::error::StorageError;

pub use file::FileTaskStore;
pub use memory::InMemoryTaskStore;

/// Blob persistence addressed by [`TaskIdentity`].
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; a single store is shared by every
/// worker and poller. Operations on different identities must not block one
/// another, and there is no store-wide lock.
///
/// # Atomicity
///
/// A [`read`](TaskStore::read) concurrent with or following a
/// [`write`](TaskStore::write) of the same identity sees either the old blob
/// or the new blob in full, never a mix. A failed write leaves the old blob
/// in place.
///
/// # No Domain Logic
///
/// Stores must never parse, validate or merge records. Lifecycle rules
/// belong to `TaskService`.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Stores `record` under `identity`, replacing any previous blob.
    ///
    /// # Errors
    ///
    /// - [`StorageError::Io`] if the medium rejects the write.
    /// - [`StorageError::InvalidKey`] if the identity cannot be stored.
    async fn write(&self, identity: &TaskIdentity, record: &str) -> Result<(), StorageError>;

    /// Returns the blob stored under `identity`, or `None` if there is none.
    ///
    /// # Errors
    ///
    /// - [`StorageError::CorruptRecord`] if stored bytes exist but are not a
    ///   readable blob.
    /// - [`StorageError::Io`] on read failures other than absence.
    async fn read(&self, identity: &TaskIdentity) -> Result<Option<String>, StorageError>;

    /// Deletes the blob under `identity`.
    ///
    /// Returns `true` if a blob existed and `false` if there was nothing to
    /// delete.
    ///
    /// # Errors
    ///
    /// - [`StorageError::Io`] on delete failures other than absence.
    async fn remove(&self, identity: &TaskIdentity) -> Result<bool, StorageError>;

    /// Returns the ids of every task currently stored for `owner_id`.
    ///
    /// Reflects every removal that completed before the call.
    ///
    /// # Errors
    ///
    /// - [`StorageError::Io`] if the owner's namespace cannot be enumerated.
    async fn list_for_owner(&self, owner_id: &str) -> Result<BTreeSet<String>, StorageError>;

    /// Returns the number of tasks currently stored for `owner_id`.
    async fn count_for_owner(&self, owner_id: &str) -> Result<usize, StorageError> {
        Ok(self.list_for_owner(owner_id).await?.len())
    }
}

/// Rejects identity components that cannot name a storage location.
///
/// Empty strings, `.` and `..` would address the owner directory, the root
/// or its parent rather than a record.
///
/// # Examples
///
/// ```
/// use orion_tasks::store::validate_key_component;
///
/// assert!(validate_key_component("test").is_ok());
/// assert!(validate_key_component("..").is_err());
/// assert!(validate_key_component("").is_err());
/// ```
pub fn validate_key_component(component: &str) -> Result<(), StorageError> {
    let reason = match component {
        "" => "must not be empty",
        "." | ".." => "must not be a relative path component",
        _ => return Ok(()),
    };
    Err(StorageError::InvalidKey {
        key: component.to_string(),
        reason: reason.to_string(),
    })
}
