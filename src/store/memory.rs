//! In-memory task store.
//!
//! [`InMemoryTaskStore`] keeps blobs in a `DashMap<owner, DashMap<task, blob>>`.
//! The outer map shards owners and each inner map shards one owner's tasks,
//! so listing an owner touches only that owner's records and writers to
//! different identities contend on a shard lock at worst.
//!
//! Contents are lost when the process exits. [`TaskService`](crate::service::TaskService)
//! uses this store for non-durable tasks.
//!
//! # Examples
//!
//! ```
//! use orion_tasks::store::{InMemoryTaskStore, TaskStore};
//! use orion_tasks::TaskIdentity;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let store = InMemoryTaskStore::new();
//! let id = TaskIdentity::new("test", "t-1");
//! store.write(&id, "{}").await.unwrap();
//! assert_eq!(store.read(&id).await.unwrap().as_deref(), Some("{}"));
//! # }
//! ```

use std::collections::BTreeSet;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::domain::TaskIdentity;
use crate::error::StorageError;
use crate::store::{validate_key_component, TaskStore};

/// Thread-safe in-memory [`TaskStore`] backed by nested [`DashMap`]s.
#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    owners: DashMap<String, DashMap<String, String>>,
}

impl InMemoryTaskStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of records stored across all owners.
    pub fn len(&self) -> usize {
        self.owners.iter().map(|owner| owner.value().len()).sum()
    }

    /// Returns `true` if no owner has any record.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn write(&self, identity: &TaskIdentity, record: &str) -> Result<(), StorageError> {
        validate_key_component(identity.owner_id())?;
        validate_key_component(identity.task_id())?;
        self.owners
            .entry(identity.owner_id().to_string())
            .or_default()
            .insert(identity.task_id().to_string(), record.to_string());
        tracing::debug!(
            owner_id = identity.owner_id(),
            task_id = identity.task_id(),
            "stored transient task"
        );
        Ok(())
    }

    async fn read(&self, identity: &TaskIdentity) -> Result<Option<String>, StorageError> {
        let Some(tasks) = self.owners.get(identity.owner_id()) else {
            return Ok(None);
        };
        let blob = tasks.get(identity.task_id()).map(|blob| blob.value().clone());
        Ok(blob)
    }

    async fn remove(&self, identity: &TaskIdentity) -> Result<bool, StorageError> {
        let removed = match self.owners.get(identity.owner_id()) {
            Some(tasks) => tasks.remove(identity.task_id()).is_some(),
            None => false,
        };
        if removed {
            // Writers insert under the shard lock, so a refilled owner stays.
            self.owners
                .remove_if(identity.owner_id(), |_, tasks| tasks.is_empty());
        }
        Ok(removed)
    }

    async fn list_for_owner(&self, owner_id: &str) -> Result<BTreeSet<String>, StorageError> {
        let Some(tasks) = self.owners.get(owner_id) else {
            return Ok(BTreeSet::new());
        };
        let ids = tasks.iter().map(|entry| entry.key().clone()).collect();
        Ok(ids)
    }

    async fn count_for_owner(&self, owner_id: &str) -> Result<usize, StorageError> {
        Ok(self.owners.get(owner_id).map_or(0, |tasks| tasks.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(owner: &str, task: &str) -> TaskIdentity {
        TaskIdentity::new(owner, task)
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let store = InMemoryTaskStore::new();
        store.write(&id("test", "1"), "blob").await.unwrap();
        assert_eq!(
            store.read(&id("test", "1")).await.unwrap().as_deref(),
            Some("blob")
        );
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn overwrite_replaces_blob() {
        let store = InMemoryTaskStore::new();
        store.write(&id("test", "1"), "old").await.unwrap();
        store.write(&id("test", "1"), "new").await.unwrap();
        assert_eq!(
            store.read(&id("test", "1")).await.unwrap().as_deref(),
            Some("new")
        );
        assert_eq!(store.count_for_owner("test").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn read_absent_returns_none() {
        let store = InMemoryTaskStore::new();
        assert!(store.read(&id("nobody", "nothing")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn remove_reports_existence() {
        let store = InMemoryTaskStore::new();
        store.write(&id("test", "1"), "blob").await.unwrap();
        assert!(store.remove(&id("test", "1")).await.unwrap());
        assert!(!store.remove(&id("test", "1")).await.unwrap());
        assert!(!store.remove(&id("ghost", "1")).await.unwrap());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn emptied_owner_is_dropped() {
        let store = InMemoryTaskStore::new();
        store.write(&id("alice", "1"), "a").await.unwrap();
        store.write(&id("alice", "2"), "a").await.unwrap();
        store.write(&id("bob", "1"), "b").await.unwrap();

        store.remove(&id("alice", "1")).await.unwrap();
        assert_eq!(store.owners.len(), 2);
        store.remove(&id("alice", "2")).await.unwrap();
        assert_eq!(store.owners.len(), 1);
        assert!(store.list_for_owner("alice").await.unwrap().is_empty());

        store.write(&id("alice", "3"), "a").await.unwrap();
        assert_eq!(store.count_for_owner("alice").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn listing_is_scoped_to_owner() {
        let store = InMemoryTaskStore::new();
        store.write(&id("alice", "1"), "a").await.unwrap();
        store.write(&id("alice", "2"), "a").await.unwrap();
        store.write(&id("bob", "1"), "b").await.unwrap();

        let alice = store.list_for_owner("alice").await.unwrap();
        assert_eq!(alice.into_iter().collect::<Vec<_>>(), vec!["1", "2"]);
        assert_eq!(store.count_for_owner("bob").await.unwrap(), 1);
        assert_eq!(store.count_for_owner("carol").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn invalid_identity_is_rejected() {
        let store = InMemoryTaskStore::new();
        let err = store.write(&id("", "1"), "blob").await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey { .. }));
    }
}
