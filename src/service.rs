//! Task service: the façade over id allocation, lifecycle rules and storage.
//!
//! [`TaskService`] implements every domain operation on top of two
//! [`TaskStore`]s. Durable records live in the durable store (normally a
//! [`FileTaskStore`]); non-durable records live in the transient store
//! (an [`InMemoryTaskStore`] unless replaced).
//!
//! Stores remain dumb blob stores; all intelligence lives here.
//!
//! # Construction
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use orion_tasks::store::FileTaskStore;
//! use orion_tasks::{StoreConfig, TaskService};
//!
//! # async fn run() -> orion_tasks::Result<()> {
//! // From configuration:
//! let service = TaskService::open(StoreConfig::load().unwrap_or_default()).await?;
//!
//! // Or with an explicit durable store:
//! let store = FileTaskStore::open(StoreConfig::default()).await?;
//! let service = TaskService::new(Arc::new(store));
//! # Ok(())
//! # }
//! ```
//!
//! # Read-Modify-Write
//!
//! Every mutation loads the record, applies a [`TaskRecord`] transition and
//! writes the result back while holding an async mutex owned by that
//! identity alone. Mutations of different identities never wait on each
//! other and readers never take the mutex.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::domain::{TaskIdentity, TaskRecord, TaskResult};
use crate::error::{Result, StorageError, TaskError};
use crate::id::TaskIdGenerator;
use crate::store::{FileTaskStore, InMemoryTaskStore, TaskStore};

/// Creates, mutates, queries and removes tasks.
///
/// `TaskService` is `Send + Sync`; share one instance (typically in an
/// `Arc`) between the REST handlers and the workers.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use orion_tasks::store::InMemoryTaskStore;
/// use orion_tasks::{Severity, TaskResult, TaskService};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> orion_tasks::Result<()> {
/// let service = TaskService::new(Arc::new(InMemoryTaskStore::new()));
///
/// let task = service.create_task("Indexing", "test", true).await?;
/// service.update_progress(&task.identity(), 50, None).await?;
/// service.complete(&task.identity(), TaskResult::ok()).await?;
///
/// let done = service.get_task(&task.identity()).await?.unwrap();
/// assert!(!done.running);
/// assert_eq!(done.result.map(|r| r.severity), Some(Severity::Ok));
/// # Ok(())
/// # }
/// ```
pub struct TaskService {
    durable: Arc<dyn TaskStore>,
    transient: Arc<dyn TaskStore>,
    ids: TaskIdGenerator,
    locks: DashMap<TaskIdentity, Arc<Mutex<()>>>,
}

impl fmt::Debug for TaskService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskService")
            .field("ids", &self.ids)
            .field("locked_identities", &self.locks.len())
            .finish_non_exhaustive()
    }
}

impl TaskService {
    /// Creates a service persisting durable tasks to `durable`.
    ///
    /// Non-durable tasks go to a fresh [`InMemoryTaskStore`].
    pub fn new(durable: Arc<dyn TaskStore>) -> Self {
        Self {
            durable,
            transient: Arc::new(InMemoryTaskStore::new()),
            ids: TaskIdGenerator::new(),
            locks: DashMap::new(),
        }
    }

    /// Opens a [`FileTaskStore`] at the configured root and builds a service
    /// on it.
    ///
    /// # Errors
    ///
    /// [`TaskError::Storage`] if the root directory cannot be created.
    pub async fn open(config: StoreConfig) -> Result<Self> {
        let store = FileTaskStore::open(config).await?;
        Ok(Self::new(Arc::new(store)))
    }

    /// Replaces the store holding non-durable tasks.
    pub fn with_transient_store(mut self, store: Arc<dyn TaskStore>) -> Self {
        self.transient = store;
        self
    }

    /// Replaces the id generator.
    pub fn with_id_generator(mut self, ids: TaskIdGenerator) -> Self {
        self.ids = ids;
        self
    }

    // ---- Helpers (private) ----

    fn store_for(&self, durable: bool) -> &dyn TaskStore {
        if durable {
            self.durable.as_ref()
        } else {
            self.transient.as_ref()
        }
    }

    fn lock_for(&self, identity: &TaskIdentity) -> Arc<Mutex<()>> {
        // Clone out of the shard guard so it is released before awaiting.
        self.locks
            .entry(identity.clone())
            .or_default()
            .value()
            .clone()
    }

    fn release_lock(&self, identity: &TaskIdentity, lock: &Arc<Mutex<()>>) {
        // A newer mutex for the same identity belongs to someone else.
        self.locks
            .remove_if(identity, |_, current| Arc::ptr_eq(current, lock));
    }

    fn decode(identity: &TaskIdentity, json: &str) -> Result<TaskRecord> {
        TaskRecord::from_json(json).map_err(|source| {
            warn!(
                owner_id = identity.owner_id(),
                task_id = identity.task_id(),
                error = %source,
                "stored task record does not parse"
            );
            TaskError::CorruptRecord {
                identity: identity.clone(),
                source,
            }
        })
    }

    async fn load(&self, identity: &TaskIdentity) -> Result<Option<TaskRecord>> {
        let json = match self.transient.read(identity).await? {
            Some(json) => Some(json),
            None => self.durable.read(identity).await?,
        };
        json.map(|json| Self::decode(identity, &json)).transpose()
    }

    async fn persist(&self, record: &TaskRecord) -> Result<()> {
        let json = record
            .to_json()
            .map_err(|source| TaskError::Serialization {
                identity: record.identity(),
                source,
            })?;
        self.store_for(record.durable)
            .write(&record.identity(), &json)
            .await?;
        Ok(())
    }

    /// Runs `apply` on the stored record under the identity's mutex and
    /// persists the result.
    async fn mutate<F>(&self, identity: &TaskIdentity, apply: F) -> Result<TaskRecord>
    where
        F: FnOnce(&mut TaskRecord) -> Result<()>,
    {
        let lock = self.lock_for(identity);
        let outcome = {
            let _guard = lock.lock().await;
            self.mutate_locked(identity, apply).await
        };

        // Finished and missing tasks accept no further mutation.
        let finished = match &outcome {
            Ok(record) => record.is_done(),
            Err(err) => matches!(
                err,
                TaskError::NotFound { .. } | TaskError::InvalidTransition { .. }
            ),
        };
        if finished {
            self.release_lock(identity, &lock);
        }
        outcome
    }

    async fn mutate_locked<F>(&self, identity: &TaskIdentity, apply: F) -> Result<TaskRecord>
    where
        F: FnOnce(&mut TaskRecord) -> Result<()>,
    {
        let Some(mut record) = self.load(identity).await? else {
            warn!(
                owner_id = identity.owner_id(),
                task_id = identity.task_id(),
                "mutation of unknown task"
            );
            return Err(TaskError::NotFound {
                identity: identity.clone(),
            });
        };
        apply(&mut record)?;
        self.persist(&record).await?;
        Ok(record)
    }

    // ---- Domain operations (public) ----

    /// Creates a running task at 0% and persists it before returning.
    ///
    /// `durable` picks the store: durable tasks survive a restart, the rest
    /// are kept in memory.
    ///
    /// # Errors
    ///
    /// [`TaskError::Storage`] if the record cannot be written, including
    /// [`StorageError::InvalidKey`](crate::StorageError::InvalidKey) for an
    /// unusable `owner_id`.
    pub async fn create_task(
        &self,
        name: impl Into<String>,
        owner_id: impl Into<String>,
        durable: bool,
    ) -> Result<TaskRecord> {
        let identity = TaskIdentity::new(owner_id, self.ids.next());
        let record = TaskRecord::new(identity, name, durable);
        self.persist(&record).await?;
        info!(
            owner_id = %record.owner_id,
            task_id = %record.task_id,
            name = %record.name,
            durable,
            "task created"
        );
        Ok(record)
    }

    /// Records progress on a running task and returns the updated record.
    ///
    /// `percent` is clamped to `0..=100` and never lowers the stored value.
    /// `message`, when given, replaces the current message.
    ///
    /// # Errors
    ///
    /// - [`TaskError::NotFound`] if no such task exists.
    /// - [`TaskError::InvalidTransition`] if the task is done.
    pub async fn update_progress(
        &self,
        identity: &TaskIdentity,
        percent: i32,
        message: Option<String>,
    ) -> Result<TaskRecord> {
        let record = self
            .mutate(identity, |record| record.update_progress(percent, message))
            .await?;
        debug!(
            owner_id = identity.owner_id(),
            task_id = identity.task_id(),
            percent = record.percent_complete,
            "task progress updated"
        );
        Ok(record)
    }

    /// Replaces the progress message of a running task.
    ///
    /// # Errors
    ///
    /// Same as [`update_progress`](Self::update_progress).
    pub async fn set_message(
        &self,
        identity: &TaskIdentity,
        message: impl Into<String>,
    ) -> Result<TaskRecord> {
        let message = message.into();
        self.mutate(identity, |record| record.set_message(message))
            .await
    }

    /// Finishes a task with `result`.
    ///
    /// # Errors
    ///
    /// - [`TaskError::NotFound`] if no such task exists.
    /// - [`TaskError::InvalidTransition`] if the task is already done; the
    ///   stored result is kept.
    pub async fn complete(&self, identity: &TaskIdentity, result: TaskResult) -> Result<TaskRecord> {
        let record = self
            .mutate(identity, |record| record.complete(result))
            .await?;
        info!(
            owner_id = identity.owner_id(),
            task_id = identity.task_id(),
            severity = ?record.result.as_ref().map(|r| r.severity),
            "task completed"
        );
        Ok(record)
    }

    /// Returns the current record, or `None` if the task does not exist.
    ///
    /// # Errors
    ///
    /// - [`TaskError::CorruptRecord`] if the stored document does not parse.
    /// - [`TaskError::Storage`] on storage failures.
    pub async fn get_task(&self, identity: &TaskIdentity) -> Result<Option<TaskRecord>> {
        self.load(identity).await
    }

    /// Deletes a task from both stores.
    ///
    /// Returns `true` if either store held it. Removing an absent task is
    /// not an error.
    pub async fn remove_task(&self, identity: &TaskIdentity) -> Result<bool> {
        let lock = self.lock_for(identity);
        let removed = {
            let _guard = lock.lock().await;
            self.remove_locked(identity).await
        };
        self.release_lock(identity, &lock);

        let removed = removed?;
        if removed {
            info!(
                owner_id = identity.owner_id(),
                task_id = identity.task_id(),
                "task removed"
            );
        }
        Ok(removed)
    }

    async fn remove_locked(&self, identity: &TaskIdentity) -> Result<bool> {
        let transient = self.transient.remove(identity).await?;
        let durable = self.durable.remove(identity).await?;
        Ok(transient || durable)
    }

    /// Returns the ids of every task of `owner_id` in either store.
    pub async fn list_for_owner(&self, owner_id: &str) -> Result<BTreeSet<String>> {
        let mut ids = self.durable.list_for_owner(owner_id).await?;
        ids.extend(self.transient.list_for_owner(owner_id).await?);
        Ok(ids)
    }

    /// Returns the number of tasks of `owner_id`.
    pub async fn count_for_owner(&self, owner_id: &str) -> Result<usize> {
        Ok(self.list_for_owner(owner_id).await?.len())
    }

    /// Returns every task of `owner_id`, oldest first.
    ///
    /// Tasks removed while the listing runs are skipped.
    ///
    /// # Errors
    ///
    /// [`TaskError::CorruptRecord`] if any of the owner's records does not
    /// parse.
    pub async fn list_tasks(&self, owner_id: &str) -> Result<Vec<TaskRecord>> {
        let mut records = Vec::new();
        for task_id in self.list_for_owner(owner_id).await? {
            let identity = TaskIdentity::new(owner_id, task_id);
            if let Some(record) = self.load(&identity).await? {
                records.push(record);
            }
        }
        records.sort_by(|a, b| {
            a.created
                .cmp(&b.created)
                .then_with(|| a.task_id.cmp(&b.task_id))
        });
        Ok(records)
    }

    /// Removes every finished task of `owner_id` and returns how many were
    /// removed. Running tasks are left alone.
    ///
    /// Records that cannot be read back are skipped with a warning and stay
    /// in place for [`remove_task`](Self::remove_task).
    ///
    /// # Errors
    ///
    /// [`TaskError::Storage`] on storage failures. Tasks removed before the
    /// failure stay removed.
    pub async fn remove_completed(&self, owner_id: &str) -> Result<usize> {
        let mut removed = 0;
        for task_id in self.list_for_owner(owner_id).await? {
            let identity = TaskIdentity::new(owner_id, task_id);
            if self.remove_if_done(&identity).await? {
                removed += 1;
            }
        }
        info!(owner_id, removed, "removed completed tasks");
        Ok(removed)
    }

    async fn remove_if_done(&self, identity: &TaskIdentity) -> Result<bool> {
        let lock = self.lock_for(identity);
        let removed = {
            let _guard = lock.lock().await;
            match self.load(identity).await {
                Ok(Some(record)) if record.is_done() => self.remove_locked(identity).await?,
                Ok(_) => false,
                Err(
                    err @ (TaskError::CorruptRecord { .. }
                    | TaskError::Storage(StorageError::CorruptRecord { .. })),
                ) => {
                    warn!(
                        owner_id = identity.owner_id(),
                        task_id = identity.task_id(),
                        error = %err,
                        "skipping unreadable task in completed sweep"
                    );
                    false
                },
                Err(err) => return Err(err),
            }
        };
        if removed {
            self.release_lock(identity, &lock);
        }
        Ok(removed)
    }
}
