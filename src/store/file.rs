//! Durable, file-backed task store.
//!
//! # Layout
//!
//! ```text
//! {root}/
//!   {owner}/                      one directory per owner
//!     {task}.json                 one published record per task
//!     .{uuid}.tmp                 in-flight write, never listed
//! ```
//!
//! Owner and task ids are percent-encoded (`urlencoding`) so any string maps
//! to a single path component. Listing and deleting only ever touch one
//! owner's directory.
//!
//! # Crash safety
//!
//! A write goes to a uniquely named temporary file in the owner directory,
//! is flushed (and `fsync`ed when [`StoreConfig::sync_writes`] is set), and
//! is then renamed over the record path. Rename within a directory is
//! atomic, so readers see the old record or the new one and never a prefix
//! of either. A failed write deletes its temporary file and leaves the
//! published record untouched.
//!
//! Owner directories are created on demand and never deleted, so a write
//! cannot lose its parent directory to a concurrent removal. Temporary files
//! orphaned by a crash are swept when the store is opened.
//!
//! Identities that fail [`validate_key_component`] are rejected by `write`
//! and are simply absent for `read`, `remove` and `list_for_owner`.

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::config::StoreConfig;
use crate::domain::TaskIdentity;
use crate::error::StorageError;
use crate::store::{validate_key_component, TaskStore};

const RECORD_SUFFIX: &str = ".json";
const TEMP_SUFFIX: &str = ".tmp";

/// Temporary files older than this are leftovers of an interrupted write.
const STALE_TEMP_AGE: Duration = Duration::from_secs(60 * 60);

/// [`TaskStore`] that keeps one JSON file per task on the local filesystem.
///
/// # Examples
///
/// ```no_run
/// use orion_tasks::store::{FileTaskStore, TaskStore};
/// use orion_tasks::{StoreConfig, TaskIdentity};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = FileTaskStore::open(StoreConfig::default().with_root_dir("/var/lib/orion/tasks")).await?;
/// store.write(&TaskIdentity::new("test", "t-1"), "{}").await?;
/// assert_eq!(store.count_for_owner("test").await?, 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct FileTaskStore {
    root: PathBuf,
    sync_writes: bool,
}

impl FileTaskStore {
    /// Creates a store for `config` without touching the filesystem.
    ///
    /// Directories are created lazily by the first write.
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            root: config.root_dir.clone(),
            sync_writes: config.sync_writes,
        }
    }

    /// Creates a store for `config`, creating the root directory if needed.
    ///
    /// Temporary files abandoned by a crash more than an hour ago are
    /// deleted.
    ///
    /// # Errors
    ///
    /// [`StorageError::Io`] if the root directory cannot be created or read.
    pub async fn open(config: StoreConfig) -> Result<Self, StorageError> {
        let store = Self::new(&config);
        fs::create_dir_all(&store.root)
            .await
            .map_err(|e| StorageError::io(store.root.display().to_string(), e))?;
        let swept = store.sweep_stale_temps(STALE_TEMP_AGE).await?;
        tracing::info!(
            root = %store.root.display(),
            sync_writes = store.sync_writes,
            swept,
            "opened task store"
        );
        Ok(store)
    }

    /// Deletes temporary files older than `max_age` from every owner
    /// directory and returns how many were deleted.
    async fn sweep_stale_temps(&self, max_age: Duration) -> Result<usize, StorageError> {
        let root_key = || self.root.display().to_string();
        let mut owners = fs::read_dir(&self.root)
            .await
            .map_err(|e| StorageError::io(root_key(), e))?;

        let mut swept = 0;
        while let Some(owner) = owners
            .next_entry()
            .await
            .map_err(|e| StorageError::io(root_key(), e))?
        {
            if !owner.file_type().await.is_ok_and(|t| t.is_dir()) {
                continue;
            }
            let Ok(mut entries) = fs::read_dir(owner.path()).await else {
                continue;
            };
            while let Ok(Some(entry)) = entries.next_entry().await {
                let is_temp = entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| name.starts_with('.') && name.ends_with(TEMP_SUFFIX));
                if !is_temp || !Self::is_older_than(&entry, max_age).await {
                    continue;
                }
                match fs::remove_file(entry.path()).await {
                    Ok(()) => swept += 1,
                    Err(e) if e.kind() == ErrorKind::NotFound => {},
                    Err(e) => {
                        tracing::warn!(
                            path = %entry.path().display(),
                            error = %e,
                            "failed to remove stale temporary task file"
                        );
                    },
                }
            }
        }
        Ok(swept)
    }

    async fn is_older_than(entry: &fs::DirEntry, max_age: Duration) -> bool {
        let Ok(modified) = entry.metadata().await.and_then(|m| m.modified()) else {
            return false;
        };
        SystemTime::now()
            .duration_since(modified)
            .is_ok_and(|age| age >= max_age)
    }

    /// The root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn owner_dir(&self, owner_id: &str) -> Result<PathBuf, StorageError> {
        validate_key_component(owner_id)?;
        Ok(self.root.join(urlencoding::encode(owner_id).as_ref()))
    }

    fn record_path(&self, identity: &TaskIdentity) -> Result<PathBuf, StorageError> {
        validate_key_component(identity.task_id())?;
        let file_name = format!("{}{RECORD_SUFFIX}", urlencoding::encode(identity.task_id()));
        Ok(self.owner_dir(identity.owner_id())?.join(file_name))
    }

    /// Returns the record path, or `None` for an identity no write could
    /// have created.
    fn existing_record_path(&self, identity: &TaskIdentity) -> Option<PathBuf> {
        self.record_path(identity).ok()
    }

    fn temp_path(&self, identity: &TaskIdentity) -> Result<PathBuf, StorageError> {
        // Fixed length, independent of the task id.
        let file_name = format!(".{}{TEMP_SUFFIX}", Uuid::new_v4().simple());
        Ok(self.owner_dir(identity.owner_id())?.join(file_name))
    }

    async fn write_temp(&self, temp: &Path, contents: &[u8]) -> std::io::Result<()> {
        let mut file = fs::File::create(temp).await?;
        file.write_all(contents).await?;
        file.flush().await?;
        if self.sync_writes {
            file.sync_all().await?;
        }
        Ok(())
    }

    /// Makes a completed rename durable by syncing the directory entry.
    #[cfg(unix)]
    async fn sync_dir(&self, dir: &Path) -> std::io::Result<()> {
        if self.sync_writes {
            fs::File::open(dir).await?.sync_all().await?;
        }
        Ok(())
    }

    #[cfg(not(unix))]
    async fn sync_dir(&self, _dir: &Path) -> std::io::Result<()> {
        Ok(())
    }

    async fn discard_temp(temp: &Path) {
        if let Err(e) = fs::remove_file(temp).await {
            if e.kind() != ErrorKind::NotFound {
                tracing::warn!(
                    path = %temp.display(),
                    error = %e,
                    "failed to remove temporary task file"
                );
            }
        }
    }
}

#[async_trait]
impl TaskStore for FileTaskStore {
    async fn write(&self, identity: &TaskIdentity, record: &str) -> Result<(), StorageError> {
        let path = self.record_path(identity)?;
        let temp = self.temp_path(identity)?;
        let dir = self.owner_dir(identity.owner_id())?;

        fs::create_dir_all(&dir)
            .await
            .map_err(|e| StorageError::io(identity.to_string(), e))?;

        if let Err(e) = self.write_temp(&temp, record.as_bytes()).await {
            tracing::warn!(
                owner_id = identity.owner_id(),
                task_id = identity.task_id(),
                error = %e,
                "task write failed"
            );
            Self::discard_temp(&temp).await;
            return Err(StorageError::io(identity.to_string(), e));
        }

        if let Err(e) = fs::rename(&temp, &path).await {
            tracing::warn!(
                owner_id = identity.owner_id(),
                task_id = identity.task_id(),
                error = %e,
                "task publish failed"
            );
            Self::discard_temp(&temp).await;
            return Err(StorageError::io(identity.to_string(), e));
        }

        self.sync_dir(&dir)
            .await
            .map_err(|e| StorageError::io(identity.to_string(), e))?;

        tracing::debug!(
            owner_id = identity.owner_id(),
            task_id = identity.task_id(),
            bytes = record.len(),
            "wrote task record"
        );
        Ok(())
    }

    async fn read(&self, identity: &TaskIdentity) -> Result<Option<String>, StorageError> {
        let Some(path) = self.existing_record_path(identity) else {
            return Ok(None);
        };
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::io(identity.to_string(), e)),
        };

        String::from_utf8(bytes).map(Some).map_err(|e| {
            tracing::warn!(
                owner_id = identity.owner_id(),
                task_id = identity.task_id(),
                "task record is not valid UTF-8"
            );
            StorageError::CorruptRecord {
                key: identity.to_string(),
                reason: format!("not valid UTF-8: {e}"),
            }
        })
    }

    async fn remove(&self, identity: &TaskIdentity) -> Result<bool, StorageError> {
        let Some(path) = self.existing_record_path(identity) else {
            return Ok(false);
        };
        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(
                    owner_id = identity.owner_id(),
                    task_id = identity.task_id(),
                    "removed task record"
                );
                Ok(true)
            },
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::io(identity.to_string(), e)),
        }
    }

    async fn list_for_owner(&self, owner_id: &str) -> Result<BTreeSet<String>, StorageError> {
        let Ok(dir) = self.owner_dir(owner_id) else {
            return Ok(BTreeSet::new());
        };
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeSet::new()),
            Err(e) => return Err(StorageError::io(owner_id, e)),
        };

        let mut task_ids = BTreeSet::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::io(owner_id, e))?
        {
            let file_name = entry.file_name();
            let Some(encoded) = file_name
                .to_str()
                .and_then(|name| name.strip_suffix(RECORD_SUFFIX))
            else {
                continue;
            };

            // A record removed between read_dir and here is simply skipped.
            let is_file = match entry.file_type().await {
                Ok(file_type) => file_type.is_file(),
                Err(e) if e.kind() == ErrorKind::NotFound => false,
                Err(e) => return Err(StorageError::io(owner_id, e)),
            };
            if !is_file {
                continue;
            }

            match urlencoding::decode(encoded) {
                Ok(task_id) => {
                    task_ids.insert(task_id.into_owned());
                },
                Err(e) => {
                    tracing::warn!(owner_id, file = encoded, error = %e, "skipping undecodable task file name");
                },
            }
        }
        Ok(task_ids)
    }
}
