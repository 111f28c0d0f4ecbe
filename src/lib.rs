//! Asynchronous task tracking.
//!
//! Long-running operations (cloning a repository, indexing, a build)
//! register a task, report progress while they work, and finish with a
//! result. Clients poll the task by its [`TaskIdentity`] until it is done.
//!
//! # Overview
//!
//! A task progresses through a two-state machine (`Running` -> `Done`).
//! While running, its progress only moves forward; once done, its result is
//! fixed. Durable tasks are persisted as one JSON document per task and
//! survive a restart; the rest are kept in memory.
//!
//! # Module Organization
//!
//! - [`domain`] - Task record, identity and result types
//! - [`store`] - Blob store trait with file and in-memory implementations
//! - [`service`] - [`TaskService`], the entry point for all operations
//! - [`id`] - Collision-free task id allocation
//! - [`config`] - File store configuration (TOML and environment)
//! - [`error`] - Storage and task error types
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use orion_tasks::store::InMemoryTaskStore;
//! use orion_tasks::{TaskResult, TaskService, TaskState};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> orion_tasks::Result<()> {
//! let service = TaskService::new(Arc::new(InMemoryTaskStore::new()));
//! let task = service.create_task("TestTaskName", "test", true).await?;
//!
//! service
//!     .update_progress(&task.identity(), 75, Some("Almost there".to_string()))
//!     .await?;
//! let done = service.complete(&task.identity(), TaskResult::ok()).await?;
//!
//! assert_eq!(done.state(), TaskState::Done);
//! assert_eq!(done.percent_complete, 100);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod domain;
pub mod error;
pub mod id;
#[cfg(feature = "logging")]
pub mod logging;
pub mod service;
pub mod store;

// Re-exports for ergonomic access
pub use config::{ConfigError, StoreConfig};
pub use domain::{Severity, TaskIdentity, TaskRecord, TaskResult, TaskState};
pub use error::{Result, StorageError, TaskError};
pub use id::TaskIdGenerator;
#[cfg(feature = "logging")]
pub use logging::init_logging;
pub use service::TaskService;
pub use store::{FileTaskStore, InMemoryTaskStore, TaskStore};
