//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::sync::Arc;

use orion_tasks::store::InMemoryTaskStore;
use orion_tasks::{StoreConfig, TaskService};
use tempfile::TempDir;

/// Runs `jobs` copies of `job` as separate tokio tasks and collects their
/// outputs in spawn order.
///
/// Each job receives its index. A panicking job fails the calling test.
pub async fn run_workers<F, Fut, T>(jobs: usize, job: F) -> Vec<T>
where
    F: Fn(usize) -> Fut,
    Fut: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let handles: Vec<_> = (0..jobs).map(|i| tokio::spawn(job(i))).collect();
    futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.expect("worker panicked"))
        .collect()
}

/// A service whose durable store is in memory.
pub fn memory_service() -> Arc<TaskService> {
    Arc::new(TaskService::new(Arc::new(InMemoryTaskStore::new())))
}

/// File store configuration rooted in a fresh temporary directory.
///
/// Keep the `TempDir` alive for as long as the store is used.
pub fn temp_config() -> (TempDir, StoreConfig) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let config = StoreConfig::default()
        .with_root_dir(dir.path().join("tasks"))
        .with_sync_writes(false);
    (dir, config)
}

/// A service backed by a file store in a fresh temporary directory.
pub async fn file_service() -> (TempDir, Arc<TaskService>) {
    let (dir, config) = temp_config();
    let service = TaskService::open(config).await.expect("open file store");
    (dir, Arc::new(service))
}
