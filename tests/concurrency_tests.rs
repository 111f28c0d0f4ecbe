//! Concurrency tests for TaskService on the multi-thread runtime.
//!
//! Workers are spawned through `common::run_workers` so every job runs as
//! its own tokio task and may land on any worker thread.

mod common;

use std::collections::HashSet;
use std::sync::Arc;

use orion_tasks::{TaskError, TaskRecord, TaskResult};
use pretty_assertions::assert_eq;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_yield_distinct_ids() {
    let (_dir, service) = common::file_service().await;

    let records: Vec<TaskRecord> = common::run_workers(100, |i| {
        let service = Arc::clone(&service);
        async move {
            service
                .create_task(format!("worker {i}"), "test", true)
                .await
                .unwrap()
        }
    })
    .await;

    let ids: HashSet<_> = records.iter().map(|r| r.task_id.clone()).collect();
    assert_eq!(ids.len(), 100, "all 100 task ids should be distinct");
    assert_eq!(service.count_for_owner("test").await.unwrap(), 100);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_across_stores_and_owners() {
    let service = common::memory_service();

    let records: Vec<TaskRecord> = common::run_workers(100, |i| {
        let service = Arc::clone(&service);
        async move {
            let owner = if i % 2 == 0 { "even" } else { "odd" };
            service
                .create_task("mixed", owner, i % 3 == 0)
                .await
                .unwrap()
        }
    })
    .await;

    let ids: HashSet<_> = records.iter().map(|r| r.identity()).collect();
    assert_eq!(ids.len(), 100);
    assert_eq!(service.count_for_owner("even").await.unwrap(), 50);
    assert_eq!(service.count_for_owner("odd").await.unwrap(), 50);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_updates_to_one_task_lose_nothing() {
    let (_dir, service) = common::file_service().await;
    let id = service
        .create_task("contended", "test", true)
        .await
        .unwrap()
        .identity();

    common::run_workers(50, |i| {
        let service = Arc::clone(&service);
        let id = id.clone();
        async move {
            let percent = i32::try_from(i * 2).unwrap();
            service
                .update_progress(&id, percent, Some(format!("step {i}")))
                .await
                .unwrap();
        }
    })
    .await;

    // Each update is a full read-modify-write, so the highest value wins
    // regardless of arrival order.
    let stored = service.get_task(&id).await.unwrap().unwrap();
    assert_eq!(stored.percent_complete, 98);
    assert!(stored.running);
    assert!(stored.message.unwrap().starts_with("step "));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_completions_have_one_winner() {
    let service = common::memory_service();
    let id = service
        .create_task("race", "test", true)
        .await
        .unwrap()
        .identity();

    let outcomes = common::run_workers(20, |i| {
        let service = Arc::clone(&service);
        let id = id.clone();
        async move {
            let result = TaskResult::error(500, format!("worker {i}"), "");
            service.complete(&id, result).await
        }
    })
    .await;

    let winners: Vec<_> = outcomes.iter().filter_map(|o| o.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1, "exactly one completion should succeed");
    assert!(outcomes.iter().all(|o| matches!(
        o,
        Ok(_) | Err(TaskError::InvalidTransition { .. })
    )));

    let stored = service.get_task(&id).await.unwrap().unwrap();
    assert_eq!(stored.result, winners[0].result);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reads_during_writes_always_see_whole_records() {
    let (_dir, service) = common::file_service().await;
    let id = service
        .create_task("observed", "test", true)
        .await
        .unwrap()
        .identity();

    let writer = {
        let service = Arc::clone(&service);
        let id = id.clone();
        tokio::spawn(async move {
            for percent in 1..=100 {
                service.update_progress(&id, percent, None).await.unwrap();
            }
            service.complete(&id, TaskResult::ok()).await.unwrap();
        })
    };

    let observations = common::run_workers(8, |_| {
        let service = Arc::clone(&service);
        let id = id.clone();
        async move {
            let mut last = 0;
            for _ in 0..50 {
                let record = service
                    .get_task(&id)
                    .await
                    .expect("read must never see a torn record")
                    .expect("task must stay visible");
                assert!(record.percent_complete >= last, "progress went backwards");
                last = record.percent_complete;
                tokio::task::yield_now().await;
            }
            last
        }
    })
    .await;

    writer.await.unwrap();
    assert!(observations.iter().all(|&p| p <= 100));
    let stored = service.get_task(&id).await.unwrap().unwrap();
    assert!(!stored.running);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_removal_reports_one_removal() {
    let (_dir, service) = common::file_service().await;
    let id = service
        .create_task("doomed", "test", true)
        .await
        .unwrap()
        .identity();

    let removed = common::run_workers(10, |_| {
        let service = Arc::clone(&service);
        let id = id.clone();
        async move { service.remove_task(&id).await.unwrap() }
    })
    .await;

    assert_eq!(removed.iter().filter(|&&r| r).count(), 1);
    assert!(service.get_task(&id).await.unwrap().is_none());
    assert_eq!(service.count_for_owner("test").await.unwrap(), 0);
}

#[test]
fn test_id_generator_across_os_threads() {
    let ids = Arc::new(orion_tasks::TaskIdGenerator::new());
    let handles: Vec<_> = (0..10)
        .map(|_| {
            let ids = Arc::clone(&ids);
            std::thread::spawn(move || (0..100).map(|_| ids.next()).collect::<Vec<_>>())
        })
        .collect();

    let mut seen = HashSet::new();
    for handle in handles {
        for id in handle.join().unwrap() {
            assert!(seen.insert(id));
        }
    }
    assert_eq!(seen.len(), 1000);
}
