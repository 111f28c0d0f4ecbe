//! Throughput of the task lifecycle against both stores.

use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use orion_tasks::store::InMemoryTaskStore;
use orion_tasks::{StoreConfig, TaskRecord, TaskResult, TaskService};
use tokio::runtime::Runtime;

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap()
}

async fn lifecycle(service: &TaskService) -> TaskRecord {
    let task = service.create_task("bench", "bench", true).await.unwrap();
    let id = task.identity();
    for percent in [25, 50, 75] {
        service.update_progress(&id, percent, None).await.unwrap();
    }
    let done = service.complete(&id, TaskResult::ok()).await.unwrap();
    service.remove_task(&id).await.unwrap();
    done
}

fn bench_record_json(c: &mut Criterion) {
    let mut record = TaskRecord::new(
        orion_tasks::TaskIdentity::new("bench", "18f3c2a9d41e7b-0"),
        "Cloning repository",
        true,
    );
    record
        .update_progress(42, Some("Receiving objects: 42%".to_string()))
        .unwrap();
    let json = record.to_json().unwrap();

    c.bench_function("record_to_json", |b| {
        b.iter(|| black_box(&record).to_json().unwrap())
    });
    c.bench_function("record_from_json", |b| {
        b.iter(|| TaskRecord::from_json(black_box(&json)).unwrap())
    });
}

fn bench_memory_lifecycle(c: &mut Criterion) {
    let rt = runtime();
    let service = TaskService::new(Arc::new(InMemoryTaskStore::new()));
    c.bench_function("lifecycle_memory", |b| {
        b.iter(|| rt.block_on(lifecycle(&service)))
    });
}

fn bench_file_lifecycle(c: &mut Criterion) {
    let rt = runtime();
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::default()
        .with_root_dir(dir.path())
        .with_sync_writes(false);
    let service = rt.block_on(TaskService::open(config)).unwrap();
    c.bench_function("lifecycle_file", |b| {
        b.iter(|| rt.block_on(lifecycle(&service)))
    });
}

criterion_group!(
    benches,
    bench_record_json,
    bench_memory_lifecycle,
    bench_file_lifecycle
);
criterion_main!(benches);
