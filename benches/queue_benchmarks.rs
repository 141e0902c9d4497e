//! Queue throughput benchmarks on the in-memory state store.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tasker_queue::actors::InMemoryStateStore;
use tasker_queue::bootstrap::QueueSystem;
use tasker_queue::models::{Task, TaskBundle};
use tasker_queue::worker::{Collaborators, TrackerSettings};

fn system() -> QueueSystem {
    QueueSystem::with_store(
        Arc::new(InMemoryStateStore::new()),
        TrackerSettings::default(),
        Collaborators::in_memory(),
    )
}

fn bundle(size: usize) -> TaskBundle {
    TaskBundle::new(
        (0..size)
            .map(|i| Task::new(format!("task-{i}"), "noop"))
            .collect(),
    )
}

fn benchmark_add_then_poll(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let system = system();
    let queue = system.queue("bench");

    let mut group = c.benchmark_group("add_then_poll");
    for size in [1usize, 10, 100] {
        let work = bundle(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &work, |b, work| {
            b.to_async(&runtime).iter(|| async {
                queue.add_bundle(work.clone()).await.unwrap();
                black_box(queue.poll_bundle().await.unwrap())
            });
        });
    }
    group.finish();
}

fn benchmark_waiting_poller_handoff(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let system = system();
    let queue = system.queue("handoff");
    let work = bundle(1);

    c.bench_function("waiting_poller_handoff", |b| {
        b.to_async(&runtime).iter(|| async {
            let poller = {
                let queue = Arc::clone(&queue);
                tokio::spawn(async move { queue.poll_bundle().await })
            };
            while queue.stats().await.unwrap().pollers == 0 {
                tokio::task::yield_now().await;
            }
            queue.add_bundle(work.clone()).await.unwrap();
            black_box(poller.await.unwrap().unwrap())
        });
    });
}

criterion_group!(benches, benchmark_add_then_poll, benchmark_waiting_poller_handoff);
criterion_main!(benches);
