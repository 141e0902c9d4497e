mod common;

use std::collections::VecDeque;
use std::sync::Arc;

use common::strategies::*;
use common::Harness;
use proptest::prelude::*;
use tasker_queue::models::{TaskBundle, WorkerState};
use tasker_queue::queue::QueueActor;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

/// Reference model: adds join the tail, push-backs jump to the head
fn model_order(ops: &[QueueOp]) -> Vec<u32> {
    let mut model = VecDeque::new();
    for op in ops {
        match op {
            QueueOp::Add(id) => model.push_back(*id),
            QueueOp::PushBack(id) => model.push_front(*id),
        }
    }
    model.into_iter().collect()
}

fn op_id(bundle: &TaskBundle) -> u32 {
    bundle.tasks_to_run[0]
        .name
        .trim_start_matches("bundle-")
        .parse()
        .unwrap()
}

async fn apply(queue: &QueueActor, op: QueueOp) {
    match op {
        QueueOp::Add(_) => queue.add_bundle(op.bundle()).await.unwrap(),
        QueueOp::PushBack(_) => queue.push_back_bundle(op.bundle()).await.unwrap(),
    }
}

proptest! {
    /// Property: with no pollers waiting, delivery order matches the deque model
    #[test]
    fn stored_bundles_follow_deque_order(ops in queue_ops_strategy()) {
        let delivered = runtime().block_on(async {
            let harness = Harness::new();
            let queue = harness.system.queue("prop");
            for op in &ops {
                apply(&queue, *op).await;
            }

            let mut delivered = Vec::with_capacity(ops.len());
            for _ in 0..ops.len() {
                delivered.push(op_id(&queue.poll_bundle().await.unwrap()));
            }
            assert_eq!(queue.stats().await.unwrap().queued, 0);
            delivered
        });

        prop_assert_eq!(delivered, model_order(&ops));
    }

    /// Property: waiting pollers take the first bundles in registration order, and the
    /// queue never holds bundles while a poller is waiting
    #[test]
    fn waiting_pollers_are_served_first(ops in queue_ops_strategy(), waiting in 0usize..5) {
        let (handed_off, stored) = runtime().block_on(async {
            let harness = Harness::new();
            let queue = harness.system.queue("prop");

            let mut pollers = Vec::new();
            for registered in 1..=waiting {
                let poller_queue = Arc::clone(&queue);
                pollers.push(tokio::spawn(async move { poller_queue.poll_bundle().await }));
                while queue.stats().await.unwrap().pollers < registered {
                    tokio::task::yield_now().await;
                }
            }

            for op in &ops {
                apply(&queue, *op).await;
                let stats = queue.stats().await.unwrap();
                assert!(stats.queued == 0 || stats.pollers == 0, "bundle stored while poller waits");
            }

            let served = waiting.min(ops.len());
            let mut handed_off = Vec::new();
            for poller in pollers.drain(..served) {
                handed_off.push(op_id(&poller.await.unwrap().unwrap()));
            }
            for poller in pollers {
                poller.abort();
            }

            let mut stored = Vec::new();
            for _ in served..ops.len() {
                stored.push(op_id(&queue.poll_bundle().await.unwrap()));
            }
            (handed_off, stored)
        });

        let served = waiting.min(ops.len());
        let expected_handed_off: Vec<u32> = ops[..served].iter().map(QueueOp::id).collect();
        prop_assert_eq!(handed_off, expected_handed_off);
        prop_assert_eq!(stored, model_order(&ops[served..]));
    }

    /// Property: recovery replays exactly the tasks whose results were not persisted,
    /// in original order, carrying the persisted ones
    #[test]
    fn recovery_replays_unpersisted_suffix(
        tasks in prop::collection::vec(task_strategy(), 1..12),
        carried in prop::collection::vec(task_result_strategy(), 0..3),
        progress in any::<prop::sample::Index>(),
        checkpointed in any::<prop::sample::Index>(),
    ) {
        let completed = progress.index(tasks.len() + 1);
        let persisted = checkpointed.index(completed + 1);

        let mut state = WorkerState::default();
        state.load_bundle(TaskBundle::resuming(tasks.clone(), carried.clone()));
        for task in state.pending_tasks.drain(..completed).collect::<Vec<_>>() {
            let result = tasker_queue::TaskResult::new(task, "/tmp/local");
            state.completed_tasks.push(result);
        }
        for result in state.completed_tasks.drain(..persisted).collect::<Vec<_>>() {
            state.persisted_tasks.push(result.persisted_at("s3://persisted"));
        }
        state.task_in_progress = state.pending_tasks.pop_front();

        let recovered = state.recovery_bundle();

        prop_assert_eq!(&recovered.tasks_to_run, &tasks[persisted..].to_vec());
        prop_assert_eq!(recovered.completed_resources.len(), carried.len() + persisted);
        prop_assert_eq!(&recovered.completed_resources[..carried.len()], &carried[..]);
    }
}

#[cfg(test)]
mod model_invariants {
    use super::*;

    #[test]
    fn test_model_order_mixes_ends() {
        let ops = [QueueOp::Add(0), QueueOp::PushBack(1), QueueOp::Add(2), QueueOp::PushBack(3)];
        assert_eq!(model_order(&ops), vec![3, 1, 0, 2]);
    }
}
