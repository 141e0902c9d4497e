use proptest::prelude::*;

use tasker_queue::models::{Task, TaskBundle, TaskResult};

/// Strategy for task names
pub fn task_name_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,15}"
}

pub fn task_strategy() -> impl Strategy<Value = Task> {
    (task_name_strategy(), "[a-z ]{0,32}").prop_map(|(name, work_def)| Task::new(name, work_def))
}

pub fn task_result_strategy() -> impl Strategy<Value = TaskResult> {
    (task_strategy(), "s3://[a-z]{1,12}").prop_map(|(task, resource)| TaskResult::new(task, resource))
}

/// One producer-side queue operation, tagged with an id to trace delivery order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueOp {
    Add(u32),
    PushBack(u32),
}

impl QueueOp {
    pub fn id(&self) -> u32 {
        match self {
            Self::Add(id) | Self::PushBack(id) => *id,
        }
    }

    /// Bundle whose single task name encodes the op id
    pub fn bundle(&self) -> TaskBundle {
        TaskBundle::new(vec![Task::new(format!("bundle-{}", self.id()), "noop")])
    }
}

/// Sequences of adds and push-backs with unique ids
pub fn queue_ops_strategy() -> impl Strategy<Value = Vec<QueueOp>> {
    prop::collection::vec(any::<bool>(), 0..40).prop_map(|kinds| {
        kinds
            .into_iter()
            .enumerate()
            .map(|(i, push_back)| {
                if push_back {
                    QueueOp::PushBack(i as u32)
                } else {
                    QueueOp::Add(i as u32)
                }
            })
            .collect()
    })
}
