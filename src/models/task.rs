//! # Task Model
//!
//! The units of work that flow from producers through a queue to a worker tracker.
//!
//! - [`Task`]: an immutable description of one unit of work. `work_def` is opaque to
//!   this crate and interpreted only by the external worker process.
//! - [`TaskResult`]: the output reference a process produced for one task. Until it is
//!   persisted, `resource` is a local, ephemeral reference; once persisted it holds the
//!   durable locator returned by the result store.
//! - [`TaskBundle`]: the unit a queue stores and hands off. `completed_resources` carries
//!   results already persisted by an earlier, partially failed attempt.

use serde::{Deserialize, Serialize};

/// Immutable unit-of-work description
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Task {
    pub name: String,
    pub work_def: String,
}

impl Task {
    pub fn new(name: impl Into<String>, work_def: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            work_def: work_def.into(),
        }
    }
}

/// Output produced while executing a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task: Task,
    pub resource: String,
}

impl TaskResult {
    pub fn new(task: Task, resource: impl Into<String>) -> Self {
        Self {
            task,
            resource: resource.into(),
        }
    }

    /// The same result, now pointing at its durable locator
    pub fn persisted_at(&self, locator: impl Into<String>) -> Self {
        Self {
            task: self.task.clone(),
            resource: locator.into(),
        }
    }
}

/// Batch of tasks plus results carried over from a previous attempt
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskBundle {
    pub tasks_to_run: Vec<Task>,
    pub completed_resources: Vec<TaskResult>,
}

impl TaskBundle {
    /// A fresh bundle with nothing carried over
    pub fn new(tasks_to_run: Vec<Task>) -> Self {
        Self {
            tasks_to_run,
            completed_resources: Vec::new(),
        }
    }

    /// A bundle resuming work with results persisted by an earlier attempt
    pub fn resuming(tasks_to_run: Vec<Task>, completed_resources: Vec<TaskResult>) -> Self {
        Self {
            tasks_to_run,
            completed_resources,
        }
    }

    pub fn task_count(&self) -> usize {
        self.tasks_to_run.len()
    }
}
