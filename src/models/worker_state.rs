//! # Worker State
//!
//! Durable state of one worker tracker session. The state is either advanced bundle to
//! bundle (task fields cleared and repopulated at each bundle boundary) or cleared
//! entirely on recovery, which returns the tracker to `NotStarted`.
//!
//! While a bundle is owned, `pending_tasks`, `task_in_progress` and `completed_tasks`
//! partition its `tasks_to_run` in original order.

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::task::{Task, TaskBundle, TaskResult};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkerState {
    pub queue_name: Option<String>,
    pub worker_location: Option<String>,
    /// Fresh per `start_worker`; ties heartbeats to the session that scheduled them
    pub session_id: Option<Uuid>,
    /// Number of bundles received in this session
    pub bundle_seq: u64,
    /// Set while waiting on the queue for the next bundle
    pub polling: bool,
    pub task_in_progress: Option<Task>,
    pub pending_tasks: VecDeque<Task>,
    pub completed_tasks: Vec<TaskResult>,
    pub persisted_tasks: Vec<TaskResult>,
}

impl WorkerState {
    pub fn is_started(&self) -> bool {
        self.queue_name.is_some()
    }

    /// Whether `session_id` still owns this state
    pub fn is_session(&self, session_id: Uuid) -> bool {
        self.session_id == Some(session_id)
    }

    pub fn phase(&self) -> WorkerPhase {
        if !self.is_started() {
            WorkerPhase::NotStarted
        } else if self.polling {
            WorkerPhase::Polling
        } else if self.task_in_progress.is_some() {
            WorkerPhase::TaskDispatched
        } else {
            WorkerPhase::Idle
        }
    }

    /// Take ownership of a freshly polled bundle
    pub fn load_bundle(&mut self, bundle: TaskBundle) {
        self.polling = false;
        self.bundle_seq += 1;
        self.task_in_progress = None;
        self.pending_tasks = bundle.tasks_to_run.into();
        self.completed_tasks.clear();
        self.persisted_tasks = bundle.completed_resources;
    }

    /// Clear per-bundle fields at a bundle boundary
    pub fn clear_bundle(&mut self) {
        self.task_in_progress = None;
        self.pending_tasks.clear();
        self.completed_tasks.clear();
        self.persisted_tasks.clear();
    }

    /// Build the bundle that replays everything not yet durably persisted.
    ///
    /// Completed-but-unpersisted results are assumed lost, so their tasks run again
    /// ahead of the task in progress and whatever remained pending.
    pub fn recovery_bundle(&self) -> TaskBundle {
        let tasks_to_run = self
            .completed_tasks
            .iter()
            .map(|result| result.task.clone())
            .chain(self.task_in_progress.iter().cloned())
            .chain(self.pending_tasks.iter().cloned())
            .collect();

        TaskBundle::resuming(tasks_to_run, self.persisted_tasks.clone())
    }

    pub fn status(&self, worker_id: &str) -> WorkerStatus {
        WorkerStatus {
            worker_id: worker_id.to_string(),
            phase: self.phase(),
            queue_name: self.queue_name.clone(),
            worker_location: self.worker_location.clone(),
            session_id: self.session_id,
            bundles_received: self.bundle_seq,
            task_in_progress: self.task_in_progress.as_ref().map(|task| task.name.clone()),
            pending: self.pending_tasks.len(),
            completed: self.completed_tasks.len(),
            persisted: self.persisted_tasks.len(),
        }
    }
}

/// Lifecycle phase of a worker tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerPhase {
    NotStarted,
    /// Waiting on the queue for a bundle
    Polling,
    /// One task handed to the worker process, awaiting its completion callback
    TaskDispatched,
    /// Started, holding no task and not polling
    Idle,
}

impl fmt::Display for WorkerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not_started"),
            Self::Polling => write!(f, "polling"),
            Self::TaskDispatched => write!(f, "task_dispatched"),
            Self::Idle => write!(f, "idle"),
        }
    }
}

/// Snapshot of a tracker for status queries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerStatus {
    pub worker_id: String,
    pub phase: WorkerPhase,
    pub queue_name: Option<String>,
    pub worker_location: Option<String>,
    pub session_id: Option<Uuid>,
    pub bundles_received: u64,
    pub task_in_progress: Option<String>,
    pub pending: usize,
    pub completed: usize,
    pub persisted: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(name: &str) -> Task {
        Task::new(name, format!("run {name}"))
    }

    #[test]
    fn test_phase_progression() {
        let mut state = WorkerState::default();
        assert_eq!(state.phase(), WorkerPhase::NotStarted);

        state.queue_name = Some("render".to_string());
        state.polling = true;
        assert_eq!(state.phase(), WorkerPhase::Polling);

        state.load_bundle(TaskBundle::new(vec![task("a")]));
        assert_eq!(state.phase(), WorkerPhase::Idle);
        assert_eq!(state.bundle_seq, 1);

        state.task_in_progress = state.pending_tasks.pop_front();
        assert_eq!(state.phase(), WorkerPhase::TaskDispatched);
    }

    #[test]
    fn test_recovery_bundle_order() {
        let mut state = WorkerState::default();
        state.completed_tasks = vec![
            TaskResult::new(task("a"), "/tmp/a"),
            TaskResult::new(task("b"), "/tmp/b"),
        ];
        state.task_in_progress = Some(task("c"));
        state.pending_tasks = vec![task("d"), task("e")].into();
        state.persisted_tasks = vec![TaskResult::new(task("z"), "s3://z")];

        let bundle = state.recovery_bundle();
        let names: Vec<_> = bundle.tasks_to_run.iter().map(|t| t.name.as_str()).collect();

        assert_eq!(names, vec!["a", "b", "c", "d", "e"]);
        assert_eq!(bundle.completed_resources, state.persisted_tasks);
    }

    #[test]
    fn test_load_bundle_splits_persisted() {
        let mut state = WorkerState::default();
        let carried = TaskResult::new(task("a"), "s3://a");
        state.load_bundle(TaskBundle::resuming(vec![task("b")], vec![carried.clone()]));

        assert_eq!(state.pending_tasks.len(), 1);
        assert_eq!(state.persisted_tasks, vec![carried]);
        assert!(state.completed_tasks.is_empty());
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(WorkerPhase::TaskDispatched.to_string(), "task_dispatched");
        assert_eq!(WorkerPhase::NotStarted.to_string(), "not_started");
    }
}
