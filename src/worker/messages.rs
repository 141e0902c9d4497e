//! # Worker Tracker Messages
//!
//! Message types handled by [`WorkerTracker`](super::WorkerTracker).

use uuid::Uuid;

use crate::actors::Message;
use crate::models::{TaskResult, WorkerStatus};

/// Bind the tracker to a queue and a worker process, then start consuming
#[derive(Debug, Clone)]
pub struct StartWorker {
    pub queue_name: String,
    pub worker_location: String,
}

impl Message for StartWorker {
    type Response = ();
}

/// Completion callback from the worker process
#[derive(Debug, Clone)]
pub struct TaskComplete {
    pub result: TaskResult,
}

impl Message for TaskComplete {
    type Response = ();
}

/// Persist every completed, unpersisted result
#[derive(Debug, Clone, Copy, Default)]
pub struct CheckpointResults;

impl Message for CheckpointResults {
    type Response = ();
}

/// Declare the worker process dead and return its unfinished work to the queue
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportFailed;

impl Message for ReportFailed {
    type Response = ();
}

/// One link of a session's heartbeat chain. Self-scheduled only.
#[derive(Debug, Clone, Copy)]
pub struct MakeHeartbeat {
    pub session_id: Uuid,
    pub missed: u32,
}

impl Message for MakeHeartbeat {
    type Response = ();
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GetWorkerStatus;

impl Message for GetWorkerStatus {
    type Response = WorkerStatus;
}
