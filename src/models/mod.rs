//! # Data Model
//!
//! Work items moved through queues and the durable per-key state of queues and
//! worker trackers.

pub mod queue_state;
pub mod task;
pub mod worker_state;

pub use queue_state::{QueueState, QueueStats};
pub use task::{Task, TaskBundle, TaskResult};
pub use worker_state::{WorkerPhase, WorkerState, WorkerStatus};
