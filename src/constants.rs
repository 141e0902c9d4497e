//! # System Constants
//!
//! Operational defaults and key namespaces for queues and worker trackers.

/// Actor kinds used to namespace durable state keys
pub mod kinds {
    pub const QUEUE: &str = "queue";
    pub const WORKER: &str = "worker";
    pub const JOURNAL: &str = "journal";
}

/// Structured log events emitted by queues and trackers
pub mod events {
    pub const BUNDLE_ENQUEUED: &str = "queue.bundle_enqueued";
    pub const BUNDLE_HANDED_OFF: &str = "queue.bundle_handed_off";
    pub const BUNDLE_PUSHED_BACK: &str = "queue.bundle_pushed_back";
    pub const QUEUE_SEALED: &str = "queue.sealed";

    pub const WORKER_STARTED: &str = "worker.started";
    pub const TASK_DISPATCHED: &str = "worker.task_dispatched";
    pub const TASK_COMPLETED: &str = "worker.task_completed";
    pub const BUNDLE_FINALIZED: &str = "worker.bundle_finalized";
    pub const WORKER_FAILED: &str = "worker.failed";
    pub const HEARTBEAT_MISSED: &str = "worker.heartbeat_missed";
}

/// Default tuning values, overridable through configuration
pub mod defaults {
    /// Consecutive missed heartbeats before a worker is declared dead
    pub const HEARTBEAT_MISS_THRESHOLD: u32 = 5;

    /// Interval between liveness probes
    pub const HEARTBEAT_INTERVAL_MS: u64 = 10_000;

    /// Delivery attempts when handing a task to a worker process
    pub const DISPATCH_MAX_ATTEMPTS: u32 = 5;
    pub const DISPATCH_BACKOFF_MS: u64 = 1_000;

    /// Attempts when persisting a task result
    pub const PERSIST_MAX_ATTEMPTS: u32 = 5;
    pub const PERSIST_BACKOFF_MS: u64 = 1_000;

    /// Backoff for the unbounded bundle completion notification
    pub const NOTIFY_BACKOFF_MS: u64 = 1_000;
}
