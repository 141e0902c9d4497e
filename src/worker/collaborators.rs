//! # Worker Collaborators
//!
//! External systems a worker tracker drives: the worker process itself, the result
//! store, and the sink that receives final bundle results. Each is an async trait so
//! deployments can plug in their own transport; the in-memory implementations here back
//! tests and local runs.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PersistenceError, ProcessError, SinkError};
use crate::models::{Task, TaskResult};

/// The physical process executing tasks for one tracker
#[async_trait]
pub trait WorkerProcess: Send + Sync + fmt::Debug {
    /// Hand `task` to the process. Execution completes later through `task_complete`.
    async fn dispatch(&self, location: &str, task: &Task) -> Result<(), ProcessError>;

    /// Liveness probe
    async fn probe(&self, location: &str) -> Result<(), ProcessError>;

    /// Release the process after it has been declared dead
    async fn teardown(&self, location: &str) -> Result<(), ProcessError>;
}

/// Durable storage for task outputs
#[async_trait]
pub trait ResultStore: Send + Sync + fmt::Debug {
    /// Persist the result's local resource and return its stable locator
    async fn persist(&self, result: &TaskResult) -> Result<String, PersistenceError>;
}

/// Receiver of final bundle results. Delivery is retried without bound, so
/// implementations must be idempotent.
#[async_trait]
pub trait ResultSink: Send + Sync + fmt::Debug {
    async fn notify(&self, completion: &BundleCompletion) -> Result<(), SinkError>;
}

/// Notification sent when a bundle finishes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleCompletion {
    pub worker_id: String,
    pub queue_name: String,
    /// Persisted result of the bundle's last task
    pub final_result: TaskResult,
    /// Every persisted result of the bundle, carried-over ones first
    pub results: Vec<TaskResult>,
    pub completed_at: DateTime<Utc>,
}

/// The collaborators one tracker needs, shared across trackers
#[derive(Debug, Clone)]
pub struct Collaborators {
    pub process: Arc<dyn WorkerProcess>,
    pub store: Arc<dyn ResultStore>,
    pub sink: Arc<dyn ResultSink>,
}

impl Collaborators {
    pub fn new(
        process: Arc<dyn WorkerProcess>,
        store: Arc<dyn ResultStore>,
        sink: Arc<dyn ResultSink>,
    ) -> Self {
        Self {
            process,
            store,
            sink,
        }
    }

    /// In-memory collaborators for tests and local runs
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(InMemoryWorkerProcess::new()),
            Arc::new(InMemoryResultStore::new()),
            Arc::new(RecordingSink::new()),
        )
    }
}

// ============================================================================
// In-memory implementations
// ============================================================================

/// Worker process double that records dispatched tasks
///
/// Locations marked dead fail probes and dispatches; `fail_next_dispatches` injects
/// transient delivery failures.
#[derive(Debug, Default)]
pub struct InMemoryWorkerProcess {
    dispatched: Mutex<Vec<(String, Task)>>,
    dead: Mutex<HashSet<String>>,
    torn_down: Mutex<Vec<String>>,
    dispatch_failures: AtomicU32,
    probes: AtomicU32,
}

impl InMemoryWorkerProcess {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_alive(&self, location: &str, alive: bool) {
        let mut dead = self.dead.lock();
        if alive {
            dead.remove(location);
        } else {
            dead.insert(location.to_string());
        }
    }

    pub fn fail_next_dispatches(&self, count: u32) {
        self.dispatch_failures.store(count, Ordering::SeqCst);
    }

    pub fn dispatched(&self) -> Vec<(String, Task)> {
        self.dispatched.lock().clone()
    }

    pub fn dispatched_names(&self) -> Vec<String> {
        self.dispatched
            .lock()
            .iter()
            .map(|(_, task)| task.name.clone())
            .collect()
    }

    pub fn torn_down(&self) -> Vec<String> {
        self.torn_down.lock().clone()
    }

    pub fn probe_count(&self) -> u32 {
        self.probes.load(Ordering::SeqCst)
    }

    fn is_dead(&self, location: &str) -> bool {
        self.dead.lock().contains(location)
    }
}

#[async_trait]
impl WorkerProcess for InMemoryWorkerProcess {
    async fn dispatch(&self, location: &str, task: &Task) -> Result<(), ProcessError> {
        if self.is_dead(location) {
            return Err(ProcessError::Unreachable {
                location: location.to_string(),
            });
        }

        let injected = self
            .dispatch_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(ProcessError::DeliveryFailed {
                location: location.to_string(),
                message: "injected failure".to_string(),
            });
        }

        debug!(location = %location, task = %task.name, "Recorded dispatch");
        self.dispatched
            .lock()
            .push((location.to_string(), task.clone()));
        Ok(())
    }

    async fn probe(&self, location: &str) -> Result<(), ProcessError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        if self.is_dead(location) {
            Err(ProcessError::Unreachable {
                location: location.to_string(),
            })
        } else {
            Ok(())
        }
    }

    async fn teardown(&self, location: &str) -> Result<(), ProcessError> {
        self.torn_down.lock().push(location.to_string());
        Ok(())
    }
}

/// Result store double returning `mem://` locators
#[derive(Debug, Default)]
pub struct InMemoryResultStore {
    persisted: Mutex<Vec<TaskResult>>,
    failures: AtomicU32,
}

impl InMemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` persist calls
    pub fn fail_next_writes(&self, count: u32) {
        self.failures.store(count, Ordering::SeqCst);
    }

    /// Every result written, in write order
    pub fn persisted(&self) -> Vec<TaskResult> {
        self.persisted.lock().clone()
    }
}

#[async_trait]
impl ResultStore for InMemoryResultStore {
    async fn persist(&self, result: &TaskResult) -> Result<String, PersistenceError> {
        let injected = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(PersistenceError::WriteFailed {
                task: result.task.name.clone(),
                message: "injected failure".to_string(),
            });
        }

        let mut persisted = self.persisted.lock();
        let locator = format!("mem://results/{}/{}", persisted.len(), result.task.name);
        persisted.push(result.clone());
        Ok(locator)
    }
}

/// Sink double that records every completion it accepts
#[derive(Debug, Default)]
pub struct RecordingSink {
    completions: Mutex<Vec<BundleCompletion>>,
    failures: AtomicU32,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_notifications(&self, count: u32) {
        self.failures.store(count, Ordering::SeqCst);
    }

    pub fn completions(&self) -> Vec<BundleCompletion> {
        self.completions.lock().clone()
    }
}

#[async_trait]
impl ResultSink for RecordingSink {
    async fn notify(&self, completion: &BundleCompletion) -> Result<(), SinkError> {
        let injected = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(SinkError::DeliveryFailed("injected failure".to_string()));
        }

        self.completions.lock().push(completion.clone());
        Ok(())
    }
}
