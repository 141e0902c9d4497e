//! # Worker Registry
//!
//! One tracker per worker id, created lazily and sharing the runtime services and
//! collaborators of the system that owns the registry.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info};

use super::tracker::{TrackerContext, WorkerTracker};

pub struct WorkerRegistry {
    context: TrackerContext,
    trackers: DashMap<String, Arc<WorkerTracker>>,
}

impl fmt::Debug for WorkerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerRegistry")
            .field("trackers", &self.trackers.len())
            .field("settings", &self.context.settings)
            .finish()
    }
}

impl WorkerRegistry {
    pub fn new(context: TrackerContext) -> Self {
        Self {
            context,
            trackers: DashMap::new(),
        }
    }

    /// Tracker for `worker_id`
    pub fn tracker(&self, worker_id: &str) -> Arc<WorkerTracker> {
        if let Some(tracker) = self.trackers.get(worker_id) {
            return Arc::clone(tracker.value());
        }

        self.trackers
            .entry(worker_id.to_string())
            .or_insert_with(|| {
                debug!(worker_id = %worker_id, "Creating worker tracker");
                WorkerTracker::new(worker_id, self.context.clone())
            })
            .clone()
    }

    pub fn worker_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.trackers.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Cancel every tracker created so far
    pub fn cancel_all(&self) {
        for entry in self.trackers.iter() {
            entry.value().cancel();
        }
        info!(trackers = self.trackers.len(), "Cancelled worker trackers");
    }
}
