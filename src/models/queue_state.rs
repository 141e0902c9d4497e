//! # Queue State
//!
//! Durable state of one named queue. Created lazily (as `Default`) on first access.
//!
//! `queue` and `pollers` are never both non-empty: arriving work is matched with a
//! waiting poller immediately, and a poller only waits when nothing is stored.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::task::TaskBundle;
use crate::actors::HandleId;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueState {
    /// One-way terminal flag set by `seal`
    pub closed: bool,
    /// Stored bundles, head first
    pub queue: VecDeque<TaskBundle>,
    /// Deferred handles of blocked pollers, oldest first
    pub pollers: VecDeque<HandleId>,
}

impl QueueState {
    pub fn stats(&self) -> QueueStats {
        QueueStats {
            closed: self.closed,
            queued: self.queue.len(),
            pollers: self.pollers.len(),
        }
    }

    /// The hand-off invariant
    pub fn is_consistent(&self) -> bool {
        self.queue.is_empty() || self.pollers.is_empty()
    }
}

/// Point-in-time view of a queue, for monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub closed: bool,
    pub queued: usize,
    pub pollers: usize,
}
