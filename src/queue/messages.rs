//! # Queue Messages
//!
//! Message types handled by [`QueueActor`](super::QueueActor). Each implements
//! [`Message`] with its response type.

use crate::actors::{HandleId, Message};
use crate::models::{QueueStats, TaskBundle};

// ============================================================================
// Producer operations
// ============================================================================

/// Admit a bundle at the tail. Fails with `QueueClosed` once the queue is sealed.
#[derive(Debug, Clone)]
pub struct AddBundle {
    pub bundle: TaskBundle,
}

impl Message for AddBundle {
    type Response = ();
}

/// Return interrupted work to the head. Succeeds even when the queue is sealed.
#[derive(Debug, Clone)]
pub struct PushBackBundle {
    pub bundle: TaskBundle,
}

impl Message for PushBackBundle {
    type Response = ();
}

/// Close the queue and reject every waiting poller
#[derive(Debug, Clone, Copy, Default)]
pub struct SealQueue;

impl Message for SealQueue {
    type Response = ();
}

// ============================================================================
// Consumer operations
// ============================================================================

/// Wait until a bundle is handed off. No timeout.
#[derive(Debug, Clone, Copy, Default)]
pub struct PollBundle;

impl Message for PollBundle {
    type Response = TaskBundle;
}

/// Register a deferred handle as a poller, or complete it immediately
#[derive(Debug, Clone, Copy)]
pub struct RegisterCallback {
    pub handle_id: HandleId,
}

impl Message for RegisterCallback {
    type Response = ();
}

// ============================================================================
// Monitoring
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct GetQueueStats;

impl Message for GetQueueStats {
    type Response = QueueStats;
}
