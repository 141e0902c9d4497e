//! # Timer Service
//!
//! Delayed self-addressed messages. `schedule` delivers a message to an actor after a
//! delay on a background task. Handler failures are logged, never raised: the sender
//! has moved on by the time the message lands.
//!
//! Timers are tracked per actor key so an actor's pending deliveries can be cancelled,
//! and all of them are aborted on shutdown.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::traits::{Handler, Message};

#[derive(Debug, Default)]
pub struct TimerService {
    timers: Mutex<HashMap<String, Vec<JoinHandle<()>>>>,
    shutdown: CancellationToken,
}

impl TimerService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `msg` to `actor` once `delay` has elapsed
    pub fn schedule<A, M>(&self, actor: Arc<A>, msg: M, delay: Duration)
    where
        A: Handler<M>,
        M: Message,
    {
        let key = actor.key().to_string();
        let token = self.shutdown.child_token();
        let timer_key = key.clone();

        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!(key = %timer_key, "Timer cancelled before delivery");
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }

            if let Err(e) = actor.handle(msg).await {
                warn!(key = %timer_key, error = %e, "Delayed message handler failed");
            }
        });

        let mut timers = self.timers.lock();
        let handles = timers.entry(key).or_default();
        handles.retain(|handle| !handle.is_finished());
        handles.push(handle);
    }

    /// Abort all pending deliveries for `key`
    pub fn cancel(&self, key: &str) {
        if let Some(handles) = self.timers.lock().remove(key) {
            for handle in handles {
                handle.abort();
            }
            debug!(key = %key, "Cancelled pending timers");
        }
    }

    /// Number of timers scheduled for `key` that have not finished
    pub fn pending_for(&self, key: &str) -> usize {
        self.timers
            .lock()
            .get(key)
            .map(|handles| handles.iter().filter(|h| !h.is_finished()).count())
            .unwrap_or(0)
    }

    /// Abort every pending delivery
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        let mut timers = self.timers.lock();
        for (_, handles) in timers.drain() {
            for handle in handles {
                handle.abort();
            }
        }
    }
}
