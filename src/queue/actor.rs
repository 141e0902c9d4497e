//! # Queue Actor
//!
//! FIFO broker for one queue name, with blocking consumption.
//!
//! ## Hand-off
//!
//! Arriving work and arriving demand are matched immediately: a bundle offered while a
//! poller waits goes straight to that poller's deferred handle and never touches
//! storage, and a poller registering while bundles are stored takes the head bundle at
//! once. Stored bundles and waiting pollers therefore never coexist.
//!
//! ## Blocking without the lock
//!
//! `PollBundle` is a shared operation. It creates a deferred handle, registers it
//! through the exclusive `RegisterCallback`, and only then waits on the handle, so a
//! blocked poller never holds the queue's single-writer lock and producers are never
//! stalled behind it.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use super::messages::{
    AddBundle, GetQueueStats, PollBundle, PushBackBundle, RegisterCallback, SealQueue,
};
use crate::actors::{
    ExclusiveState, Handler, HandleId, KeyedActor, KeyedExecutor, PromiseRegistry,
};
use crate::constants::{events, kinds};
use crate::error::{BrokerError, BrokerResult};
use crate::models::{QueueState, QueueStats, TaskBundle};

/// Which end of the queue a stored bundle joins
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueEnd {
    /// Normal admission
    Tail,
    /// Push-back of recovered work, served before anything at the tail
    Head,
}

/// Handle addressing one named queue
///
/// Cheap to clone; all handles for the same name share the queue's durable state.
#[derive(Clone)]
pub struct QueueActor {
    name: String,
    executor: Arc<KeyedExecutor>,
    pollers: Arc<PromiseRegistry<TaskBundle>>,
}

impl fmt::Debug for QueueActor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueActor")
            .field("name", &self.name)
            .field("pending_handles", &self.pollers.pending_count())
            .finish()
    }
}

impl QueueActor {
    pub fn new(
        name: impl Into<String>,
        executor: Arc<KeyedExecutor>,
        pollers: Arc<PromiseRegistry<TaskBundle>>,
    ) -> Self {
        Self {
            name: name.into(),
            executor,
            pollers,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn add_bundle(&self, bundle: TaskBundle) -> BrokerResult<()> {
        self.handle(AddBundle { bundle }).await
    }

    pub async fn push_back_bundle(&self, bundle: TaskBundle) -> BrokerResult<()> {
        self.handle(PushBackBundle { bundle }).await
    }

    pub async fn poll_bundle(&self) -> BrokerResult<TaskBundle> {
        self.handle(PollBundle).await
    }

    pub async fn seal(&self) -> BrokerResult<()> {
        self.handle(SealQueue).await
    }

    pub async fn stats(&self) -> BrokerResult<QueueStats> {
        self.handle(GetQueueStats).await
    }

    async fn lock_state(&self) -> BrokerResult<ExclusiveState<QueueState>> {
        Ok(self.executor.exclusive::<QueueState>(&self.key()).await?)
    }

    /// Offer `bundle` to the oldest live poller, or store it at `end`.
    ///
    /// Pollers whose waiter has gone away are dropped and the bundle is offered to the
    /// next one. Each poller removal is committed before its handle is resolved, so a
    /// failed commit leaves the bundle undelivered rather than delivered twice.
    async fn enqueue(
        &self,
        state: &mut ExclusiveState<QueueState>,
        mut bundle: TaskBundle,
        end: QueueEnd,
    ) -> BrokerResult<()> {
        loop {
            let Some(handle_id) = state.pollers.pop_front() else {
                match end {
                    QueueEnd::Tail => state.queue.push_back(bundle),
                    QueueEnd::Head => state.queue.push_front(bundle),
                }
                state.commit().await?;
                debug!(
                    event = events::BUNDLE_ENQUEUED,
                    queue = %self.name,
                    end = ?end,
                    queued = state.queue.len(),
                    "Stored bundle"
                );
                return Ok(());
            };

            state.commit().await?;
            match self.pollers.resolve(handle_id, bundle) {
                Ok(()) => {
                    info!(
                        event = events::BUNDLE_HANDED_OFF,
                        queue = %self.name,
                        handle_id = %handle_id,
                        "Handed bundle to waiting poller"
                    );
                    return Ok(());
                }
                Err(returned) => {
                    warn!(
                        queue = %self.name,
                        handle_id = %handle_id,
                        "Skipping stale poller"
                    );
                    bundle = returned;
                }
            }
        }
    }
}

impl KeyedActor for QueueActor {
    fn kind(&self) -> &'static str {
        kinds::QUEUE
    }

    fn id(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl Handler<AddBundle> for QueueActor {
    #[instrument(skip(self, msg), fields(queue = %self.name, tasks = msg.bundle.task_count()))]
    async fn handle(&self, msg: AddBundle) -> BrokerResult<()> {
        let mut state = self.lock_state().await?;
        if state.closed {
            debug!(queue = %self.name, "Rejected bundle for sealed queue");
            return Err(BrokerError::queue_closed(&self.name));
        }
        self.enqueue(&mut state, msg.bundle, QueueEnd::Tail).await
    }
}

#[async_trait]
impl Handler<PushBackBundle> for QueueActor {
    #[instrument(skip(self, msg), fields(queue = %self.name, tasks = msg.bundle.task_count()))]
    async fn handle(&self, msg: PushBackBundle) -> BrokerResult<()> {
        let mut state = self.lock_state().await?;
        info!(
            event = events::BUNDLE_PUSHED_BACK,
            queue = %self.name,
            tasks = msg.bundle.task_count(),
            carried_results = msg.bundle.completed_resources.len(),
            "Returning bundle to queue head"
        );
        self.enqueue(&mut state, msg.bundle, QueueEnd::Head).await
    }
}

#[async_trait]
impl Handler<PollBundle> for QueueActor {
    async fn handle(&self, _msg: PollBundle) -> BrokerResult<TaskBundle> {
        let (handle_id, promise) = self.pollers.create();

        if let Err(e) = self.handle(RegisterCallback { handle_id }).await {
            self.pollers.reject(
                handle_id,
                BrokerError::Cancelled {
                    operation: "poll_bundle".to_string(),
                },
            );
            return Err(e);
        }

        debug!(queue = %self.name, handle_id = %handle_id, "Waiting for bundle");
        promise.wait().await
    }
}

#[async_trait]
impl Handler<RegisterCallback> for QueueActor {
    async fn handle(&self, msg: RegisterCallback) -> BrokerResult<()> {
        let handle_id: HandleId = msg.handle_id;
        let mut state = self.lock_state().await?;

        if let Some(bundle) = state.queue.pop_front() {
            state.commit().await?;
            if let Err(bundle) = self.pollers.resolve(handle_id, bundle) {
                warn!(
                    queue = %self.name,
                    handle_id = %handle_id,
                    "Poller gone before delivery, restoring bundle"
                );
                state.queue.push_front(bundle);
                state.commit().await?;
            } else {
                debug!(queue = %self.name, handle_id = %handle_id, "Delivered stored bundle");
            }
            return Ok(());
        }

        if state.closed {
            self.pollers
                .reject(handle_id, BrokerError::queue_closed(&self.name));
            return Ok(());
        }

        state.pollers.push_back(handle_id);
        state.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl Handler<SealQueue> for QueueActor {
    #[instrument(skip(self, _msg), fields(queue = %self.name))]
    async fn handle(&self, _msg: SealQueue) -> BrokerResult<()> {
        let mut state = self.lock_state().await?;
        state.closed = true;
        let waiting: Vec<HandleId> = state.pollers.drain(..).collect();
        state.commit().await?;

        for handle_id in &waiting {
            self.pollers
                .reject(*handle_id, BrokerError::queue_closed(&self.name));
        }

        info!(
            event = events::QUEUE_SEALED,
            queue = %self.name,
            rejected_pollers = waiting.len(),
            remaining_bundles = state.queue.len(),
            "Queue sealed"
        );
        Ok(())
    }
}

#[async_trait]
impl Handler<GetQueueStats> for QueueActor {
    async fn handle(&self, _msg: GetQueueStats) -> BrokerResult<QueueStats> {
        let state: QueueState = self.executor.snapshot(&self.key()).await?;
        Ok(state.stats())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actors::InMemoryStateStore;
    use crate::models::Task;
    use std::time::Duration;

    fn queue(name: &str) -> QueueActor {
        let executor = Arc::new(KeyedExecutor::new(Arc::new(InMemoryStateStore::new())));
        QueueActor::new(name, executor, Arc::new(PromiseRegistry::new()))
    }

    fn bundle(names: &[&str]) -> TaskBundle {
        TaskBundle::new(names.iter().map(|n| Task::new(*n, "noop")).collect())
    }

    async fn wait_for_pollers(queue: &QueueActor, expected: usize) {
        for _ in 0..100 {
            if queue.stats().await.unwrap().pollers == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("pollers never reached {expected}");
    }

    #[tokio::test]
    async fn test_stored_bundle_is_polled() {
        let queue = queue("render");
        let b1 = bundle(&["t1", "t2"]);

        queue.add_bundle(b1.clone()).await.unwrap();
        assert_eq!(queue.stats().await.unwrap().queued, 1);

        assert_eq!(queue.poll_bundle().await.unwrap(), b1);
        assert_eq!(queue.stats().await.unwrap().queued, 0);
    }

    #[tokio::test]
    async fn test_push_back_served_first() {
        let queue = queue("render");
        queue.add_bundle(bundle(&["new"])).await.unwrap();
        queue.push_back_bundle(bundle(&["recovered"])).await.unwrap();

        let first = queue.poll_bundle().await.unwrap();
        assert_eq!(first.tasks_to_run[0].name, "recovered");
    }

    #[tokio::test]
    async fn test_stale_poller_is_skipped() {
        let queue = queue("render");

        let abandoned = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.poll_bundle().await })
        };
        wait_for_pollers(&queue, 1).await;
        abandoned.abort();
        let _ = abandoned.await;

        queue.add_bundle(bundle(&["t1"])).await.unwrap();
        let stats = queue.stats().await.unwrap();
        assert_eq!(stats.pollers, 0);
        assert_eq!(stats.queued, 1);
    }

    #[tokio::test]
    async fn test_sealed_queue_rejects_new_pollers() {
        let queue = queue("render");
        queue.seal().await.unwrap();

        assert!(matches!(
            queue.poll_bundle().await,
            Err(BrokerError::QueueClosed { .. })
        ));
        assert_eq!(queue.stats().await.unwrap().pollers, 0);
    }
}
