//! # Queue Broker
//!
//! Registry of named queues. Queues are created lazily on first access and share one
//! key executor and one deferred-handle registry.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use super::actor::QueueActor;
use crate::actors::{KeyedExecutor, PromiseRegistry};
use crate::models::TaskBundle;

pub struct QueueBroker {
    executor: Arc<KeyedExecutor>,
    pollers: Arc<PromiseRegistry<TaskBundle>>,
    queues: DashMap<String, Arc<QueueActor>>,
}

impl fmt::Debug for QueueBroker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueBroker")
            .field("queues", &self.queues.len())
            .field("pending_polls", &self.pollers.pending_count())
            .finish()
    }
}

impl QueueBroker {
    pub fn new(executor: Arc<KeyedExecutor>) -> Self {
        Self {
            executor,
            pollers: Arc::new(PromiseRegistry::new()),
            queues: DashMap::new(),
        }
    }

    /// Handle for the queue called `name`
    pub fn queue(&self, name: &str) -> Arc<QueueActor> {
        if let Some(queue) = self.queues.get(name) {
            return Arc::clone(queue.value());
        }

        self.queues
            .entry(name.to_string())
            .or_insert_with(|| {
                debug!(queue = %name, "Creating queue handle");
                Arc::new(QueueActor::new(
                    name,
                    Arc::clone(&self.executor),
                    Arc::clone(&self.pollers),
                ))
            })
            .clone()
    }

    /// Names of queues accessed through this broker
    pub fn queue_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.queues.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Polls currently blocked across all queues
    pub fn pending_polls(&self) -> usize {
        self.pollers.pending_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actors::InMemoryStateStore;
    use crate::models::Task;

    fn broker() -> QueueBroker {
        QueueBroker::new(Arc::new(KeyedExecutor::new(Arc::new(
            InMemoryStateStore::new(),
        ))))
    }

    #[tokio::test]
    async fn test_handles_share_state() {
        let broker = broker();
        let bundle = TaskBundle::new(vec![Task::new("t1", "noop")]);

        broker.queue("render").add_bundle(bundle.clone()).await.unwrap();
        assert_eq!(broker.queue("render").poll_bundle().await.unwrap(), bundle);
    }

    #[tokio::test]
    async fn test_queues_are_independent() {
        let broker = broker();
        broker.queue("a").seal().await.unwrap();

        let bundle = TaskBundle::new(vec![Task::new("t1", "noop")]);
        assert!(broker.queue("a").add_bundle(bundle.clone()).await.is_err());
        assert!(broker.queue("b").add_bundle(bundle).await.is_ok());
        assert_eq!(broker.queue_names(), vec!["a".to_string(), "b".to_string()]);
    }
}
