//! # Core Actor Traits
//!
//! Foundational traits for the keyed actor pattern used by queues and worker trackers.
//!
//! ```text
//! Message ────→ Handler<M> on a KeyedActor ────→ KeyedExecutor (state for ActorKey)
//! ```
//!
//! Each actor instance is a cheap handle naming one key; the state behind the key lives
//! in the state store, so any number of handles for the same key act as one actor.

use std::fmt;

use async_trait::async_trait;

use crate::error::BrokerResult;

/// Address of one durable actor: its kind plus its id within that kind
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActorKey {
    pub kind: &'static str,
    pub id: String,
}

impl ActorKey {
    pub fn new(kind: &'static str, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

impl fmt::Display for ActorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

/// Base trait for keyed actors
pub trait KeyedActor: Send + Sync + 'static {
    /// Actor kind for logging and key namespacing
    fn kind(&self) -> &'static str;

    /// Id of the key this handle addresses
    fn id(&self) -> &str;

    fn key(&self) -> ActorKey {
        ActorKey::new(self.kind(), self.id())
    }
}

/// Marker trait for messages handled by actors
///
/// Defines the response type and ensures messages can cross task boundaries.
pub trait Message: Send + 'static {
    type Response: Send;
}

/// Message handler for one message type
///
/// ## Example
///
/// ```rust,ignore
/// #[async_trait]
/// impl Handler<SealQueue> for QueueActor {
///     async fn handle(&self, _msg: SealQueue) -> BrokerResult<()> {
///         // mutate queue state under the key's exclusive lock
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Handler<M: Message>: KeyedActor {
    async fn handle(&self, msg: M) -> BrokerResult<M::Response>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo {
        value: i32,
    }

    impl Message for Echo {
        type Response = String;
    }

    struct EchoActor {
        id: String,
    }

    impl KeyedActor for EchoActor {
        fn kind(&self) -> &'static str {
            "echo"
        }

        fn id(&self) -> &str {
            &self.id
        }
    }

    #[async_trait]
    impl Handler<Echo> for EchoActor {
        async fn handle(&self, msg: Echo) -> BrokerResult<String> {
            Ok(format!("{} received {}", self.key(), msg.value))
        }
    }

    #[tokio::test]
    async fn test_handler_dispatch() {
        let actor = EchoActor {
            id: "one".to_string(),
        };
        let response = actor.handle(Echo { value: 42 }).await.unwrap();
        assert_eq!(response, "echo/one received 42");
    }

    #[test]
    fn test_actor_key_display() {
        assert_eq!(ActorKey::new("queue", "orders").to_string(), "queue/orders");
    }

    #[test]
    fn test_message_trait_bounds() {
        fn assert_send<T: Send>() {}
        assert_send::<Echo>();
    }
}
