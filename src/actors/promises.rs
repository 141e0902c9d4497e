//! # Promise Registry
//!
//! Deferred completion handles for blocking reads. A waiter creates a handle and awaits
//! its [`Promise`]; any other task can later resolve or reject the handle by id. Each
//! handle completes at most once.
//!
//! Handles are kept out of actor state: the state records only the [`HandleId`], so an
//! exclusive operation can resolve a waiter without the waiter holding the actor's lock.

use std::fmt;

use dashmap::DashMap;
use tokio::sync::oneshot;
use tracing::debug;
use uuid::Uuid;

use crate::error::{BrokerError, BrokerResult};

pub type HandleId = Uuid;

type Completion<T> = oneshot::Sender<BrokerResult<T>>;

pub struct PromiseRegistry<T> {
    pending: DashMap<HandleId, Completion<T>>,
}

impl<T> fmt::Debug for PromiseRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PromiseRegistry")
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl<T> Default for PromiseRegistry<T> {
    fn default() -> Self {
        Self {
            pending: DashMap::new(),
        }
    }
}

impl<T: Send + 'static> PromiseRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new deferred handle
    pub fn create(&self) -> (HandleId, Promise<T>) {
        let id = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, tx);
        (id, Promise { id, rx })
    }

    /// Complete a handle with a value.
    ///
    /// Hands the value back when the handle is unknown, already completed, or its
    /// waiter has gone away, so the caller can route it elsewhere.
    pub fn resolve(&self, id: HandleId, value: T) -> Result<(), T> {
        let Some((_, tx)) = self.pending.remove(&id) else {
            debug!(handle_id = %id, "Resolve for unknown handle");
            return Err(value);
        };

        match tx.send(Ok(value)) {
            Ok(()) => Ok(()),
            Err(Ok(value)) => {
                debug!(handle_id = %id, "Waiter gone before resolve");
                Err(value)
            }
            Err(Err(_)) => unreachable!("resolve only sends Ok values"),
        }
    }

    /// Complete a handle with an error. Returns whether a live waiter received it.
    pub fn reject(&self, id: HandleId, error: BrokerError) -> bool {
        match self.pending.remove(&id) {
            Some((_, tx)) => tx.send(Err(error)).is_ok(),
            None => false,
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

/// The waiting side of a deferred handle
#[derive(Debug)]
pub struct Promise<T> {
    id: HandleId,
    rx: oneshot::Receiver<BrokerResult<T>>,
}

impl<T> Promise<T> {
    pub fn id(&self) -> HandleId {
        self.id
    }

    /// Wait until the handle is resolved or rejected
    pub async fn wait(self) -> BrokerResult<T> {
        match self.rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(BrokerError::HandleDropped { handle_id: self.id }),
        }
    }
}
