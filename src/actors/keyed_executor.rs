//! # Keyed Executor
//!
//! Key-striped single-writer scheduling. Each [`ActorKey`] has its own async mutex;
//! exclusive operations hold it for their whole duration, including the state write
//! back, so operations on one key never interleave while distinct keys run in parallel.
//!
//! ```rust,ignore
//! let mut state = executor.exclusive::<QueueState>(&key).await?;
//! state.closed = true;
//! state.commit().await?;
//! // lock released when `state` drops
//! ```

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::trace;

use super::state_store::StateStore;
use super::traits::ActorKey;
use crate::error::StateStoreError;

/// Typed actor state, created as `Default` on first access
pub trait ActorState: Default + Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> ActorState for T where T: Default + Serialize + DeserializeOwned + Send + Sync + 'static {}

#[derive(Debug)]
pub struct KeyedExecutor {
    store: Arc<dyn StateStore>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl KeyedExecutor {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self {
            store,
            locks: DashMap::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    /// Acquire the key's single-writer lock and load its state
    pub async fn exclusive<S: ActorState>(
        &self,
        key: &ActorKey,
    ) -> Result<ExclusiveState<S>, StateStoreError> {
        let storage_key = key.to_string();
        let lock = self
            .locks
            .entry(storage_key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let guard = lock.lock_owned().await;
        trace!(key = %storage_key, "Acquired exclusive lock");

        let state = load_state(self.store.as_ref(), &storage_key).await?;

        Ok(ExclusiveState {
            storage_key,
            state,
            store: Arc::clone(&self.store),
            _guard: guard,
        })
    }

    /// Read the last committed state without taking the key's lock
    pub async fn snapshot<S: ActorState>(&self, key: &ActorKey) -> Result<S, StateStoreError> {
        load_state(self.store.as_ref(), &key.to_string()).await
    }
}

async fn load_state<S: ActorState>(
    store: &dyn StateStore,
    storage_key: &str,
) -> Result<S, StateStoreError> {
    match store.load(storage_key).await? {
        Some(value) => serde_json::from_value(value)
            .map_err(|e| StateStoreError::serialization(storage_key, e.to_string())),
        None => Ok(S::default()),
    }
}

/// State of one key, held under its exclusive lock
///
/// Mutations become durable only on [`commit`](ExclusiveState::commit); dropping the
/// guard without committing discards them.
pub struct ExclusiveState<S: ActorState> {
    storage_key: String,
    state: S,
    store: Arc<dyn StateStore>,
    _guard: OwnedMutexGuard<()>,
}

impl<S: ActorState> ExclusiveState<S> {
    /// Write the current state back. May be called more than once.
    pub async fn commit(&mut self) -> Result<(), StateStoreError> {
        let value = serde_json::to_value(&self.state)
            .map_err(|e| StateStoreError::serialization(&self.storage_key, e.to_string()))?;
        self.store.save(&self.storage_key, value).await?;
        trace!(key = %self.storage_key, "Committed actor state");
        Ok(())
    }

    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }
}

impl<S: ActorState> Deref for ExclusiveState<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.state
    }
}

impl<S: ActorState> DerefMut for ExclusiveState<S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.state
    }
}
