//! # Effect Journal
//!
//! Idempotency log keyed by `(actor key, step id)`. A handler records the result of an
//! external side effect under a step id derived from its own state; when the same step
//! runs again after a crash, the recorded result is returned and the effect is not
//! repeated.
//!
//! All entries of one actor live in a single document so they can be cleared together
//! at a boundary (for worker trackers, the end of a bundle or a reset).

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use super::state_store::StateStore;
use super::traits::ActorKey;
use crate::constants::kinds;
use crate::error::StateStoreError;

#[derive(Debug, Clone)]
pub struct EffectJournal {
    store: Arc<dyn StateStore>,
}

impl EffectJournal {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    fn journal_key(key: &ActorKey) -> String {
        format!("{}/{}", kinds::JOURNAL, key)
    }

    async fn entries(&self, journal_key: &str) -> Result<Map<String, Value>, StateStoreError> {
        match self.store.load(journal_key).await? {
            Some(Value::Object(map)) => Ok(map),
            Some(_) => Err(StateStoreError::serialization(
                journal_key,
                "journal document is not an object",
            )),
            None => Ok(Map::new()),
        }
    }

    /// Recorded result of `step`, if it already ran
    pub async fn lookup<T: DeserializeOwned>(
        &self,
        key: &ActorKey,
        step: &str,
    ) -> Result<Option<T>, StateStoreError> {
        let journal_key = Self::journal_key(key);
        let entries = self.entries(&journal_key).await?;

        entries
            .get(step)
            .map(|value| {
                serde_json::from_value(value.clone())
                    .map_err(|e| StateStoreError::serialization(&journal_key, e.to_string()))
            })
            .transpose()
    }

    /// Record the result of `step`
    ///
    /// Callers must hold the actor's exclusive lock; the journal document is rewritten
    /// as a whole.
    pub async fn record<T: Serialize>(
        &self,
        key: &ActorKey,
        step: &str,
        result: &T,
    ) -> Result<(), StateStoreError> {
        let journal_key = Self::journal_key(key);
        let mut entries = self.entries(&journal_key).await?;
        let value = serde_json::to_value(result)
            .map_err(|e| StateStoreError::serialization(&journal_key, e.to_string()))?;

        entries.insert(step.to_string(), value);
        self.store.save(&journal_key, Value::Object(entries)).await?;
        debug!(key = %key, step = %step, "Recorded journal entry");
        Ok(())
    }

    /// Forget every entry of `key`
    pub async fn clear(&self, key: &ActorKey) -> Result<(), StateStoreError> {
        self.store.delete(&Self::journal_key(key)).await
    }
}
