//! # State Store
//!
//! Key/value persistence behind every durable actor. Values are JSON documents so one
//! backend can hold queue state, worker state and journals alike.

use std::fmt;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use crate::error::StateStoreError;

/// Backend-agnostic durable state storage
#[async_trait]
pub trait StateStore: Send + Sync + fmt::Debug {
    async fn load(&self, key: &str) -> Result<Option<Value>, StateStoreError>;

    async fn save(&self, key: &str, value: Value) -> Result<(), StateStoreError>;

    async fn delete(&self, key: &str) -> Result<(), StateStoreError>;
}

/// Process-local state store
///
/// State survives actor handles being dropped and recreated, but not the process.
#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    entries: DashMap<String, Value>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn load(&self, key: &str) -> Result<Option<Value>, StateStoreError> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn save(&self, key: &str, value: Value) -> Result<(), StateStoreError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StateStoreError> {
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_save_load_delete() {
        let store = InMemoryStateStore::new();
        assert!(store.load("queue/a").await.unwrap().is_none());

        store.save("queue/a", json!({"closed": true})).await.unwrap();
        assert_eq!(
            store.load("queue/a").await.unwrap(),
            Some(json!({"closed": true}))
        );
        assert_eq!(store.len(), 1);

        store.delete("queue/a").await.unwrap();
        assert!(store.load("queue/a").await.unwrap().is_none());
        assert!(store.is_empty());
    }
}
