#![allow(dead_code)] // Each test binary uses a different subset of these helpers

pub mod strategies;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tasker_queue::actors::{InMemoryStateStore, StateStore};
use tasker_queue::error::StateStoreError;
use tasker_queue::bootstrap::QueueSystem;
use tasker_queue::models::{Task, TaskBundle, TaskResult};
use tasker_queue::queue::QueueActor;
use tasker_queue::resilience::RetryPolicy;
use tasker_queue::worker::{
    Collaborators, InMemoryResultStore, InMemoryWorkerProcess, RecordingSink, TrackerSettings,
};

pub const LOCATION: &str = "local://worker-1";

/// A queue system on in-memory collaborators that tests can inspect
pub struct Harness {
    pub system: QueueSystem,
    pub process: Arc<InMemoryWorkerProcess>,
    pub store: Arc<InMemoryResultStore>,
    pub sink: Arc<RecordingSink>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(fast_settings())
    }

    pub fn with_settings(settings: TrackerSettings) -> Self {
        Self::with_store(Arc::new(InMemoryStateStore::new()), settings)
    }

    pub fn with_store(store: Arc<dyn StateStore>, settings: TrackerSettings) -> Self {
        let process = Arc::new(InMemoryWorkerProcess::new());
        let results = Arc::new(InMemoryResultStore::new());
        let sink = Arc::new(RecordingSink::new());

        let collaborators = Collaborators::new(process.clone(), results.clone(), sink.clone());
        let system = QueueSystem::with_store(store, settings, collaborators);

        Self {
            system,
            process,
            store: results,
            sink,
        }
    }
}

/// Default heartbeat timing with short retry backoff
pub fn fast_settings() -> TrackerSettings {
    TrackerSettings {
        heartbeat_interval: Duration::from_secs(10),
        miss_threshold: 5,
        dispatch: RetryPolicy::bounded(5, Duration::from_millis(10)),
        persistence: RetryPolicy::bounded(5, Duration::from_millis(10)),
        notification: RetryPolicy::unbounded(Duration::from_millis(10)),
    }
}

pub fn task(name: &str) -> Task {
    Task::new(name, format!("run {name}"))
}

pub fn bundle(names: &[&str]) -> TaskBundle {
    TaskBundle::new(names.iter().map(|name| task(name)).collect())
}

/// Local, unpersisted result for `name`
pub fn result_for(name: &str) -> TaskResult {
    TaskResult::new(task(name), format!("/tmp/out/{name}"))
}

pub fn task_names(bundle: &TaskBundle) -> Vec<String> {
    bundle.tasks_to_run.iter().map(|t| t.name.clone()).collect()
}

/// Poll `condition` until it holds, failing the test after a bounded wait
pub async fn wait_until<F, Fut>(description: &str, mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..400 {
        if condition().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for: {description}");
}

/// Wait until `queue` has exactly `expected` registered pollers
pub async fn wait_for_pollers(queue: &QueueActor, expected: usize) {
    for _ in 0..400 {
        if queue.stats().await.unwrap().pollers == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("queue {} never reached {expected} pollers", queue.name());
}

/// State store that fails selected operations for keys under a prefix
#[derive(Debug, Default)]
pub struct FlakyStateStore {
    inner: InMemoryStateStore,
    failing_loads: Mutex<Option<String>>,
    failing_saves: Mutex<Option<String>>,
    failing_deletes: Mutex<Option<String>>,
}

impl FlakyStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_loads(&self, prefix: Option<&str>) {
        *self.failing_loads.lock() = prefix.map(str::to_string);
    }

    pub fn fail_saves(&self, prefix: Option<&str>) {
        *self.failing_saves.lock() = prefix.map(str::to_string);
    }

    pub fn fail_deletes(&self, prefix: Option<&str>) {
        *self.failing_deletes.lock() = prefix.map(str::to_string);
    }

    fn check(rule: &Mutex<Option<String>>, operation: &str, key: &str) -> Result<(), StateStoreError> {
        match rule.lock().as_deref() {
            Some(prefix) if key.starts_with(prefix) => {
                Err(StateStoreError::backend(operation, "connection reset"))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl StateStore for FlakyStateStore {
    async fn load(&self, key: &str) -> Result<Option<Value>, StateStoreError> {
        Self::check(&self.failing_loads, "load", key)?;
        self.inner.load(key).await
    }

    async fn save(&self, key: &str, value: Value) -> Result<(), StateStoreError> {
        Self::check(&self.failing_saves, "save", key)?;
        self.inner.save(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<(), StateStoreError> {
        Self::check(&self.failing_deletes, "delete", key)?;
        self.inner.delete(key).await
    }
}
