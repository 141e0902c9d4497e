//! # System Bootstrap
//!
//! Wires the state store, key executor, timer service, queue broker and worker
//! registry from a [`QueueConfig`].
//!
//! ```rust,no_run
//! use tasker_queue::bootstrap::QueueSystem;
//! use tasker_queue::config::QueueConfig;
//! use tasker_queue::worker::Collaborators;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let system = QueueSystem::from_config(&QueueConfig::default(), Collaborators::in_memory()).await?;
//! let queue = system.queue("render");
//! let tracker = system.worker("worker-1");
//! # let _ = (queue, tracker);
//! system.shutdown();
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use tracing::info;

use crate::actors::{InMemoryStateStore, KeyedExecutor, StateStore, TimerService};
use crate::config::{QueueConfig, StateStoreBackend};
use crate::error::{BrokerResult, ConfigurationError};
use crate::queue::{QueueActor, QueueBroker};
use crate::worker::{Collaborators, TrackerContext, TrackerSettings, WorkerRegistry, WorkerTracker};

#[derive(Debug)]
pub struct QueueSystem {
    store: Arc<dyn StateStore>,
    timers: Arc<TimerService>,
    queues: Arc<QueueBroker>,
    workers: WorkerRegistry,
}

impl QueueSystem {
    pub async fn from_config(
        config: &QueueConfig,
        collaborators: Collaborators,
    ) -> BrokerResult<Self> {
        config.validate()?;
        let store = build_state_store(config).await?;
        let system = Self::with_store(store, TrackerSettings::from(config), collaborators);

        info!(
            state_store = %config.state_store.backend,
            heartbeat_interval_ms = config.heartbeat.interval_ms,
            miss_threshold = config.heartbeat.miss_threshold,
            "Queue system started"
        );
        Ok(system)
    }

    /// Build on an existing state store
    pub fn with_store(
        store: Arc<dyn StateStore>,
        settings: TrackerSettings,
        collaborators: Collaborators,
    ) -> Self {
        let executor = Arc::new(KeyedExecutor::new(Arc::clone(&store)));
        let timers = Arc::new(TimerService::new());
        let queues = Arc::new(QueueBroker::new(Arc::clone(&executor)));

        let workers = WorkerRegistry::new(TrackerContext {
            executor,
            queues: Arc::clone(&queues),
            timers: Arc::clone(&timers),
            collaborators,
            settings,
        });

        Self {
            store,
            timers,
            queues,
            workers,
        }
    }

    pub fn queue(&self, name: &str) -> Arc<QueueActor> {
        self.queues.queue(name)
    }

    pub fn worker(&self, worker_id: &str) -> Arc<WorkerTracker> {
        self.workers.tracker(worker_id)
    }

    pub fn queues(&self) -> &Arc<QueueBroker> {
        &self.queues
    }

    pub fn workers(&self) -> &WorkerRegistry {
        &self.workers
    }

    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    /// Cancel every tracker and abort pending timers
    pub fn shutdown(&self) {
        self.workers.cancel_all();
        self.timers.shutdown();
        info!("Queue system shut down");
    }
}

async fn build_state_store(config: &QueueConfig) -> BrokerResult<Arc<dyn StateStore>> {
    match config.state_store.backend {
        StateStoreBackend::Memory => Ok(Arc::new(InMemoryStateStore::new())),
        StateStoreBackend::Postgres => build_postgres_store(config).await,
    }
}

#[cfg(feature = "postgres")]
async fn build_postgres_store(config: &QueueConfig) -> BrokerResult<Arc<dyn StateStore>> {
    use crate::actors::PgStateStore;

    let url = config
        .state_store
        .database_url
        .as_deref()
        .ok_or_else(|| ConfigurationError::missing_required("state_store.database_url"))?;

    let store = PgStateStore::connect(url).await?;
    store.ensure_schema().await?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "postgres"))]
async fn build_postgres_store(_config: &QueueConfig) -> BrokerResult<Arc<dyn StateStore>> {
    Err(ConfigurationError::invalid_value(
        "state_store.backend",
        "postgres backend requires the `postgres` feature",
    )
    .into())
}
