#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Tasker Queue
//!
//! Durable bundle queues and heartbeat-supervised worker trackers for external task
//! processes.
//!
//! ## Overview
//!
//! Producers add bundles of tasks to named queues. A worker tracker per worker pulls
//! bundles from one queue, hands their tasks one at a time to an external worker
//! process, checkpoints the results the process reports, and heartbeats the process.
//! When the process stops answering, the tracker pushes its unfinished work back to
//! the head of the queue and resets, so no work is silently lost.
//!
//! ## Module Organization
//!
//! - [`actors`] - Keyed single-writer execution, deferred handles, effect journal, timers
//! - [`queue`] - Per-name FIFO broker with blocking, lock-free polling
//! - [`worker`] - Worker tracker state machine and its collaborators
//! - [`models`] - Tasks, bundles and durable queue/worker state
//! - [`resilience`] - Bounded and unbounded retry
//! - [`config`] - Layered configuration
//! - [`bootstrap`] - System wiring from configuration
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tasker_queue::bootstrap::QueueSystem;
//! use tasker_queue::config::ConfigManager;
//! use tasker_queue::models::{Task, TaskBundle};
//! use tasker_queue::worker::Collaborators;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! tasker_queue::logging::init_structured_logging();
//! let manager = ConfigManager::load()?;
//! let system = QueueSystem::from_config(manager.config(), Collaborators::in_memory()).await?;
//!
//! system
//!     .queue("render")
//!     .add_bundle(TaskBundle::new(vec![Task::new("frame-1", "render --frame 1")]))
//!     .await?;
//!
//! // Blocks until the first bundle is handed off and its first task dispatched
//! system.worker("worker-1").start_worker("render", "local://worker-1").await?;
//! # Ok(())
//! # }
//! ```

pub mod actors;
pub mod bootstrap;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod models;
pub mod queue;
pub mod resilience;
pub mod worker;

pub use bootstrap::QueueSystem;
pub use config::{ConfigManager, QueueConfig};
pub use error::{BrokerError, BrokerResult};
pub use models::{Task, TaskBundle, TaskResult};
pub use queue::{QueueActor, QueueBroker};
pub use worker::{WorkerRegistry, WorkerTracker};
