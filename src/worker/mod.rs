//! # Worker Trackers
//!
//! Per-worker state machines that pull bundles from a queue, dispatch their tasks one
//! at a time to an external process, checkpoint results, and recover unfinished work
//! when the process stops answering heartbeats.

pub mod collaborators;
pub mod messages;
pub mod registry;
pub mod tracker;

pub use collaborators::{
    BundleCompletion, Collaborators, InMemoryResultStore, InMemoryWorkerProcess, RecordingSink,
    ResultSink, ResultStore, WorkerProcess,
};
pub use messages::{
    CheckpointResults, GetWorkerStatus, MakeHeartbeat, ReportFailed, StartWorker, TaskComplete,
};
pub use registry::WorkerRegistry;
pub use tracker::{TrackerContext, TrackerSettings, WorkerTracker};
