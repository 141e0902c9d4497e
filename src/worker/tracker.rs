//! # Worker Tracker
//!
//! Drives one external worker process through bundles of tasks pulled from one queue.
//!
//! ## Lifecycle
//!
//! ```text
//! NotStarted ──start_worker──→ Polling ──bundle──→ TaskDispatched ⇄ task_complete
//!      ↑                          ↑                        │
//!      │                          └──── finalize bundle ←──┘ (last task)
//!      │
//!      └──── report_failed (heartbeat misses, dispatch or persistence exhaustion)
//! ```
//!
//! The tracker is a continuous consumption loop driven by completion callbacks: the
//! last completion of a bundle persists its results, notifies the sink, and starts
//! polling for the next bundle. A heartbeat chain runs alongside, one per session.
//!
//! ## Locking
//!
//! Exclusive operations hold the worker key's lock while they mutate state and while
//! they persist results. The lock is released before waiting on the queue and before
//! handing a task to the process, since the process may call back before the dispatch
//! returns. Work received after the session it was polled for has ended goes back to
//! the queue head.

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::collaborators::{BundleCompletion, Collaborators};
use super::messages::{
    CheckpointResults, GetWorkerStatus, MakeHeartbeat, ReportFailed, StartWorker, TaskComplete,
};
use crate::actors::{
    EffectJournal, ExclusiveState, Handler, KeyedActor, KeyedExecutor, TimerService,
};
use crate::config::QueueConfig;
use crate::constants::{defaults, events, kinds};
use crate::error::{BrokerError, BrokerResult};
use crate::models::{TaskBundle, TaskResult, WorkerState, WorkerStatus};
use crate::queue::QueueBroker;
use crate::resilience::{retry_with_policy, RetryPolicy};

/// Timing and retry settings shared by trackers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerSettings {
    pub heartbeat_interval: Duration,
    pub miss_threshold: u32,
    pub dispatch: RetryPolicy,
    pub persistence: RetryPolicy,
    pub notification: RetryPolicy,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_millis(defaults::HEARTBEAT_INTERVAL_MS),
            miss_threshold: defaults::HEARTBEAT_MISS_THRESHOLD,
            dispatch: RetryPolicy::bounded(
                defaults::DISPATCH_MAX_ATTEMPTS,
                Duration::from_millis(defaults::DISPATCH_BACKOFF_MS),
            ),
            persistence: RetryPolicy::bounded(
                defaults::PERSIST_MAX_ATTEMPTS,
                Duration::from_millis(defaults::PERSIST_BACKOFF_MS),
            ),
            notification: RetryPolicy::unbounded(Duration::from_millis(
                defaults::NOTIFY_BACKOFF_MS,
            )),
        }
    }
}

impl From<&QueueConfig> for TrackerSettings {
    fn from(config: &QueueConfig) -> Self {
        Self {
            heartbeat_interval: config.heartbeat.interval(),
            miss_threshold: config.heartbeat.miss_threshold,
            dispatch: config.dispatch.policy(),
            persistence: config.persistence.policy(),
            notification: config.notification.policy(),
        }
    }
}

/// Shared runtime services a tracker is wired to
#[derive(Debug, Clone)]
pub struct TrackerContext {
    pub executor: Arc<KeyedExecutor>,
    pub queues: Arc<QueueBroker>,
    pub timers: Arc<TimerService>,
    pub collaborators: Collaborators,
    pub settings: TrackerSettings,
}

/// Outcome of taking ownership of a polled bundle
enum Received {
    Loaded(ExclusiveState<WorkerState>),
    /// The polling session ended; the bundle belongs back on the queue
    Stale(TaskBundle),
}

pub struct WorkerTracker {
    worker_id: String,
    context: TrackerContext,
    journal: EffectJournal,
    cancel: CancellationToken,
    self_ref: Weak<WorkerTracker>,
}

impl fmt::Debug for WorkerTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerTracker")
            .field("worker_id", &self.worker_id)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

impl WorkerTracker {
    pub fn new(worker_id: impl Into<String>, context: TrackerContext) -> Arc<Self> {
        let journal = EffectJournal::new(Arc::clone(context.executor.store()));
        let worker_id = worker_id.into();

        Arc::new_cyclic(|self_ref| Self {
            worker_id,
            context,
            journal,
            cancel: CancellationToken::new(),
            self_ref: self_ref.clone(),
        })
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Stop background activity: abandons the unbounded sink wait and ends the
    /// heartbeat chain.
    pub fn cancel(&self) {
        self.cancel.cancel();
        self.context.timers.cancel(&self.key().to_string());
        info!(worker_id = %self.worker_id, "Worker tracker cancelled");
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub async fn start_worker(
        &self,
        queue_name: impl Into<String>,
        worker_location: impl Into<String>,
    ) -> BrokerResult<()> {
        self.handle(StartWorker {
            queue_name: queue_name.into(),
            worker_location: worker_location.into(),
        })
        .await
    }

    pub async fn task_complete(&self, result: TaskResult) -> BrokerResult<()> {
        self.handle(TaskComplete { result }).await
    }

    pub async fn checkpoint_results(&self) -> BrokerResult<()> {
        self.handle(CheckpointResults).await
    }

    pub async fn report_failed(&self) -> BrokerResult<()> {
        self.handle(ReportFailed).await
    }

    pub async fn status(&self) -> BrokerResult<WorkerStatus> {
        self.handle(GetWorkerStatus).await
    }

    async fn lock_state(&self) -> BrokerResult<ExclusiveState<WorkerState>> {
        Ok(self.context.executor.exclusive::<WorkerState>(&self.key()).await?)
    }

    fn schedule_heartbeat(&self, session_id: Uuid, missed: u32) {
        if self.cancel.is_cancelled() {
            return;
        }
        let Some(this) = self.self_ref.upgrade() else {
            return;
        };
        self.context.timers.schedule(
            this,
            MakeHeartbeat { session_id, missed },
            self.context.settings.heartbeat_interval,
        );
    }

    /// Poll bundles for `session_id` until one has a task to dispatch
    async fn consume(&self, session_id: Uuid, queue_name: &str) -> BrokerResult<()> {
        let queue = self.context.queues.queue(queue_name);

        loop {
            let bundle = queue.poll_bundle().await?;

            let state = match self.receive(session_id, bundle).await {
                Ok(Received::Loaded(state)) => state,
                Ok(Received::Stale(bundle)) => {
                    warn!(
                        worker_id = %self.worker_id,
                        queue = %queue_name,
                        session_id = %session_id,
                        "Session ended while polling, returning bundle"
                    );
                    queue.push_back_bundle(bundle).await?;
                    return Ok(());
                }
                Err((e, bundle)) => {
                    error!(
                        worker_id = %self.worker_id,
                        queue = %queue_name,
                        error = %e,
                        "Could not take ownership of bundle, returning it to the queue"
                    );
                    queue.push_back_bundle(bundle).await?;
                    if let Err(recover_err) = self.recover(Some(session_id)).await {
                        warn!(
                            worker_id = %self.worker_id,
                            error = %recover_err,
                            "Recovery after failed bundle hand-off did not complete"
                        );
                    }
                    return Err(e);
                }
            };

            debug!(
                worker_id = %self.worker_id,
                queue = %queue_name,
                bundle_seq = state.bundle_seq,
                tasks = state.pending_tasks.len(),
                carried_results = state.persisted_tasks.len(),
                "Received bundle"
            );

            if !state.pending_tasks.is_empty() {
                drop(state);
                self.initiate_next_task(session_id).await?;
                return Ok(());
            }

            if self.finalize_bundle(state, session_id).await?.is_none() {
                return Ok(());
            }
        }
    }

    /// Commit a polled bundle into the worker state.
    ///
    /// The bundle is handed back on every path that does not commit it, so the caller
    /// can return it to the queue.
    async fn receive(
        &self,
        session_id: Uuid,
        bundle: TaskBundle,
    ) -> Result<Received, (BrokerError, TaskBundle)> {
        let mut state = match self.lock_state().await {
            Ok(state) => state,
            Err(e) => return Err((e, bundle)),
        };
        if self.cancel.is_cancelled() || !state.is_session(session_id) || !state.polling {
            return Ok(Received::Stale(bundle));
        }

        state.load_bundle(bundle.clone());
        match state.commit().await {
            Ok(()) => Ok(Received::Loaded(state)),
            Err(e) => Err((e.into(), bundle)),
        }
    }

    /// Continue consumption on a background task so completion callbacks return
    fn spawn_consumer(&self, session_id: Uuid, queue_name: String) {
        let Some(this) = self.self_ref.upgrade() else {
            return;
        };

        tokio::spawn(async move {
            if let Err(e) = this.consume(session_id, &queue_name).await {
                error!(
                    worker_id = %this.worker_id,
                    queue = %queue_name,
                    error = %e,
                    "Bundle consumption stopped"
                );
            }
        });
    }

    /// Hand the next pending task to the worker process.
    ///
    /// Returns `false` when there is nothing to dispatch. Dispatch exhaustion recovers
    /// the worker and returns the error.
    async fn initiate_next_task(&self, session_id: Uuid) -> BrokerResult<bool> {
        let (location, task) = {
            let mut state = self.lock_state().await?;
            if !state.is_session(session_id) || state.task_in_progress.is_some() {
                return Ok(false);
            }
            let Some(task) = state.pending_tasks.pop_front() else {
                debug!(worker_id = %self.worker_id, "Nothing to dispatch");
                return Ok(false);
            };
            state.task_in_progress = Some(task.clone());
            state.commit().await?;
            (state.worker_location.clone().unwrap_or_default(), task)
        };

        let process = &self.context.collaborators.process;
        let dispatched = retry_with_policy(
            "dispatch_task",
            &self.context.settings.dispatch,
            Some(&self.cancel),
            || process.dispatch(&location, &task),
        )
        .await;

        match dispatched {
            Ok(()) => {
                info!(
                    event = events::TASK_DISPATCHED,
                    worker_id = %self.worker_id,
                    task = %task.name,
                    location = %location,
                    "Dispatched task"
                );
                Ok(true)
            }
            Err(e) => {
                let err = e.into_broker_error();
                if matches!(err, BrokerError::RetriesExhausted { .. }) {
                    error!(
                        worker_id = %self.worker_id,
                        task = %task.name,
                        error = %err,
                        "Task dispatch failed, recovering worker"
                    );
                    self.recover(Some(session_id)).await?;
                }
                Err(err)
            }
        }
    }

    /// Persist completed results one at a time, oldest first.
    ///
    /// Each write is journaled by session, bundle and position, so a replayed
    /// checkpoint reuses the recorded locator instead of writing again.
    async fn checkpoint(&self, state: &mut ExclusiveState<WorkerState>) -> BrokerResult<()> {
        let key = self.key();
        let session = state.session_id.unwrap_or_default();

        while let Some(result) = state.completed_tasks.first().cloned() {
            let step = format!(
                "persist/{}/{}/{}",
                session,
                state.bundle_seq,
                state.persisted_tasks.len()
            );

            let locator = match self.journal.lookup::<String>(&key, &step).await? {
                Some(locator) => locator,
                None => {
                    let store = &self.context.collaborators.store;
                    let locator = retry_with_policy(
                        "persist_result",
                        &self.context.settings.persistence,
                        None,
                        || store.persist(&result),
                    )
                    .await
                    .map_err(|e| e.into_broker_error())?;
                    self.journal.record(&key, &step, &locator).await?;
                    locator
                }
            };

            debug!(
                worker_id = %self.worker_id,
                task = %result.task.name,
                locator = %locator,
                "Persisted result"
            );
            state.completed_tasks.remove(0);
            state.persisted_tasks.push(result.persisted_at(locator));
            state.commit().await?;
        }

        Ok(())
    }

    /// Close out the owned bundle and flip back to polling.
    ///
    /// Returns the queue to poll next, or `None` when the worker was recovered
    /// because its results could not be persisted.
    async fn finalize_bundle(
        &self,
        mut state: ExclusiveState<WorkerState>,
        session_id: Uuid,
    ) -> BrokerResult<Option<String>> {
        if let Err(e) = self.checkpoint(&mut state).await {
            error!(
                worker_id = %self.worker_id,
                error = %e,
                "Failed to persist bundle results, recovering worker"
            );
            drop(state);
            self.recover(Some(session_id)).await?;
            return Ok(None);
        }

        let queue_name = state.queue_name.clone().unwrap_or_default();

        if let Some(final_result) = state.persisted_tasks.last().cloned() {
            let completion = BundleCompletion {
                worker_id: self.worker_id.clone(),
                queue_name: queue_name.clone(),
                final_result,
                results: state.persisted_tasks.clone(),
                completed_at: Utc::now(),
            };
            let sink = &self.context.collaborators.sink;
            retry_with_policy(
                "notify_sink",
                &self.context.settings.notification,
                Some(&self.cancel),
                || sink.notify(&completion),
            )
            .await
            .map_err(|e| {
                warn!(
                    worker_id = %self.worker_id,
                    error = %e,
                    "Abandoned final result notification"
                );
                e.into_broker_error()
            })?;
        }

        let results = state.persisted_tasks.len();
        state.clear_bundle();
        state.polling = true;
        state.commit().await?;
        self.clear_journal().await;

        info!(
            event = events::BUNDLE_FINALIZED,
            worker_id = %self.worker_id,
            queue = %queue_name,
            bundle_seq = state.bundle_seq,
            results,
            "Bundle complete"
        );
        Ok(Some(queue_name))
    }

    /// Drop journal entries once the state they guarded is committed.
    ///
    /// Step ids carry the session and bundle sequence, so a leftover entry never matches a
    /// later step and a failed clear only leaves garbage behind.
    async fn clear_journal(&self) {
        if let Err(e) = self.journal.clear(&self.key()).await {
            warn!(worker_id = %self.worker_id, error = %e, "Failed to clear effect journal");
        }
    }

    /// Return unfinished work to the queue head and reset to `NotStarted`.
    ///
    /// With `expected_session` set, only that session is recovered; a newer session
    /// is left alone.
    async fn recover(&self, expected_session: Option<Uuid>) -> BrokerResult<()> {
        let mut state = self.lock_state().await?;
        if !state.is_started() {
            debug!(worker_id = %self.worker_id, "Worker not started, nothing to recover");
            return Ok(());
        }
        if let Some(session_id) = expected_session {
            if !state.is_session(session_id) {
                debug!(
                    worker_id = %self.worker_id,
                    session_id = %session_id,
                    "Session already ended"
                );
                return Ok(());
            }
        }

        let queue_name = state.queue_name.clone().unwrap_or_default();
        let location = state.worker_location.clone();
        let recovered = state.recovery_bundle();

        if recovered.task_count() > 0 || !recovered.completed_resources.is_empty() {
            self.context
                .queues
                .queue(&queue_name)
                .push_back_bundle(recovered.clone())
                .await?;
        }

        *state = WorkerState::default();
        state.commit().await?;
        self.clear_journal().await;
        drop(state);

        warn!(
            event = events::WORKER_FAILED,
            worker_id = %self.worker_id,
            queue = %queue_name,
            requeued_tasks = recovered.task_count(),
            carried_results = recovered.completed_resources.len(),
            "Worker failed, unfinished work returned to queue"
        );

        if let Some(location) = location {
            if let Err(e) = self.context.collaborators.process.teardown(&location).await {
                warn!(
                    worker_id = %self.worker_id,
                    location = %location,
                    error = %e,
                    "Teardown of failed worker process did not complete"
                );
            }
        }

        Ok(())
    }
}

impl KeyedActor for WorkerTracker {
    fn kind(&self) -> &'static str {
        kinds::WORKER
    }

    fn id(&self) -> &str {
        &self.worker_id
    }
}

#[async_trait]
impl Handler<StartWorker> for WorkerTracker {
    #[instrument(skip(self, msg), fields(worker_id = %self.worker_id, queue = %msg.queue_name))]
    async fn handle(&self, msg: StartWorker) -> BrokerResult<()> {
        let session_id = {
            let mut state = self.lock_state().await?;
            if state.is_started() {
                return Err(BrokerError::already_started(&self.worker_id));
            }

            let session_id = Uuid::new_v4();
            *state = WorkerState {
                queue_name: Some(msg.queue_name.clone()),
                worker_location: Some(msg.worker_location.clone()),
                session_id: Some(session_id),
                polling: true,
                ..WorkerState::default()
            };
            state.commit().await?;
            session_id
        };

        info!(
            event = events::WORKER_STARTED,
            worker_id = %self.worker_id,
            queue = %msg.queue_name,
            location = %msg.worker_location,
            session_id = %session_id,
            "Worker started"
        );

        self.schedule_heartbeat(session_id, 0);
        self.consume(session_id, &msg.queue_name).await
    }
}

#[async_trait]
impl Handler<TaskComplete> for WorkerTracker {
    #[instrument(skip(self, msg), fields(worker_id = %self.worker_id, task = %msg.result.task.name))]
    async fn handle(&self, msg: TaskComplete) -> BrokerResult<()> {
        let session_id = {
            let mut state = self.lock_state().await?;
            let in_progress = state.task_in_progress.as_ref() == Some(&msg.result.task);
            let Some(session_id) = state.session_id.filter(|_| in_progress) else {
                warn!(
                    worker_id = %self.worker_id,
                    task = %msg.result.task.name,
                    "Ignoring completion for a task that is not in progress"
                );
                return Ok(());
            };

            state.task_in_progress = None;
            state.completed_tasks.push(msg.result);
            state.commit().await?;
            info!(
                event = events::TASK_COMPLETED,
                worker_id = %self.worker_id,
                completed = state.completed_tasks.len(),
                pending = state.pending_tasks.len(),
                "Task completed"
            );

            if state.pending_tasks.is_empty() {
                if let Some(queue_name) = self.finalize_bundle(state, session_id).await? {
                    self.spawn_consumer(session_id, queue_name);
                }
                return Ok(());
            }
            session_id
        };

        self.initiate_next_task(session_id).await.map(|_| ())
    }
}

#[async_trait]
impl Handler<CheckpointResults> for WorkerTracker {
    #[instrument(skip(self, _msg), fields(worker_id = %self.worker_id))]
    async fn handle(&self, _msg: CheckpointResults) -> BrokerResult<()> {
        let mut state = self.lock_state().await?;
        if !state.is_started() {
            return Ok(());
        }
        self.checkpoint(&mut state).await
    }
}

#[async_trait]
impl Handler<ReportFailed> for WorkerTracker {
    async fn handle(&self, _msg: ReportFailed) -> BrokerResult<()> {
        self.recover(None).await
    }
}

#[async_trait]
impl Handler<MakeHeartbeat> for WorkerTracker {
    async fn handle(&self, msg: MakeHeartbeat) -> BrokerResult<()> {
        let state: WorkerState = self.context.executor.snapshot(&self.key()).await?;
        let location = match (&state.worker_location, state.is_session(msg.session_id)) {
            (Some(location), true) => location.clone(),
            _ => {
                debug!(
                    worker_id = %self.worker_id,
                    session_id = %msg.session_id,
                    "Heartbeat chain ended"
                );
                return Ok(());
            }
        };

        match self.context.collaborators.process.probe(&location).await {
            Ok(()) => {
                self.schedule_heartbeat(msg.session_id, 0);
                Ok(())
            }
            Err(e) => {
                let missed = msg.missed + 1;
                let threshold = self.context.settings.miss_threshold;
                warn!(
                    event = events::HEARTBEAT_MISSED,
                    worker_id = %self.worker_id,
                    location = %location,
                    missed,
                    threshold,
                    error = %e,
                    "Heartbeat missed"
                );

                if missed >= threshold {
                    self.recover(Some(msg.session_id)).await
                } else {
                    self.schedule_heartbeat(msg.session_id, missed);
                    Ok(())
                }
            }
        }
    }
}

#[async_trait]
impl Handler<GetWorkerStatus> for WorkerTracker {
    async fn handle(&self, _msg: GetWorkerStatus) -> BrokerResult<WorkerStatus> {
        let state: WorkerState = self.context.executor.snapshot(&self.key()).await?;
        Ok(state.status(&self.worker_id))
    }
}
