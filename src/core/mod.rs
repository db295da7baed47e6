//! The task tracker: "accepted, check back later" semantics for long work.
//!
//! [`TaskTracker`] owns the task store and the engine that moves tasks through
//! `pending → processing → completed | failed` off the caller's path.

use crate::config::PawpalConfig;
use crate::error::{PawpalError, PawpalResult};
use crate::store::{InMemoryTaskStore, TaskStore, TrackerStats};
use crate::task::{Task, TaskHandler, TaskId, TaskStatus};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

pub mod engine;
pub mod registry;
pub mod worker;

pub use engine::{INTERRUPTED_MESSAGE, TrackerEngine, sweep_expired};
pub use registry::{HandlerRegistry, SimulatedWork, TaskTypeStats};
pub use worker::{TaskOutcome, Worker, WorkerStatsSnapshot};

/// Registers deferred work and reports its status.
///
/// `register`, `get` and `result` are synchronous and never wait on the work
/// itself. Processing starts once [`start`](Self::start) has been called;
/// tasks registered earlier wait in `pending`.
///
/// # Examples
///
/// ```rust
/// use pawpal_core::prelude::*;
/// use serde_json::json;
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() -> PawpalResult<()> {
///     let tracker = TaskTracker::new(PawpalConfig::testing())?;
///     tracker.start().await?;
///
///     let id = tracker.register("bulk_import_users", json!({ "userCount": 5 }))?;
///     let task = tracker.require(&id)?;
///     assert_eq!(task.status, TaskStatus::Pending);
///
///     tracker.shutdown().await?;
///     Ok(())
/// }
/// ```
pub struct TaskTracker {
    config: PawpalConfig,
    store: Arc<dyn TaskStore>,
    handler: Arc<dyn TaskHandler>,
    task_tx: mpsc::UnboundedSender<TaskId>,
    /// Handed to the engine on start
    task_rx: Mutex<Option<mpsc::UnboundedReceiver<TaskId>>>,
    engine: tokio::sync::Mutex<Option<TrackerEngine>>,
}

impl TaskTracker {
    /// Create a tracker with an in-memory store and simulated work for every task type.
    pub fn new(config: PawpalConfig) -> PawpalResult<Self> {
        let handler = Arc::new(HandlerRegistry::simulated(&config.workers));
        Self::with_parts(config, Arc::new(InMemoryTaskStore::new()), handler)
    }

    /// Create a tracker with a custom handler and the in-memory store.
    pub fn with_handler(
        config: PawpalConfig,
        handler: Arc<dyn TaskHandler>,
    ) -> PawpalResult<Self> {
        Self::with_parts(config, Arc::new(InMemoryTaskStore::new()), handler)
    }

    /// Create a tracker from explicit parts.
    pub fn with_parts(
        config: PawpalConfig,
        store: Arc<dyn TaskStore>,
        handler: Arc<dyn TaskHandler>,
    ) -> PawpalResult<Self> {
        config
            .validate()
            .map_err(|errors| PawpalError::config(errors.join("; ")))?;

        let (task_tx, task_rx) = mpsc::unbounded_channel();
        Ok(Self {
            config,
            store,
            handler,
            task_tx,
            task_rx: Mutex::new(Some(task_rx)),
            engine: tokio::sync::Mutex::new(None),
        })
    }

    /// Start processing tasks. A tracker can be started once.
    pub async fn start(&self) -> PawpalResult<()> {
        let mut engine_guard = self.engine.lock().await;
        if engine_guard.is_some() {
            return Err(PawpalError::AlreadyRunning);
        }

        let task_rx = self.task_rx.lock()?.take().ok_or(PawpalError::ShutDown)?;

        let mut engine = TrackerEngine::new(
            self.config.clone(),
            Arc::clone(&self.store),
            Arc::clone(&self.handler),
        );
        engine.start(task_rx)?;
        *engine_guard = Some(engine);

        Ok(())
    }

    /// Stop processing, waiting up to the shutdown timeout for in-flight tasks.
    pub async fn shutdown(&self) -> PawpalResult<()> {
        let mut engine_guard = self.engine.lock().await;
        let Some(mut engine) = engine_guard.take() else {
            return Err(PawpalError::NotRunning);
        };

        engine.shutdown().await?;
        Ok(())
    }

    /// Check if the tracker is currently processing tasks.
    pub async fn is_running(&self) -> bool {
        self.engine.lock().await.is_some()
    }

    /// Register a unit of work and return its id immediately.
    ///
    /// The task starts out `pending`. `input` is stored as given and handed to
    /// the handler; the tracker does not validate it.
    pub fn register(
        &self,
        task_type: impl Into<String>,
        input: serde_json::Value,
    ) -> PawpalResult<TaskId> {
        let task = Task::new(task_type, input);
        let task_type = task.task_type.clone();
        let task_id = self.store.insert(task)?;

        if self.task_tx.send(task_id.clone()).is_err() {
            // the engine has shut down and will never pick this task up
            self.store.remove(&task_id)?;
            return Err(PawpalError::NotRunning);
        }

        tracing::debug!("Task registered: {} (type: {})", task_id, task_type);
        Ok(task_id)
    }

    /// Register work described by any serializable payload.
    pub fn register_payload<T: Serialize>(
        &self,
        task_type: impl Into<String>,
        payload: &T,
    ) -> PawpalResult<TaskId> {
        let input = serde_json::to_value(payload)?;
        self.register(task_type, input)
    }

    /// Current snapshot of a task, or `None` if unknown or already reclaimed.
    pub fn get(&self, task_id: &str) -> PawpalResult<Option<Task>> {
        self.store.get(task_id)
    }

    /// Like [`get`](Self::get), with absence reported as `NotFound`.
    pub fn require(&self, task_id: &str) -> PawpalResult<Task> {
        self.get(task_id)?
            .ok_or_else(|| PawpalError::not_found(task_id))
    }

    /// The task's result, available only once it is `completed`.
    pub fn result(&self, task_id: &str) -> PawpalResult<serde_json::Value> {
        let task = self.require(task_id)?;
        match (task.status, task.result) {
            (TaskStatus::Completed, Some(result)) => Ok(result),
            (status, _) => Err(PawpalError::NotCompleted {
                id: task.id,
                status,
            }),
        }
    }

    /// Run one retention pass now, returning how many tasks were reclaimed.
    pub fn sweep(&self) -> PawpalResult<u64> {
        sweep_expired(self.store.as_ref(), self.config.tracker.retention())
    }

    /// Get task counts per status.
    pub fn stats(&self) -> PawpalResult<TrackerStats> {
        self.store.stats()
    }

    /// Get worker statistics (if running).
    pub async fn worker_stats(&self) -> Option<WorkerStatsSnapshot> {
        let engine_guard = self.engine.lock().await;
        engine_guard.as_ref().map(TrackerEngine::worker_stats)
    }

    /// Get the configuration used by this tracker.
    pub fn config(&self) -> &PawpalConfig {
        &self.config
    }
}
