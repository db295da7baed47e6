//! The tracker engine: dispatcher and retention sweeper.
//!
//! - The dispatcher receives ids from `register`, bounds concurrency with a
//!   semaphore of `num_workers` permits, and hands each task to a [`Worker`].
//! - The sweeper wakes every `sweep_interval_secs` and drops completed tasks
//!   older than `retention_secs`.
//!
//! Both loops stop when the engine's `CancellationToken` fires. The same token
//! (as child tokens) reaches every handler through its `TaskContext`.

use crate::config::{DurationExt, PawpalConfig};
use crate::core::worker::{Worker, WorkerStats, WorkerStatsSnapshot};
use crate::error::{PawpalError, PawpalResult};
use crate::store::TaskStore;
use crate::task::{TaskHandler, TaskId, TaskStatus, Transition};
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Semaphore, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{interval, timeout};
use tokio_util::sync::CancellationToken;

/// Message stored on tasks still running when the engine stops.
pub const INTERRUPTED_MESSAGE: &str = "interrupted by shutdown";

/// Remove completed tasks whose creation is older than `retention`.
pub fn sweep_expired(store: &dyn TaskStore, retention: Duration) -> PawpalResult<u64> {
    let retention = chrono::Duration::from_std(retention)
        .map_err(|e| PawpalError::config(format!("retention window out of range: {}", e)))?;
    store.sweep_completed(Utc::now() - retention)
}

/// Fail a task the engine will never finish. Pending tasks pass through
/// `processing` first so the lifecycle stays linear. Returns 1 if the task
/// was failed here, 0 if it reached a terminal state in the meantime.
fn interrupt(store: &dyn TaskStore, task_id: &str, pending: bool) -> PawpalResult<u64> {
    let result = if pending {
        store
            .transition(task_id, Transition::Processing)
            .and_then(|_| store.transition(task_id, interrupted_failure()))
    } else {
        store.transition(task_id, interrupted_failure())
    };

    match result {
        Ok(_) => Ok(1),
        // finished between the listing and now
        Err(PawpalError::InvalidTransition { .. }) => Ok(0),
        Err(e) => Err(e),
    }
}

fn interrupted_failure() -> Transition {
    Transition::Failed(INTERRUPTED_MESSAGE.to_string())
}

/// Background machinery of a running tracker
pub struct TrackerEngine {
    /// Configuration
    config: PawpalConfig,
    /// Task store shared with the tracker
    store: Arc<dyn TaskStore>,
    /// Runs individual tasks
    worker: Worker,
    /// Counters updated by the worker
    stats: Arc<WorkerStats>,
    /// Stops the dispatcher, the sweeper and (cooperatively) handlers
    cancel: CancellationToken,
    /// Component handles
    dispatcher_handle: Option<JoinHandle<()>>,
    sweeper_handle: Option<JoinHandle<()>>,
    /// Engine start time for uptime tracking
    start_time: Option<Instant>,
}

impl TrackerEngine {
    /// Create a new engine. Nothing runs until [`start`](Self::start).
    pub fn new(
        config: PawpalConfig,
        store: Arc<dyn TaskStore>,
        handler: Arc<dyn TaskHandler>,
    ) -> Self {
        let stats = Arc::new(WorkerStats::default());
        let task_timeout = config.workers.task_timeout_secs.map(DurationExt::secs);
        let worker = Worker::new(Arc::clone(&store), handler, task_timeout, Arc::clone(&stats));

        Self {
            config,
            store,
            worker,
            stats,
            cancel: CancellationToken::new(),
            dispatcher_handle: None,
            sweeper_handle: None,
            start_time: None,
        }
    }

    /// Start the dispatcher (consuming `task_rx`) and, if enabled, the sweeper.
    pub fn start(&mut self, task_rx: mpsc::UnboundedReceiver<TaskId>) -> PawpalResult<()> {
        if self.is_running() {
            return Err(PawpalError::AlreadyRunning);
        }

        tracing::info!(
            "Starting task tracker engine with {} workers",
            self.config.workers.num_workers
        );

        self.dispatcher_handle = Some(tokio::spawn(dispatch(
            task_rx,
            self.worker.clone(),
            Arc::new(Semaphore::new(self.config.workers.num_workers)),
            self.cancel.clone(),
            self.config.workers.shutdown_timeout_secs.secs(),
        )));

        if self.config.tracker.enable_sweeper {
            self.sweeper_handle = Some(tokio::spawn(sweep_loop(
                Arc::clone(&self.store),
                self.config.tracker.retention(),
                self.config.tracker.sweep_interval(),
                self.cancel.clone(),
            )));
        }

        self.start_time = Some(Instant::now());
        tracing::info!("Task tracker engine started");
        Ok(())
    }

    /// Stop accepting work, wait for in-flight tasks, then stop the sweeper.
    ///
    /// Tasks that could not finish within the shutdown timeout are aborted and
    /// marked `failed`, and so are tasks that never left the queue. Returns
    /// how many were interrupted that way.
    pub async fn shutdown(&mut self) -> PawpalResult<u64> {
        let Some(dispatcher) = self.dispatcher_handle.take() else {
            return Err(PawpalError::NotRunning);
        };

        tracing::info!("Shutting down task tracker engine...");
        self.cancel.cancel();

        if let Err(e) = dispatcher.await {
            tracing::error!("Dispatcher ended abnormally: {}", e);
        }
        if let Some(sweeper) = self.sweeper_handle.take() {
            if let Err(e) = sweeper.await {
                tracing::error!("Sweeper ended abnormally: {}", e);
            }
        }

        // the channel is closed now, so nothing new can be dispatched
        let mut interrupted = 0;
        for task in self.store.tasks_by_status(TaskStatus::Processing, None)? {
            interrupted += interrupt(self.store.as_ref(), &task.id, false)?;
        }
        for task in self.store.tasks_by_status(TaskStatus::Pending, None)? {
            interrupted += interrupt(self.store.as_ref(), &task.id, true)?;
        }

        if interrupted > 0 {
            tracing::warn!("{} tasks interrupted by shutdown", interrupted);
        }

        self.start_time = None;
        tracing::info!("Task tracker engine shutdown complete");
        Ok(interrupted)
    }

    /// Get worker statistics
    pub fn worker_stats(&self) -> WorkerStatsSnapshot {
        self.stats.snapshot()
    }

    /// Get engine uptime
    pub fn uptime(&self) -> Option<Duration> {
        self.start_time.map(|start| start.elapsed())
    }

    /// Check if engine is running
    pub fn is_running(&self) -> bool {
        self.dispatcher_handle.is_some()
    }
}

impl Drop for TrackerEngine {
    fn drop(&mut self) {
        // Background loops must not outlive the engine
        self.cancel.cancel();
    }
}

/// Receive registered ids and run each one under a concurrency permit.
async fn dispatch(
    mut task_rx: mpsc::UnboundedReceiver<TaskId>,
    worker: Worker,
    permits: Arc<Semaphore>,
    cancel: CancellationToken,
    shutdown_timeout: Duration,
) {
    tracing::info!("Task dispatcher started");
    let mut in_flight = JoinSet::new();

    loop {
        let task_id = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            received = task_rx.recv() => match received {
                Some(task_id) => task_id,
                None => break,
            },
        };

        // reap finished tasks so the set does not grow unbounded
        while in_flight.try_join_next().is_some() {}

        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            permit = Arc::clone(&permits).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let worker = worker.clone();
        let token = cancel.child_token();
        in_flight.spawn(async move {
            let _permit = permit;
            if let Err(e) = worker.process(task_id.clone(), token).await {
                tracing::error!("Could not process task {}: {}", task_id, e);
            }
        });
    }

    let drained = timeout(shutdown_timeout, async {
        while in_flight.join_next().await.is_some() {}
    })
    .await;

    if drained.is_err() {
        tracing::warn!(
            "{} tasks still running after {:?}, aborting",
            in_flight.len(),
            shutdown_timeout
        );
        in_flight.abort_all();
        while in_flight.join_next().await.is_some() {}
    }

    tracing::info!("Task dispatcher stopped");
}

/// Periodically reclaim expired completed tasks.
async fn sweep_loop(
    store: Arc<dyn TaskStore>,
    retention: Duration,
    period: Duration,
    cancel: CancellationToken,
) {
    tracing::info!("Retention sweeper started (every {:?})", period);

    let mut ticker = interval(period);
    // the first tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        if let Err(e) = sweep_expired(store.as_ref(), retention) {
            tracing::error!("Retention sweep failed: {}", e);
        }
    }

    tracing::info!("Retention sweeper stopped");
}
