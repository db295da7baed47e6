//! Worker side of the tracker: runs one task through its lifecycle.
//!
//! Every failure mode of the handler (error, panic, timeout) ends with the
//! task in `failed`; nothing is propagated to the code that registered it.

use crate::error::{PawpalError, PawpalResult};
use crate::store::TaskStore;
use crate::task::{TaskContext, TaskHandler, TaskId, Transition};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

/// How a single execution ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Task completed successfully
    Success,
    /// Handler returned an error
    Failed(String),
    /// Handler panicked
    Panic(String),
    /// Task execution timed out
    Timeout,
}

/// Counters shared by every worker of one engine
#[derive(Debug, Default)]
pub struct WorkerStats {
    tasks_completed: AtomicU64,
    tasks_failed: AtomicU64,
    tasks_timed_out: AtomicU64,
}

/// Point-in-time copy of [`WorkerStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStatsSnapshot {
    /// Number of tasks processed successfully
    pub tasks_completed: u64,
    /// Number of tasks that failed, timeouts and panics included
    pub tasks_failed: u64,
    /// Number of tasks that hit the timeout
    pub tasks_timed_out: u64,
}

impl WorkerStats {
    pub fn snapshot(&self) -> WorkerStatsSnapshot {
        WorkerStatsSnapshot {
            tasks_completed: self.tasks_completed.load(Ordering::Relaxed),
            tasks_failed: self.tasks_failed.load(Ordering::Relaxed),
            tasks_timed_out: self.tasks_timed_out.load(Ordering::Relaxed),
        }
    }

    fn record(&self, outcome: &TaskOutcome) {
        match outcome {
            TaskOutcome::Success => {
                self.tasks_completed.fetch_add(1, Ordering::Relaxed);
            }
            TaskOutcome::Timeout => {
                self.tasks_timed_out.fetch_add(1, Ordering::Relaxed);
                self.tasks_failed.fetch_add(1, Ordering::Relaxed);
            }
            TaskOutcome::Failed(_) | TaskOutcome::Panic(_) => {
                self.tasks_failed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

/// Runs tasks against a store and a handler
#[derive(Clone)]
pub struct Worker {
    store: Arc<dyn TaskStore>,
    handler: Arc<dyn TaskHandler>,
    task_timeout: Option<Duration>,
    stats: Arc<WorkerStats>,
}

impl Worker {
    pub fn new(
        store: Arc<dyn TaskStore>,
        handler: Arc<dyn TaskHandler>,
        task_timeout: Option<Duration>,
        stats: Arc<WorkerStats>,
    ) -> Self {
        Self {
            store,
            handler,
            task_timeout,
            stats,
        }
    }

    /// Move a pending task to `processing`, run it, and record the outcome.
    ///
    /// Errors only come from the store itself (unknown id, corrupted state);
    /// handler failures are stored on the task and reported as an outcome.
    pub async fn process(
        &self,
        task_id: TaskId,
        cancel: CancellationToken,
    ) -> PawpalResult<TaskOutcome> {
        let task = self.store.transition(&task_id, Transition::Processing)?;

        tracing::debug!("Processing task {} of type {}", task.id, task.task_type);

        let ctx = TaskContext {
            id: task.id,
            task_type: task.task_type,
            input: task.input,
            cancel,
        };

        let start_time = Instant::now();
        let (outcome, transition) = self.execute(ctx).await;
        let duration = start_time.elapsed();

        self.stats.record(&outcome);
        self.store.transition(&task_id, transition)?;

        match &outcome {
            TaskOutcome::Success => {
                tracing::debug!("Task {} completed in {:?}", task_id, duration);
            }
            other => {
                tracing::warn!("Task {} failed after {:?}: {:?}", task_id, duration, other);
            }
        }

        Ok(outcome)
    }

    /// Run the handler on its own tokio task so a panic is caught as a `JoinError`.
    async fn execute(&self, ctx: TaskContext) -> (TaskOutcome, Transition) {
        let handler = Arc::clone(&self.handler);
        let handle = tokio::spawn(async move { handler.handle(ctx).await });
        let abort = AbortOnDrop(handle.abort_handle());

        let joined = match self.task_timeout {
            Some(limit) => match timeout(limit, handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    drop(abort);
                    let err = PawpalError::Timeout {
                        timeout_secs: limit.as_secs(),
                    };
                    return (TaskOutcome::Timeout, Transition::Failed(err.to_string()));
                }
            },
            None => handle.await,
        };

        match joined {
            Ok(Ok(result)) => (TaskOutcome::Success, Transition::Completed(result)),
            Ok(Err(error)) => {
                let message = failure_message(&error);
                (
                    TaskOutcome::Failed(message.clone()),
                    Transition::Failed(message),
                )
            }
            Err(join_error) => {
                let message = format!("Task panicked: {}", join_error);
                (TaskOutcome::Panic(message.clone()), Transition::Failed(message))
            }
        }
    }
}

/// Aborts the handler task if processing is dropped mid-flight (engine
/// shutdown) or gives up on it (timeout).
struct AbortOnDrop(tokio::task::AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Message stored on a failed task. Handler failures keep the handler's own
/// wording rather than the `Task execution failed:` prefix.
fn failure_message(error: &PawpalError) -> String {
    match error {
        PawpalError::TaskFailed { message, .. } => message.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryTaskStore;
    use crate::task::{Task, TaskStatus};
    use async_trait::async_trait;
    use serde_json::json;

    struct Succeed;

    #[async_trait]
    impl TaskHandler for Succeed {
        async fn handle(&self, ctx: TaskContext) -> PawpalResult<serde_json::Value> {
            Ok(json!({"taskId": ctx.id}))
        }
    }

    struct Fail;

    #[async_trait]
    impl TaskHandler for Fail {
        async fn handle(&self, _ctx: TaskContext) -> PawpalResult<serde_json::Value> {
            Err(PawpalError::task_failed("duplicate email on row 2"))
        }
    }

    struct Explode;

    #[async_trait]
    impl TaskHandler for Explode {
        async fn handle(&self, _ctx: TaskContext) -> PawpalResult<serde_json::Value> {
            panic!("handler bug")
        }
    }

    struct Hang;

    #[async_trait]
    impl TaskHandler for Hang {
        async fn handle(&self, _ctx: TaskContext) -> PawpalResult<serde_json::Value> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(json!(null))
        }
    }

    fn setup(
        handler: Arc<dyn TaskHandler>,
        timeout: Option<Duration>,
    ) -> (Arc<InMemoryTaskStore>, Worker, TaskId) {
        let store = Arc::new(InMemoryTaskStore::new());
        let id = store
            .insert(Task::new("bulk_import_users", json!({"count": 5})))
            .unwrap();
        let stats = Arc::new(WorkerStats::default());
        let worker = Worker::new(store.clone(), handler, timeout, stats);
        (store, worker, id)
    }

    #[tokio::test]
    async fn test_success_stores_result() {
        let (store, worker, id) = setup(Arc::new(Succeed), None);

        let outcome = worker
            .process(id.clone(), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome, TaskOutcome::Success);

        let task = store.get(&id).unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.result, Some(json!({"taskId": id})));
        assert!(task.error.is_none());
        assert_eq!(worker.stats.snapshot().tasks_completed, 1);
    }

    #[tokio::test]
    async fn test_handler_error_is_captured() {
        let (store, worker, id) = setup(Arc::new(Fail), None);

        let outcome = worker
            .process(id.clone(), CancellationToken::new())
            .await
            .unwrap();
        assert!(matches!(outcome, TaskOutcome::Failed(_)));

        let task = store.get(&id).unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.error.as_deref(), Some("duplicate email on row 2"));
        assert!(task.result.is_none());
    }

    #[tokio::test]
    async fn test_panic_is_captured() {
        let (store, worker, id) = setup(Arc::new(Explode), None);

        let outcome = worker
            .process(id.clone(), CancellationToken::new())
            .await
            .unwrap();
        assert!(matches!(outcome, TaskOutcome::Panic(_)));

        let task = store.get(&id).unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert!(task.error.unwrap().starts_with("Task panicked"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_fails_task() {
        let (store, worker, id) = setup(Arc::new(Hang), Some(Duration::from_secs(2)));

        let outcome = worker
            .process(id.clone(), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome, TaskOutcome::Timeout);

        let task = store.get(&id).unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.error.as_deref(), Some("Task timed out after 2 seconds"));

        let stats = worker.stats.snapshot();
        assert_eq!(stats.tasks_timed_out, 1);
        assert_eq!(stats.tasks_failed, 1);
    }

    #[tokio::test]
    async fn test_unknown_task_is_an_error() {
        let (_store, worker, _id) = setup(Arc::new(Succeed), None);
        let err = worker
            .process("task_missing".to_string(), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PawpalError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_task_cannot_run_twice() {
        let (_store, worker, id) = setup(Arc::new(Succeed), None);
        worker.process(id.clone(), CancellationToken::new()).await.unwrap();

        let err = worker.process(id, CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, PawpalError::InvalidTransition { .. }));
    }
}
