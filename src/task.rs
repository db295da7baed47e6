//! Task definition and the handler trait for deferred work.

use crate::error::PawpalResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio_util::sync::CancellationToken;

/// Opaque task handle. Callers must not derive meaning from its structure.
pub type TaskId = String;

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Registered, work has not started yet
    Pending,
    /// Work is running
    Processing,
    /// Work finished and produced a result
    Completed,
    /// Work raised an error
    Failed,
}

impl TaskStatus {
    /// Whether no further transition can leave this status.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Whether the lifecycle allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::Processing)
                | (TaskStatus::Processing, TaskStatus::Completed)
                | (TaskStatus::Processing, TaskStatus::Failed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A state change applied by the tracker's worker.
///
/// Carrying the result or error inside the variant keeps the two mutually
/// exclusive on every task.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Work has begun
    Processing,
    /// Work succeeded with this result
    Completed(serde_json::Value),
    /// Work failed with this message
    Failed(String),
}

impl Transition {
    /// Status the task ends up in after this transition.
    pub fn status(&self) -> TaskStatus {
        match self {
            Transition::Processing => TaskStatus::Processing,
            Transition::Completed(_) => TaskStatus::Completed,
            Transition::Failed(_) => TaskStatus::Failed,
        }
    }
}

/// Snapshot of one unit of deferred work.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique task identifier
    pub id: TaskId,
    /// Caller-supplied category label
    #[serde(rename = "type")]
    pub task_type: String,
    /// Current status
    pub status: TaskStatus,
    /// Caller-supplied description of the work
    pub input: serde_json::Value,
    /// Set only once the task is completed
    pub result: Option<serde_json::Value>,
    /// Set only once the task has failed
    pub error: Option<String>,
    /// When the task was registered
    pub created_at: DateTime<Utc>,
    /// When the task last changed status
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Create a new pending task with a fresh id.
    pub fn new(task_type: impl Into<String>, input: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            id: generate_task_id(),
            task_type: task_type.into(),
            status: TaskStatus::Pending,
            input,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a transition, refreshing `updated_at` without ever moving it backwards.
    pub(crate) fn apply(&mut self, transition: Transition, now: DateTime<Utc>) {
        self.status = transition.status();
        match transition {
            Transition::Processing => {
                self.result = None;
                self.error = None;
            }
            Transition::Completed(result) => {
                self.result = Some(result);
                self.error = None;
            }
            Transition::Failed(message) => {
                self.result = None;
                self.error = Some(message);
            }
        }
        self.updated_at = now.max(self.updated_at);
    }
}

/// Generate a task id, e.g. `task_9f1c...`.
pub fn generate_task_id() -> TaskId {
    format!("task_{}", uuid::Uuid::new_v4().simple())
}

/// Everything a handler gets to see about the task it runs.
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub id: TaskId,
    pub task_type: String,
    pub input: serde_json::Value,
    /// Cancelled when the tracker shuts down. Handlers may ignore it.
    pub cancel: CancellationToken,
}

/// Executes the deferred work behind a task.
///
/// Returning `Err` moves the task to `failed` with the error's message; the
/// error never reaches the caller that registered the task.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// Run the work and return the value stored as the task's result.
    async fn handle(&self, ctx: TaskContext) -> PawpalResult<serde_json::Value>;
}
