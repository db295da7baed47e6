//! JSON bodies for the task endpoints.
//!
//! These are framework-agnostic: each builder returns a serializable body and
//! the status code (and `Location`, for 202) a caller should answer with.

use crate::conditional::ReadPrecondition;
use crate::error::{PawpalError, PawpalResult};
use crate::links::{Links, build_url};
use crate::task::{Task, TaskId, TaskStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Path under which task resources are exposed.
pub const DEFAULT_TASKS_PATH: &str = "/api/users/tasks";

/// Message sent with a 202 for bulk imports.
pub const ACCEPTED_MESSAGE: &str = "Bulk import task accepted";

pub const STATUS_OK: u16 = 200;
pub const STATUS_ACCEPTED: u16 = 202;
pub const STATUS_NOT_MODIFIED: u16 = 304;

/// Status for a conditional read: 304 without a body when the client copy is
/// current, 200 otherwise.
pub fn read_status(precondition: ReadPrecondition) -> u16 {
    match precondition {
        ReadPrecondition::NotModified => STATUS_NOT_MODIFIED,
        ReadPrecondition::Proceed => STATUS_OK,
    }
}

/// URL of a single task resource.
pub fn task_url(base_url: &str, tasks_path: &str, id: &str) -> String {
    build_url(base_url, tasks_path, Some(id), &[])
}

/// URL of a task's result resource.
pub fn result_url(base_url: &str, tasks_path: &str, id: &str) -> String {
    format!("{}/result", task_url(base_url, tasks_path, id))
}

/// A 202 answer: where to poll, and what to send.
#[derive(Debug, Clone, Serialize)]
pub struct Accepted {
    /// Value for the `Location` header
    #[serde(skip)]
    pub location: String,
    pub success: bool,
    pub message: String,
    pub task: AcceptedTask,
}

#[derive(Debug, Clone, Serialize)]
pub struct AcceptedTask {
    pub id: TaskId,
    pub status: TaskStatus,
    #[serde(rename = "type")]
    pub task_type: String,
    pub links: Links,
}

impl Accepted {
    pub fn status_code(&self) -> u16 {
        STATUS_ACCEPTED
    }
}

/// Build the 202 answer for a freshly registered task.
pub fn accepted(base_url: &str, tasks_path: &str, id: &str, task_type: &str) -> Accepted {
    let location = task_url(base_url, tasks_path, id);
    let links = Links::new()
        .with("self", location.clone())
        .with("status", location.clone());

    Accepted {
        location,
        success: true,
        message: ACCEPTED_MESSAGE.to_string(),
        task: AcceptedTask {
            id: id.to_string(),
            status: TaskStatus::Pending,
            task_type: task_type.to_string(),
            links,
        },
    }
}

/// Task snapshot plus navigation links.
#[derive(Debug, Clone, Serialize)]
pub struct TaskStatusBody {
    pub success: bool,
    pub task: TaskView,
}

impl TaskStatusBody {
    pub fn status_code(&self) -> u16 {
        STATUS_OK
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskView {
    #[serde(flatten)]
    pub task: Task,
    pub links: Links,
}

/// Build the status body. `links.result` appears only for completed tasks.
pub fn task_status(base_url: &str, tasks_path: &str, task: &Task) -> TaskStatusBody {
    let mut links = Links::new().with("self", task_url(base_url, tasks_path, &task.id));
    if task.status == TaskStatus::Completed && task.result.is_some() {
        links.insert("result", result_url(base_url, tasks_path, &task.id));
    }

    TaskStatusBody {
        success: true,
        task: TaskView {
            task: task.clone(),
            links,
        },
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskResultBody {
    pub success: bool,
    pub task: CompletedTaskSummary,
    pub result: serde_json::Value,
    pub links: Links,
}

impl TaskResultBody {
    pub fn status_code(&self) -> u16 {
        STATUS_OK
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedTaskSummary {
    pub id: TaskId,
    pub status: TaskStatus,
    #[serde(rename = "type")]
    pub task_type: String,
    pub completed_at: DateTime<Utc>,
}

/// Build the result body, or `NotCompleted` while the task is still running
/// (or has failed).
pub fn task_result(base_url: &str, tasks_path: &str, task: &Task) -> PawpalResult<TaskResultBody> {
    let result = match (task.status, &task.result) {
        (TaskStatus::Completed, Some(result)) => result.clone(),
        (status, _) => {
            return Err(PawpalError::NotCompleted {
                id: task.id.clone(),
                status,
            });
        }
    };

    Ok(TaskResultBody {
        success: true,
        task: CompletedTaskSummary {
            id: task.id.clone(),
            status: task.status,
            task_type: task.task_type.clone(),
            completed_at: task.updated_at,
        },
        result,
        links: Links::new()
            .with("self", result_url(base_url, tasks_path, &task.id))
            .with("task", task_url(base_url, tasks_path, &task.id)),
    })
}

/// `{success: false, message}` body for an error answer.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    #[serde(skip)]
    pub status_code: u16,
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<TaskSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskSummary {
    pub id: TaskId,
    pub status: TaskStatus,
}

impl From<&PawpalError> for ErrorBody {
    fn from(error: &PawpalError) -> Self {
        let task = match error {
            PawpalError::NotCompleted { id, status } => Some(TaskSummary {
                id: id.clone(),
                status: *status,
            }),
            _ => None,
        };

        Self {
            status_code: error.status_code(),
            success: false,
            message: error.to_string(),
            task,
        }
    }
}
