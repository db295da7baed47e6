//! Error types for PawPal core operations.

use crate::task::{TaskId, TaskStatus};
use thiserror::Error;

/// Result type used throughout PawPal core.
pub type PawpalResult<T> = Result<T, PawpalError>;

/// Main error type for PawPal core operations.
#[derive(Error, Debug)]
pub enum PawpalError {
    /// Task id is unknown or has already been reclaimed
    #[error("Task '{id}' not found")]
    NotFound {
        /// The id that was looked up
        id: TaskId,
    },

    /// Client-supplied entity tag no longer matches the resource
    #[error("Precondition failed: ETag mismatch (client {expected}, current {current})")]
    PreconditionFailed {
        /// Tag the client sent in `If-Match`
        expected: String,
        /// Tag computed from the current representation
        current: String,
    },

    /// Deferred work raised an error
    #[error("Task execution failed: {message}")]
    TaskFailed {
        /// Human-readable failure message, stored on the task
        message: String,
        /// Optional underlying error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Result requested before the task completed
    #[error("Task is not completed. Current status: {status}")]
    NotCompleted {
        /// Task id
        id: TaskId,
        /// Status at the time of the request
        status: TaskStatus,
    },

    /// Lifecycle transition out of order or out of a terminal state
    #[error("Task '{id}' cannot move from {from} to {to}")]
    InvalidTransition {
        /// Task id
        id: TaskId,
        /// Current status
        from: TaskStatus,
        /// Requested status
        to: TaskStatus,
    },

    /// Handler exceeded the configured task timeout
    #[error("Task timed out after {timeout_secs} seconds")]
    Timeout {
        /// Timeout duration in seconds
        timeout_secs: u64,
    },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Error message
        message: String,
    },

    /// Tracker engine is already running
    #[error("Task tracker is already running")]
    AlreadyRunning,

    /// Tracker engine is not running
    #[error("Task tracker is not running")]
    NotRunning,

    /// Tracker was shut down; it cannot be started again
    #[error("Task tracker has been shut down and cannot be restarted")]
    ShutDown,

    /// Shared task state is unusable (a lock holder panicked)
    #[error("Task state corrupted: {message}")]
    StateCorrupted {
        /// Error message
        message: String,
    },
}

impl PawpalError {
    /// Create a task failure with a plain message.
    pub fn task_failed(message: impl Into<String>) -> Self {
        Self::TaskFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Create a task failure wrapping an underlying error.
    pub fn task_failed_with<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::TaskFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    pub(crate) fn not_found(id: impl Into<TaskId>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// HTTP status code a caller should answer with for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::PreconditionFailed { .. } => 412,
            Self::NotCompleted { .. } => 400,
            _ => 500,
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for PawpalError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::StateCorrupted {
            message: err.to_string(),
        }
    }
}
