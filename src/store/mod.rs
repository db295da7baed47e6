//! Task storage backends.
//!
//! The tracker owns exactly one [`TaskStore`]. Only the tracker's registration
//! path, its worker and its retention sweep mutate it; callers read snapshots.
//!
//! Store operations are synchronous and hold their lock only for the length of
//! a map operation, so `register` and `get` never wait on deferred work.

use crate::error::PawpalResult;
use crate::task::{Task, TaskId, TaskStatus, Transition};
use chrono::{DateTime, Utc};

pub mod memory;
pub use memory::InMemoryTaskStore;

/// Statistics about the stored tasks
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackerStats {
    /// Number of pending tasks
    pub pending: u64,
    /// Number of processing tasks
    pub processing: u64,
    /// Number of completed tasks
    pub completed: u64,
    /// Number of failed tasks
    pub failed: u64,
    /// Total number of completed tasks reclaimed by sweeps
    pub total_swept: u64,
}

/// Trait that all task stores must implement
pub trait TaskStore: Send + Sync {
    /// Store a freshly registered task
    fn insert(&self, task: Task) -> PawpalResult<TaskId>;

    /// Snapshot of a task, or `None` if unknown or reclaimed
    fn get(&self, task_id: &str) -> PawpalResult<Option<Task>>;

    /// Move a task along its lifecycle and return the updated snapshot.
    ///
    /// Fails with `NotFound` for unknown ids and `InvalidTransition` for
    /// anything other than `pending → processing → completed | failed`.
    fn transition(&self, task_id: &str, transition: Transition) -> PawpalResult<Task>;

    /// Remove a task regardless of status, returning whether it existed
    fn remove(&self, task_id: &str) -> PawpalResult<bool>;

    /// Remove completed tasks created before `cutoff`, returning how many went
    fn sweep_completed(&self, cutoff: DateTime<Utc>) -> PawpalResult<u64>;

    /// Tasks in `status`, newest first, optionally truncated
    fn tasks_by_status(&self, status: TaskStatus, limit: Option<usize>)
    -> PawpalResult<Vec<Task>>;

    /// Get store statistics
    fn stats(&self) -> PawpalResult<TrackerStats>;
}
