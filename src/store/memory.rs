//! In-memory task store.
//!
//! All tasks live in a single `HashMap` behind a `RwLock`. Nothing is
//! persisted; a restart forgets every task.

use super::{TaskStore, TrackerStats};
use crate::error::{PawpalError, PawpalResult};
use crate::task::{Task, TaskId, TaskStatus, Transition};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// In-memory task store implementation
#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    /// Task storage indexed by task ID
    tasks: RwLock<HashMap<TaskId, Task>>,
    /// Completed tasks reclaimed so far
    total_swept: AtomicU64,
}

impl InMemoryTaskStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tasks currently held
    pub fn len(&self) -> PawpalResult<usize> {
        Ok(self.tasks.read()?.len())
    }

    pub fn is_empty(&self) -> PawpalResult<bool> {
        Ok(self.len()? == 0)
    }
}

impl TaskStore for InMemoryTaskStore {
    fn insert(&self, task: Task) -> PawpalResult<TaskId> {
        let task_id = task.id.clone();
        self.tasks.write()?.insert(task_id.clone(), task);

        tracing::debug!("Stored task: {}", task_id);
        Ok(task_id)
    }

    fn get(&self, task_id: &str) -> PawpalResult<Option<Task>> {
        let tasks = self.tasks.read()?;
        Ok(tasks.get(task_id).cloned())
    }

    fn transition(&self, task_id: &str, transition: Transition) -> PawpalResult<Task> {
        let mut tasks = self.tasks.write()?;
        let task = tasks
            .get_mut(task_id)
            .ok_or_else(|| PawpalError::not_found(task_id))?;

        let next = transition.status();
        if !task.status.can_transition_to(next) {
            return Err(PawpalError::InvalidTransition {
                id: task.id.clone(),
                from: task.status,
                to: next,
            });
        }

        let from = task.status;
        task.apply(transition, Utc::now());

        tracing::debug!("Task {} moved {} -> {}", task_id, from, next);
        Ok(task.clone())
    }

    fn remove(&self, task_id: &str) -> PawpalResult<bool> {
        Ok(self.tasks.write()?.remove(task_id).is_some())
    }

    fn sweep_completed(&self, cutoff: DateTime<Utc>) -> PawpalResult<u64> {
        let mut tasks = self.tasks.write()?;
        let before = tasks.len();

        tasks.retain(|_, task| !(task.status == TaskStatus::Completed && task.created_at < cutoff));

        let swept = (before - tasks.len()) as u64;
        drop(tasks);

        if swept > 0 {
            self.total_swept.fetch_add(swept, Ordering::Relaxed);
            tracing::info!("Swept {} completed tasks created before {}", swept, cutoff);
        }

        Ok(swept)
    }

    fn tasks_by_status(
        &self,
        status: TaskStatus,
        limit: Option<usize>,
    ) -> PawpalResult<Vec<Task>> {
        let tasks = self.tasks.read()?;
        let mut result: Vec<Task> = tasks
            .values()
            .filter(|task| task.status == status)
            .cloned()
            .collect();
        drop(tasks);

        // Sort by created_at (newest first)
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        if let Some(limit) = limit {
            result.truncate(limit);
        }

        Ok(result)
    }

    fn stats(&self) -> PawpalResult<TrackerStats> {
        let tasks = self.tasks.read()?;
        let mut stats = TrackerStats {
            total_swept: self.total_swept.load(Ordering::Relaxed),
            ..Default::default()
        };

        for task in tasks.values() {
            match task.status {
                TaskStatus::Pending => stats.pending += 1,
                TaskStatus::Processing => stats.processing += 1,
                TaskStatus::Completed => stats.completed += 1,
                TaskStatus::Failed => stats.failed += 1,
            }
        }

        Ok(stats)
    }
}
