//! Handler registry for deferred work.
//!
//! The registry maps task types to [`TaskHandler`]s and is itself a handler,
//! so the tracker only ever holds one executor. Task types with no dedicated
//! handler go to the fallback, which defaults to [`SimulatedWork`].
//!
//! # Examples
//!
//! ```rust
//! use pawpal_core::prelude::*;
//! use std::sync::Arc;
//!
//! struct ImportUsers;
//!
//! #[async_trait]
//! impl TaskHandler for ImportUsers {
//!     async fn handle(&self, ctx: TaskContext) -> PawpalResult<serde_json::Value> {
//!         Ok(serde_json::json!({ "imported": ctx.input["count"] }))
//!     }
//! }
//!
//! let registry = HandlerRegistry::new().with_handler("bulk_import_users", Arc::new(ImportUsers));
//! assert!(registry.is_registered("bulk_import_users"));
//! ```

use crate::config::{DurationExt, WorkerConfig};
use crate::error::{PawpalError, PawpalResult};
use crate::task::{TaskContext, TaskHandler};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tokio::sync::RwLock;

/// Statistics for a registered task type.
#[derive(Debug, Clone, Default)]
pub struct TaskTypeStats {
    /// Total number of tasks executed
    pub total_executed: u64,
    /// Number of successful executions
    pub successful: u64,
    /// Number of failed executions
    pub failed: u64,
    /// Average execution time
    pub avg_duration: Option<Duration>,
    /// Last execution time
    pub last_executed: Option<SystemTime>,
}

/// Routes each task to the handler registered for its type.
pub struct HandlerRegistry {
    /// Registered handlers by task type
    handlers: HashMap<String, Arc<dyn TaskHandler>>,
    /// Handler for task types without a dedicated entry
    fallback: Option<Arc<dyn TaskHandler>>,
    /// Task type statistics
    stats: RwLock<HashMap<String, TaskTypeStats>>,
}

impl HandlerRegistry {
    /// Create an empty registry with no fallback.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            fallback: None,
            stats: RwLock::new(HashMap::new()),
        }
    }

    /// Registry whose fallback simulates work using the worker delay settings.
    pub fn simulated(config: &WorkerConfig) -> Self {
        Self::new().with_fallback(Arc::new(SimulatedWork::from_config(config)))
    }

    /// Register the handler for a task type, replacing any previous one.
    pub fn with_handler(
        mut self,
        task_type: impl Into<String>,
        handler: Arc<dyn TaskHandler>,
    ) -> Self {
        let task_type = task_type.into();
        tracing::info!("Registering task handler: {}", task_type);
        self.handlers.insert(task_type, handler);
        self
    }

    /// Set the handler used for unregistered task types.
    pub fn with_fallback(mut self, handler: Arc<dyn TaskHandler>) -> Self {
        self.fallback = Some(handler);
        self
    }

    /// Check if a task type has a dedicated handler.
    pub fn is_registered(&self, task_type: &str) -> bool {
        self.handlers.contains_key(task_type)
    }

    /// Get all registered task types, sorted.
    pub fn registered_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.handlers.keys().cloned().collect();
        types.sort();
        types
    }

    /// Get statistics for a task type.
    pub async fn get_stats(&self, task_type: &str) -> Option<TaskTypeStats> {
        let stats = self.stats.read().await;
        stats.get(task_type).cloned()
    }

    fn resolve(&self, task_type: &str) -> Option<&Arc<dyn TaskHandler>> {
        self.handlers.get(task_type).or(self.fallback.as_ref())
    }

    async fn update_stats(
        &self,
        task_type: &str,
        result: &PawpalResult<serde_json::Value>,
        duration: Duration,
    ) {
        let mut stats = self.stats.write().await;
        let task_stats = stats.entry(task_type.to_string()).or_default();

        task_stats.total_executed += 1;
        task_stats.last_executed = Some(SystemTime::now());

        match result {
            Ok(_) => task_stats.successful += 1,
            Err(_) => task_stats.failed += 1,
        }

        // Exponential moving average
        if let Some(avg) = task_stats.avg_duration {
            let alpha = 0.1;
            let new_avg_nanos =
                (alpha * duration.as_nanos() as f64) + ((1.0 - alpha) * avg.as_nanos() as f64);
            task_stats.avg_duration = Some(Duration::from_nanos(new_avg_nanos as u64));
        } else {
            task_stats.avg_duration = Some(duration);
        }
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskHandler for HandlerRegistry {
    async fn handle(&self, ctx: TaskContext) -> PawpalResult<serde_json::Value> {
        let task_type = ctx.task_type.clone();
        let Some(handler) = self.resolve(&task_type) else {
            tracing::error!("No handler found for task type: {}", task_type);
            return Err(PawpalError::task_failed(format!(
                "no handler registered for task type '{}'",
                task_type
            )));
        };

        let start_time = Instant::now();
        let result = handler.handle(ctx).await;
        self.update_stats(&task_type, &result, start_time.elapsed())
            .await;

        result
    }
}

/// Stand-in for real background work.
///
/// Sleeps for a delay drawn from `[min_delay, max_delay]`, then returns a
/// canned success result naming the task. Shutdown cuts the wait short and
/// fails the task.
#[derive(Debug, Clone)]
pub struct SimulatedWork {
    min_delay: Duration,
    max_delay: Duration,
}

impl SimulatedWork {
    pub fn new(min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            min_delay,
            max_delay: max_delay.max(min_delay),
        }
    }

    pub fn from_config(config: &WorkerConfig) -> Self {
        Self::new(
            config.simulated_delay_min_ms.millis(),
            config.simulated_delay_max_ms.millis(),
        )
    }

    /// Pick a delay in the configured range.
    fn pick_delay(&self) -> Duration {
        let span = (self.max_delay - self.min_delay).as_millis() as u64;
        if span == 0 {
            return self.min_delay;
        }
        // v4 UUIDs are random, which is plenty for jitter
        let jitter = (uuid::Uuid::new_v4().as_u128() % (span as u128 + 1)) as u64;
        self.min_delay + Duration::from_millis(jitter)
    }
}

#[async_trait]
impl TaskHandler for SimulatedWork {
    async fn handle(&self, ctx: TaskContext) -> PawpalResult<serde_json::Value> {
        let delay = self.pick_delay();
        tracing::debug!("Simulating {} for task {}", ctx.task_type, ctx.id);

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = ctx.cancel.cancelled() => {
                return Err(PawpalError::task_failed("cancelled before completion"));
            }
        }

        Ok(json!({
            "message": format!("Task {} completed successfully", ctx.task_type),
            "taskId": ctx.id,
            "completedAt": Utc::now(),
        }))
    }
}
