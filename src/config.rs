//! Configuration types for PawPal core.
//!
//! This module contains the configuration structures for the task tracker,
//! its worker pool and logging.

use crate::error::{PawpalError, PawpalResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration for PawPal core.
///
/// # Examples
///
/// ```rust
/// use pawpal_core::config::{PawpalConfig, WorkerConfig};
///
/// let config = PawpalConfig {
///     workers: WorkerConfig::with_workers(4).with_task_timeout(60),
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PawpalConfig {
    /// Task storage and retention
    pub tracker: TrackerConfig,

    /// Worker-related configuration
    pub workers: WorkerConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Task storage and retention configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// How long a completed task stays queryable, measured from creation (in seconds)
    pub retention_secs: u64,

    /// How often the retention sweep runs (in seconds)
    pub sweep_interval_secs: u64,

    /// Whether the engine runs the periodic sweep at all
    pub enable_sweeper: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            retention_secs: 3600,      // 1 hour
            sweep_interval_secs: 1800, // 30 minutes
            enable_sweeper: true,
        }
    }
}

impl TrackerConfig {
    pub fn retention(&self) -> Duration {
        self.retention_secs.secs()
    }

    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval_secs.secs()
    }
}

/// Worker pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Maximum number of tasks processed concurrently
    pub num_workers: usize,

    /// Maximum time a handler can run before the task is failed (in seconds)
    pub task_timeout_secs: Option<u64>,

    /// Time to wait for in-flight tasks on shutdown (in seconds)
    pub shutdown_timeout_secs: u64,

    /// Lower bound of the simulated work delay (in milliseconds)
    pub simulated_delay_min_ms: u64,

    /// Upper bound of the simulated work delay (in milliseconds)
    pub simulated_delay_max_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            num_workers: num_cpus::get().max(1),
            task_timeout_secs: Some(300), // 5 minutes
            shutdown_timeout_secs: 30,
            simulated_delay_min_ms: 2000,
            simulated_delay_max_ms: 5000,
        }
    }
}

impl WorkerConfig {
    /// Defaults with `num_workers` concurrent tasks.
    pub fn with_workers(num_workers: usize) -> Self {
        Self {
            num_workers,
            ..Default::default()
        }
    }

    /// Fail tasks whose handler runs longer than `timeout_secs`.
    pub fn with_task_timeout(mut self, timeout_secs: u64) -> Self {
        self.task_timeout_secs = Some(timeout_secs);
        self
    }

    /// How long shutdown waits for in-flight tasks.
    pub fn with_shutdown_timeout(mut self, timeout_secs: u64) -> Self {
        self.shutdown_timeout_secs = timeout_secs;
        self
    }

    /// Set the simulated work delay range.
    pub fn with_simulated_delay(mut self, min_ms: u64, max_ms: u64) -> Self {
        self.simulated_delay_min_ms = min_ms;
        self.simulated_delay_max_ms = max_ms;
        self
    }
}

/// Subscriber settings consumed by [`crate::logging::init`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Most verbose level that gets recorded
    pub level: LogLevel,

    /// One JSON object per event instead of the human-readable format
    pub json_format: bool,

    /// ANSI colors for the human-readable format
    pub colored: bool,

    /// Prefix each event with its module path
    pub include_targets: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            json_format: false,
            colored: true,
            include_targets: false,
        }
    }
}

/// Verbosity, spelled in lowercase in configuration files.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Self::TRACE,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}

/// Turns the integer settings above into [`Duration`]s.
pub trait DurationExt {
    fn secs(self) -> Duration;
    fn millis(self) -> Duration;
}

impl DurationExt for u64 {
    fn secs(self) -> Duration {
        Duration::from_secs(self)
    }

    fn millis(self) -> Duration {
        Duration::from_millis(self)
    }
}

impl PawpalConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> PawpalResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config
            .validate()
            .map_err(|errors| PawpalError::config(errors.join("; ")))?;
        Ok(config)
    }

    /// Short retention, two workers and verbose logs.
    pub fn development() -> Self {
        Self {
            tracker: TrackerConfig {
                retention_secs: 600,
                sweep_interval_secs: 60,
                ..Default::default()
            },
            workers: WorkerConfig {
                num_workers: 2,
                task_timeout_secs: Some(60),
                ..Default::default()
            },
            logging: LoggingConfig {
                level: LogLevel::Debug,
                colored: true,
                include_targets: true,
                ..Default::default()
            },
        }
    }

    /// Default retention, two workers per core and JSON logs.
    pub fn production() -> Self {
        Self {
            tracker: TrackerConfig::default(),
            workers: WorkerConfig {
                num_workers: num_cpus::get() * 2,
                task_timeout_secs: Some(300),
                shutdown_timeout_secs: 60,
                ..Default::default()
            },
            logging: LoggingConfig {
                level: LogLevel::Info,
                json_format: true,
                colored: false,
                include_targets: false,
            },
        }
    }

    /// Millisecond delays, one second retention and no background sweep.
    pub fn testing() -> Self {
        Self {
            tracker: TrackerConfig {
                retention_secs: 1,
                sweep_interval_secs: 1,
                enable_sweeper: false,
            },
            workers: WorkerConfig {
                num_workers: 1,
                task_timeout_secs: Some(10),
                shutdown_timeout_secs: 5,
                simulated_delay_min_ms: 10,
                simulated_delay_max_ms: 50,
            },
            logging: LoggingConfig {
                level: LogLevel::Debug,
                colored: false,
                include_targets: true,
                ..Default::default()
            },
        }
    }

    /// Collect every problem with the configuration, not just the first.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.workers.num_workers == 0 {
            errors.push("Number of workers must be greater than 0".to_string());
        }

        if self.workers.num_workers > 1000 {
            errors.push("Number of workers should not exceed 1000".to_string());
        }

        if self.workers.task_timeout_secs == Some(0) {
            errors.push("Task timeout must be greater than 0".to_string());
        }

        if self.workers.simulated_delay_max_ms < self.workers.simulated_delay_min_ms {
            errors.push(
                "Simulated delay max must be greater than or equal to min".to_string(),
            );
        }

        if self.tracker.retention_secs == 0 {
            errors.push("Retention window must be greater than 0".to_string());
        }

        if self.tracker.sweep_interval_secs == 0 {
            errors.push("Sweep interval must be greater than 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
