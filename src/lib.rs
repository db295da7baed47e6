//! # PawPal Core
//!
//! Shared request-handling machinery for the PawPal services.
//!
//! ## Features
//!
//! - **Async task tracking**: register long-running work, answer `202 Accepted`
//!   at once, and let clients poll the task until it is `completed` or `failed`
//! - **Retention**: completed tasks are reclaimed by a periodic sweep
//! - **Conditional requests**: entity tags for read caching (`If-None-Match`)
//!   and optimistic concurrency on writes (`If-Match`)
//! - **HATEOAS**: `self`/pagination links and the JSON bodies of the task
//!   endpoints
//!
//! ## Quick Start
//!
//! ```rust
//! use pawpal_core::prelude::*;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> PawpalResult<()> {
//!     let tracker = TaskTracker::new(PawpalConfig::testing())?;
//!     tracker.start().await?;
//!
//!     let id = tracker.register("bulk_import_users", json!({ "userCount": 2 }))?;
//!     let accepted = response::accepted(
//!         "http://localhost:3001",
//!         response::DEFAULT_TASKS_PATH,
//!         &id,
//!         "bulk_import_users",
//!     );
//!     assert_eq!(accepted.status_code(), 202);
//!
//!     let tag = fingerprint_json(&tracker.require(&id)?)?;
//!     assert!(evaluate_read_precondition(Some(tag.as_str()), &tag).short_circuit());
//!
//!     tracker.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod conditional;
pub mod config;
pub mod core;
pub mod error;
pub mod links;
pub mod logging;
pub mod response;
pub mod store;
pub mod task;

pub mod prelude {
    pub use crate::conditional::{
        Preconditions, ReadPrecondition, WritePrecondition, evaluate_read_precondition,
        evaluate_write_precondition, fingerprint, fingerprint_json,
    };
    pub use crate::config::*;
    pub use crate::core::{HandlerRegistry, SimulatedWork, TaskTracker};
    pub use crate::error::{PawpalError, PawpalResult};
    pub use crate::links::{Link, LinkOptions, Links, generate_links};
    pub use crate::response;
    pub use crate::store::{InMemoryTaskStore, TaskStore, TrackerStats};
    pub use crate::task::{Task, TaskContext, TaskHandler, TaskId, TaskStatus};
    pub use async_trait::async_trait;
}

pub use crate::config::*;
pub use crate::core::{HandlerRegistry, SimulatedWork, TaskTracker};
pub use crate::error::{PawpalError, PawpalResult};
pub use crate::store::{InMemoryTaskStore, TaskStore, TrackerStats};
pub use crate::task::{Task, TaskContext, TaskHandler, TaskId, TaskStatus};
pub use async_trait::async_trait;
