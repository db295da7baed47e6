use chrono::Utc;
use pawpal_core::core::INTERRUPTED_MESSAGE;
use pawpal_core::prelude::*;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

const BASE: &str = "http://localhost:3001";

fn config(num_workers: usize) -> PawpalConfig {
    PawpalConfig {
        workers: WorkerConfig::with_workers(num_workers),
        ..Default::default()
    }
}

#[tokio::test(start_paused = true)]
async fn bulk_import_runs_to_completion() {
    let tracker = TaskTracker::new(config(2)).unwrap();
    tracker.start().await.unwrap();

    let id = tracker
        .register("bulk_import_users", json!({"count": 5}))
        .unwrap();

    let accepted =
        response::accepted(BASE, response::DEFAULT_TASKS_PATH, &id, "bulk_import_users");
    assert_eq!(accepted.status_code(), 202);
    assert_eq!(
        accepted.location,
        format!("http://localhost:3001/api/users/tasks/{}", id)
    );

    let pending = tracker.require(&id).unwrap();
    assert_eq!(pending.status, TaskStatus::Pending);
    let pending_tag = fingerprint_json(&pending).unwrap();

    // simulated work takes between two and five seconds
    tokio::time::sleep(Duration::from_secs(6)).await;

    let done = tracker.require(&id).unwrap();
    assert_eq!(done.status, TaskStatus::Completed);
    assert!(done.error.is_none());
    assert!(done.updated_at >= done.created_at);

    let result = tracker.result(&id).unwrap();
    assert_eq!(result["taskId"], json!(id));
    assert_eq!(
        result["message"],
        "Task bulk_import_users completed successfully"
    );

    // the representation changed, so the old tag no longer short-circuits
    let done_tag = fingerprint_json(&done).unwrap();
    assert_ne!(pending_tag, done_tag);
    assert_eq!(
        evaluate_read_precondition(Some(pending_tag.as_str()), &done_tag),
        ReadPrecondition::Proceed
    );
    assert!(evaluate_read_precondition(Some(done_tag.as_str()), &done_tag).short_circuit());

    let status = response::task_status(BASE, response::DEFAULT_TASKS_PATH, &done);
    assert!(status.task.links.contains("result"));

    let body = response::task_result(BASE, response::DEFAULT_TASKS_PATH, &done).unwrap();
    assert_eq!(body.result, result);

    tracker.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn concurrent_imports_all_finish() {
    let tracker = TaskTracker::new(config(4)).unwrap();
    tracker.start().await.unwrap();

    let ids: Vec<TaskId> = (0..10)
        .map(|i| {
            tracker
                .register("bulk_import_users", json!({"batch": i}))
                .unwrap()
        })
        .collect();

    let mut unique = ids.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), ids.len());

    tokio::time::sleep(Duration::from_secs(30)).await;

    for id in &ids {
        let task = tracker.require(id).unwrap();
        assert_eq!(task.status, TaskStatus::Completed, "task {}", id);
        assert_eq!(task.result.as_ref().unwrap()["taskId"], json!(id));
    }

    let stats = tracker.stats().unwrap();
    assert_eq!(stats.completed, 10);
    assert_eq!(stats.pending + stats.processing + stats.failed, 0);
    assert_eq!(tracker.worker_stats().await.unwrap().tasks_completed, 10);

    tracker.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn result_before_completion_is_rejected() {
    let tracker = TaskTracker::new(config(1)).unwrap();
    tracker.start().await.unwrap();
    let id = tracker.register("bulk_import_users", json!({})).unwrap();

    let err = assert_err!(tracker.result(&id));
    let body = response::ErrorBody::from(&err);
    assert_eq!(body.status_code, 400);
    assert!(body.message.starts_with("Task is not completed. Current status: "));

    let missing = tracker.require("task_nope").unwrap_err();
    assert_eq!(response::ErrorBody::from(&missing).status_code, 404);

    tracker.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn shutdown_cancels_simulated_work() {
    let tracker = TaskTracker::new(config(1)).unwrap();
    tracker.start().await.unwrap();

    let running = tracker.register("bulk_import_users", json!({})).unwrap();
    let queued = tracker.register("bulk_import_users", json!({})).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(
        tracker.require(&running).unwrap().status,
        TaskStatus::Processing
    );

    tracker.shutdown().await.unwrap();

    let task = tracker.require(&running).unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert!(task.error.unwrap().contains("cancelled"));

    // never dispatched, but still ends in a terminal state
    let task = tracker.require(&queued).unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.error.as_deref(), Some(INTERRUPTED_MESSAGE));

    tokio::time::sleep(Duration::from_secs(2 * 3600)).await;
    let stats = tracker.stats().unwrap();
    assert_eq!(stats.pending + stats.processing, 0);
    assert_eq!(stats.failed, 2);
    assert!(matches!(tracker.start().await, Err(PawpalError::ShutDown)));
}

#[tokio::test(start_paused = true)]
async fn retention_reclaims_completed_tasks_from_shared_store() {
    let store = Arc::new(InMemoryTaskStore::new());
    let config = config(1);
    let handler = Arc::new(HandlerRegistry::simulated(&config.workers));
    let tracker = TaskTracker::with_parts(config, store.clone(), handler).unwrap();
    tracker.start().await.unwrap();

    let id = tracker.register("bulk_import_users", json!({})).unwrap();
    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(tracker.require(&id).unwrap().status, TaskStatus::Completed);

    // well inside the one hour retention window
    assert_eq!(tracker.sweep().unwrap(), 0);

    let later = Utc::now() + chrono::Duration::hours(2);
    assert_eq!(store.sweep_completed(later).unwrap(), 1);
    assert!(tracker.get(&id).unwrap().is_none());

    tracker.shutdown().await.unwrap();
}

#[derive(Debug, Clone, Serialize)]
struct User {
    id: u64,
    name: String,
    email: String,
}

#[test]
fn optimistic_concurrency_on_user_updates() {
    let mut user = User {
        id: 1,
        name: "Ana".to_string(),
        email: "ana@pawpal.dev".to_string(),
    };

    let tag = fingerprint_json(&user).unwrap();

    // first writer holds the current tag
    let first = Preconditions::from_headers([("If-Match", tag.as_str())]);
    assert_ok!(first.ensure_write(&tag));
    user.name = "Ana Maria".to_string();

    // second writer still holds the old one
    let current = fingerprint_json(&user).unwrap();
    let second = Preconditions::from_headers([("If-Match", tag.as_str())]);
    let err = assert_err!(second.ensure_write(&current));
    assert_eq!(response::ErrorBody::from(&err).status_code, 412);

    // no header at all is an unconditional write
    assert_ok!(Preconditions::default().ensure_write(&current));
}

#[test]
fn pagination_links_for_user_listing() {
    let links = generate_links(&LinkOptions {
        base_url: BASE.to_string(),
        path: "/api/users".to_string(),
        query: vec![("role".to_string(), "dog walker".to_string())],
        page: Some(3),
        limit: Some(20),
        total: Some(45),
        ..Default::default()
    });

    assert_eq!(
        links.get("prev").unwrap().href,
        "http://localhost:3001/api/users?role=dog%20walker&page=2&limit=20"
    );
    assert!(!links.contains("next"));
    assert!(!links.contains("last"));
}
