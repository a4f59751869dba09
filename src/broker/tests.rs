use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tempfile::TempDir;

use super::request::Request;
use super::{Broker, interpret};
use crate::config::Settings;
use crate::queue::memory::MemoryQueue;
use crate::queue::{QueueEvent, QueueHandle, RawMessage};
use crate::router::RouteOutcome;
use crate::utils::error::QueueError;
use crate::workers::{LoadError, Registry, WorkerFn, WorkerSource};

/// Worker source driven by file content: `ok` succeeds, `fail` fails.
struct OutcomeSource;

impl WorkerSource for OutcomeSource {
    fn extension(&self) -> &str {
        "worker"
    }

    fn load(&self, path: &Path) -> Result<WorkerFn, LoadError> {
        let fail = fs::read_to_string(path)
            .map(|content| content.trim() == "fail")
            .unwrap_or(false);

        let worker: WorkerFn = Arc::new(move |_req, _queue| {
            Box::pin(async move {
                if fail {
                    Err("worker failure".into())
                } else {
                    Ok(())
                }
            })
        });
        Ok(worker)
    }
}

fn setup(files: &[(&str, &str)], settings: &Settings) -> (TempDir, Arc<Broker>, Arc<MemoryQueue>) {
    let dir = tempfile::tempdir().unwrap();
    for (rel, content) in files {
        let path = dir.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    let registry = Arc::new(Registry::load(dir.path(), Arc::new(OutcomeSource)).unwrap());
    let (queue, _events) = MemoryQueue::channel();
    let handle: QueueHandle = queue.clone();
    let broker = Broker::new(settings, handle, registry).unwrap();
    (dir, broker, queue)
}

fn raw(body: &str, receive_count: u32) -> RawMessage {
    RawMessage {
        id: format!("id-{body}"),
        body: body.to_string(),
        receive_count,
        sent: Utc::now(),
    }
}

async fn dispatch(broker: &Arc<Broker>, event: QueueEvent) {
    if let Some(handle) = broker.clone().dispatch(event) {
        handle.await.unwrap();
    }
}

#[tokio::test]
async fn test_successful_message_is_deleted() {
    let settings = Settings::default();
    let (_dir, broker, queue) = setup(&[("greet.worker", "ok")], &settings);

    dispatch(&broker, QueueEvent::Data(raw("greet:hi", 1))).await;

    assert_eq!(queue.deleted(), vec!["id-greet:hi"]);
}

#[tokio::test]
async fn test_failure_with_retries_left_is_not_deleted() {
    let settings = Settings::default();
    let (_dir, broker, queue) = setup(&[("fragile.worker", "fail")], &settings);

    dispatch(&broker, QueueEvent::Data(raw("fragile:x", 1))).await;

    assert!(queue.deleted().is_empty());
}

#[tokio::test]
async fn test_failure_with_no_retries_left_is_deleted() {
    let settings = Settings::default();
    let (_dir, broker, queue) = setup(&[("fragile.worker", "fail")], &settings);

    // receive count has caught up with the configured retry ceiling
    dispatch(&broker, QueueEvent::Data(raw("fragile:x", 10))).await;

    assert_eq!(queue.deleted(), vec!["id-fragile:x"]);
}

#[tokio::test]
async fn test_unroutable_message_is_deleted_without_invoking_workers() {
    let settings = Settings::default();
    let (_dir, broker, queue) = setup(&[("greet.worker", "ok")], &settings);

    dispatch(&broker, QueueEvent::Data(raw("unknown:address", 1))).await;

    assert_eq!(queue.deleted(), vec!["id-unknown:address"]);
}

#[tokio::test]
async fn test_gate_pauses_polling_at_the_limit_and_resumes_after() {
    let mut settings = Settings::default();
    settings.throttle.workers = 1;
    let (_dir, broker, queue) = setup(&[("greet.worker", "ok")], &settings);

    let msg = raw("greet:hi", 1);
    dispatch(&broker, QueueEvent::Available(msg.clone())).await;
    assert!(queue.is_paused());

    dispatch(&broker, QueueEvent::Data(msg)).await;
    assert!(!queue.is_paused());
    assert_eq!(broker.throttle().count(), 0);
    assert_eq!(queue.deleted().len(), 1);
}

#[tokio::test]
async fn test_rejected_admission_leaves_the_message_and_frees_the_slot() {
    let mut settings = Settings::default();
    settings.throttle.queue.unit = "minute".to_string();
    settings.throttle.queue.value = 1;
    let (_dir, broker, queue) = setup(&[("greet.worker", "ok")], &settings);

    dispatch(&broker, QueueEvent::Available(raw("greet:a", 1))).await;
    dispatch(&broker, QueueEvent::Available(raw("greet:b", 1))).await;
    dispatch(&broker, QueueEvent::Data(raw("greet:a", 1))).await;
    dispatch(&broker, QueueEvent::Data(raw("greet:b", 1))).await;

    // the second message was rejected: not deleted, no worker invoked,
    // but its concurrency slot was released
    assert_eq!(queue.deleted(), vec!["id-greet:a"]);
    assert_eq!(broker.throttle().count(), 0);
}

#[tokio::test]
async fn test_queue_error_event_is_classified_without_panicking() {
    let settings = Settings::default();
    let (_dir, broker, queue) = setup(&[("greet.worker", "ok")], &settings);

    dispatch(
        &broker,
        QueueEvent::Error {
            cause: "connection reset".to_string(),
            body: "XXX".to_string(),
        },
    )
    .await;

    assert!(queue.deleted().is_empty());
}

fn completed_request(message: &str, address: &[&str], retries: u32) -> Request {
    Request {
        message: message.to_string(),
        address: address.iter().map(|s| s.to_string()).collect(),
        data: None,
        retries,
        deadline: Utc::now() + Duration::seconds(30),
        age: Duration::zero(),
        sent: Utc::now(),
    }
}

fn failed() -> RouteOutcome {
    RouteOutcome::Completed(Err("boom".into()))
}

#[test]
fn test_interpret_success_acknowledges_without_classification() {
    let req = completed_request("a:b", &["a", "b"], 5);
    let (ack, err) = interpret(&req, &RouteOutcome::Completed(Ok(())), Utc::now());

    assert!(ack);
    assert!(err.is_none());
}

#[test]
fn test_interpret_failure_with_retries_is_a_worker_error() {
    let req = completed_request("a:b", &["a", "b"], 5);
    let (ack, err) = interpret(&req, &failed(), Utc::now());

    assert!(!ack);
    assert!(matches!(err, Some(QueueError::Worker { .. })));
}

#[test]
fn test_interpret_exhausted_retries_supersede_the_worker_error() {
    let req = completed_request("a:b", &["a", "b"], 0);
    let (ack, err) = interpret(&req, &failed(), Utc::now());

    assert!(ack);
    assert!(matches!(err, Some(QueueError::Exceeded { .. })));
}

#[test]
fn test_interpret_failure_without_an_address_is_invalid() {
    let req = completed_request("a:b", &[], 5);
    let (ack, err) = interpret(&req, &failed(), Utc::now());

    assert!(!ack);
    assert!(matches!(err, Some(QueueError::Invalid { .. })));
}

#[test]
fn test_interpret_timeout_overrides_every_other_classification() {
    let mut req = completed_request("a:b", &["a", "b"], 0);
    req.deadline = Utc::now() - Duration::seconds(1);
    let (ack, err) = interpret(&req, &failed(), Utc::now());

    assert!(ack);
    assert!(matches!(err, Some(QueueError::Timeout { .. })));
}

#[test]
fn test_interpret_timeout_applies_even_on_success() {
    let mut req = completed_request("a:b", &["a", "b"], 5);
    req.deadline = Utc::now() - Duration::seconds(1);
    let (ack, err) = interpret(&req, &RouteOutcome::Completed(Ok(())), Utc::now());

    assert!(ack);
    assert!(matches!(err, Some(QueueError::Timeout { .. })));
}

#[test]
fn test_interpret_unrouted_completion_is_silent() {
    let req = completed_request("unknown", &[], 5);
    let (ack, err) = interpret(&req, &RouteOutcome::Unrouted, Utc::now());

    assert!(ack);
    assert!(err.is_none());
}
