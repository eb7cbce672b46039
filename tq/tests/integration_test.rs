//! Integration tests for timequeue
//!
//! These tests drive the public API end to end and smoke-test the `tq` binary.

use std::sync::Arc;
use std::time::Duration;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;
use tokio::time::Instant;

use timequeue::{CancelReason, Context, QueueConfig, SequentialIdGenerator, TimeQueue, TimeQueueError};

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

// =============================================================================
// Queue Tests
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_earlier_message_preempts_blocked_dequeue() {
    let queue = Arc::new(TimeQueue::new());
    let ctx = Context::background();
    let start = Instant::now();

    queue.enqueue_with_id(&ctx, "a", "A", start + secs(5), 0).await.unwrap();

    let consumer = {
        let queue = Arc::clone(&queue);
        tokio::spawn(async move {
            let ctx = Context::background();
            let first = queue.dequeue(&ctx).await.unwrap();
            let second = queue.dequeue(&ctx).await.unwrap();
            (first, second)
        })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    queue.enqueue_with_id(&ctx, "b", "B", start + secs(1), 0).await.unwrap();

    let ((b, b_fired), (a, a_fired)) = consumer.await.unwrap();
    assert_eq!(b.value, "B");
    assert!(b_fired >= start + secs(1));
    assert!(b_fired < start + secs(2), "B should not wait for A's timer");
    assert_eq!(a.value, "A");
    assert!(a_fired >= start + secs(5));
}

#[tokio::test(start_paused = true)]
async fn test_equal_instants_release_lower_priority_first() {
    let queue = TimeQueue::new();
    let ctx = Context::background();
    let at = Instant::now() + secs(1);

    queue.enqueue_with_id(&ctx, "c", "C", at, 5).await.unwrap();
    queue.enqueue_with_id(&ctx, "d", "D", at, 1).await.unwrap();

    assert_eq!(queue.dequeue(&ctx).await.unwrap().0.value, "D");
    assert_eq!(queue.dequeue(&ctx).await.unwrap().0.value, "C");
}

#[tokio::test(start_paused = true)]
async fn test_past_instants_release_immediately_in_order() {
    let queue = TimeQueue::new();
    let ctx = Context::background();
    tokio::time::advance(secs(10)).await;
    let now = Instant::now();

    queue.enqueue_with_id(&ctx, "late", 2, now - secs(1), 0).await.unwrap();
    queue.enqueue_with_id(&ctx, "later", 1, now - secs(5), 0).await.unwrap();

    let (first, fired_at) = queue.dequeue(&ctx).await.unwrap();
    assert_eq!(first.value, 1);
    assert!(fired_at < now + secs(1));
    assert_eq!(queue.dequeue(&ctx).await.unwrap().0.value, 2);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_dequeue_then_recovery() {
    let queue = Arc::new(TimeQueue::new());
    let start = Instant::now();
    let ctx = Context::background();
    queue.enqueue_with_id(&ctx, "x", (), start + secs(3), 0).await.unwrap();

    let cancel = Context::background();
    let blocked = {
        let queue = Arc::clone(&queue);
        let cancel = cancel.clone();
        tokio::spawn(async move { queue.dequeue(&cancel).await })
    };
    tokio::time::sleep(secs(1)).await;
    cancel.cancel();

    let err = blocked.await.unwrap().unwrap_err();
    assert!(matches!(err, TimeQueueError::Cancelled(CancelReason::Cancelled)));
    assert_eq!(queue.len(&ctx).await.unwrap(), 1);

    let (msg, fired_at) = queue.dequeue(&ctx).await.unwrap();
    assert_eq!(msg.id, "x");
    assert!(fired_at >= start + secs(3));
}

#[tokio::test(start_paused = true)]
async fn test_unload_returns_everything_and_resets() {
    let queue = TimeQueue::with_id_generator(QueueConfig::default(), Arc::new(SequentialIdGenerator::new("job")));
    let ctx = Context::background();
    let start = Instant::now();

    for i in 0..20u64 {
        queue.enqueue(&ctx, i, start + Duration::from_millis(1000 - i * 10), 0).await.unwrap();
    }

    let mut values: Vec<u64> = queue.unload(&ctx).await.unwrap().iter().map(|m| m.value).collect();
    values.sort();
    assert_eq!(values, (0..20).collect::<Vec<_>>());
    assert!(queue.is_empty(&ctx).await.unwrap());
    assert!(queue.peek(&ctx).await.unwrap().is_none());

    // Ids of unloaded messages are free again
    queue.enqueue_with_id(&ctx, "job-1", 99, start, 0).await.unwrap();
    assert_eq!(queue.dequeue(&ctx).await.unwrap().0.value, 99);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_producers_never_release_early() {
    let queue = Arc::new(TimeQueue::new());
    let start = Instant::now();

    let producers: Vec<_> = (0..8u64)
        .map(|p| {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move {
                let ctx = Context::background();
                for i in 0..25u64 {
                    let delay = Duration::from_millis((p * 37 + i * 53) % 900);
                    let priority = ((p + i) % 4) as i64;
                    queue
                        .enqueue_with_id(&ctx, format!("p{}-{}", p, i), (p, i), start + delay, priority)
                        .await
                        .unwrap();
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    let ctx = Context::background();
    let mut delivered = Vec::new();
    for _ in 0..200 {
        let (msg, fired_at) = queue.dequeue(&ctx).await.unwrap();
        assert!(fired_at >= msg.at, "released before its instant");
        delivered.push(msg);
    }
    for producer in producers {
        producer.await.unwrap();
    }

    assert!(queue.is_empty(&ctx).await.unwrap());
    let mut ids: Vec<&str> = delivered.iter().map(|m| m.id.as_str()).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 200);
}

#[tokio::test(start_paused = true)]
async fn test_remove_before_due_never_delivers() {
    let queue = Arc::new(TimeQueue::new());
    let ctx = Context::background();
    let start = Instant::now();

    for (id, ms) in [("keep-1", 100), ("drop", 200), ("keep-2", 300)] {
        queue
            .enqueue_with_id(&ctx, id, id, start + Duration::from_millis(ms), 0)
            .await
            .unwrap();
    }
    assert_eq!(queue.remove(&ctx, "drop").await.unwrap().value, "drop");

    let timed = Context::with_timeout(secs(1));
    let mut ids = Vec::new();
    while let Ok((msg, _)) = queue.dequeue(&timed).await {
        ids.push(msg.id.clone());
    }
    assert_eq!(ids, vec!["keep-1", "keep-2"]);
}

// =============================================================================
// CLI Tests
// =============================================================================

/// `tq` with config, data and working directories isolated in `dir`
fn tq(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("tq").expect("tq binary should build");
    cmd.current_dir(dir.path())
        .env("HOME", dir.path())
        .env("XDG_CONFIG_HOME", dir.path().join("config"))
        .env("XDG_DATA_HOME", dir.path().join("data"));
    cmd
}

#[test]
fn test_cli_help() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    tq(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run").and(predicate::str::contains("demo")));
}

#[test]
fn test_cli_run_json() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let output = tq(&dir)
        .args(["run", "b@40", "a@0", "gone@20", "--remove", "gone", "--format", "json"])
        .output()
        .expect("Failed to run tq");
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    let ids: Vec<&str> = report["delivered"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["a", "b"]);
    assert_eq!(report["removed"][0], "gone");
}

#[test]
fn test_cli_run_rejects_bad_item() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    tq(&dir)
        .args(["run", "nodelay"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("NAME@DELAY_MS"));
}

#[test]
fn test_cli_demo_uses_local_config() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    std::fs::write(dir.path().join(".timequeue.yml"), "demo:\n  count: 4\n  max-delay-ms: 30\n")
        .expect("Failed to write config");

    let output = tq(&dir)
        .args(["demo", "--seed", "1", "--format", "json"])
        .output()
        .expect("Failed to run tq");
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    assert_eq!(report["delivered"].as_array().unwrap().len(), 4);
}
