// Mutation/reload exclusion: bounded waits on an in-flight reload
//
// Reloads are held in flight by stalling the file-system stamp taken at the
// start of a reload. Reads racing a reload must neither wait past the cap
// nor repeat a reload that already covers the change they saw. Multi-threaded runtime: the stalled reload blocks one
// worker while the mutation runs on another.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{eventually, external_create, fast_config, Fixture};
use corkboard_core::logging_facility::test_capture::init_test_capture;
use corkboard_core::ops::NewIssue;
use corkboard_engine::{AdapterConfig, BoardBackend};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Level;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_mutation_proceeds_after_stuck_reload_with_warning() {
    let capture = init_test_capture();
    let fixture = Fixture::new();
    // Cap: 10 ms x 10 attempts
    let adapter = Arc::new(fixture.adapter());
    adapter.connect().await.unwrap();

    fixture.fs.stall_next_stamp(Duration::from_millis(800));
    let reload = {
        let adapter = Arc::clone(&adapter);
        tokio::spawn(async move { adapter.reload_now().await })
    };
    assert!(eventually(Duration::from_secs(2), || adapter.status().is_reloading).await);

    let started = Instant::now();
    let id = adapter
        .create_issue(NewIssue::new("Written during a stuck reload"))
        .await
        .unwrap();
    assert!(started.elapsed() < Duration::from_millis(600));
    assert!(!adapter.status().is_reloading);

    // The stalled reload finishes late and must not replace the live engine
    assert!(!reload.await.unwrap().unwrap());
    let board = adapter.get_board().await.unwrap();
    assert!(board.card(&id).is_some());
    assert_eq!(adapter.status().reloads, 0);

    let warnings = capture.count_with_code(Level::WARN, "ERR_STUCK_STATE");
    assert!(warnings >= 1, "expected a stuck-state warning");

    adapter.dispose().await;
    assert_eq!(fixture.issues_on_disk(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_mutation_waits_for_reload_to_finish() {
    let fixture = Fixture::new();
    let adapter = Arc::new(fixture.adapter_with(AdapterConfig {
        reload_wait_interval_ms: 50,
        reload_wait_max_attempts: 100,
        ..fast_config(&fixture.db)
    }));
    adapter.connect().await.unwrap();

    fixture.fs.stall_next_stamp(Duration::from_millis(150));
    let reload = {
        let adapter = Arc::clone(&adapter);
        tokio::spawn(async move { adapter.reload_now().await })
    };
    assert!(eventually(Duration::from_secs(2), || adapter.status().is_reloading).await);

    let id = adapter
        .create_issue(NewIssue::new("Applied after the reload"))
        .await
        .unwrap();
    assert!(reload.await.unwrap().unwrap());

    // The reload completed first, so the mutation landed on the new engine
    assert_eq!(adapter.status().reloads, 1);
    assert!(adapter.get_board().await.unwrap().card(&id).is_some());
    adapter.dispose().await;
    assert_eq!(fixture.issues_on_disk(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_reads_wait_for_reload_to_finish() {
    let fixture = Fixture::new();
    let adapter = Arc::new(fixture.adapter_with(AdapterConfig {
        reload_wait_interval_ms: 50,
        reload_wait_max_attempts: 100,
        ..fast_config(&fixture.db)
    }));
    adapter.connect().await.unwrap();

    fixture.fs.stall_next_stamp(Duration::from_millis(150));
    let reload = {
        let adapter = Arc::clone(&adapter);
        tokio::spawn(async move { adapter.reload_now().await })
    };
    assert!(eventually(Duration::from_secs(2), || adapter.status().is_reloading).await);

    adapter.get_board().await.unwrap();
    assert!(!adapter.status().is_reloading);
    assert_eq!(adapter.status().reloads, 1);
    assert!(reload.await.unwrap().unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_read_after_reload_does_not_repeat_it() {
    let fixture = Fixture::new();
    let adapter = Arc::new(fixture.adapter_with(AdapterConfig {
        reload_wait_interval_ms: 50,
        reload_wait_max_attempts: 100,
        ..fast_config(&fixture.db)
    }));
    adapter.connect().await.unwrap();
    external_create(&fixture.db, "Written elsewhere");

    fixture.fs.stall_next_stamp(Duration::from_millis(150));
    let reload = {
        let adapter = Arc::clone(&adapter);
        tokio::spawn(async move { adapter.reload_now().await })
    };
    assert!(eventually(Duration::from_secs(2), || adapter.status().is_reloading).await);

    // The read saw the rewrite too, but the running reload already covers it
    let board = adapter.get_board().await.unwrap();
    assert_eq!(board.len(), 1);
    assert!(reload.await.unwrap().unwrap());
    assert_eq!(adapter.status().reloads, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_read_during_stuck_reload_stays_bounded() {
    let fixture = Fixture::new();
    // Cap: 10 ms x 10 attempts
    let adapter = Arc::new(fixture.adapter());
    adapter.connect().await.unwrap();
    external_create(&fixture.db, "Written elsewhere");

    fixture.fs.stall_next_stamp(Duration::from_millis(800));
    let reload = {
        let adapter = Arc::clone(&adapter);
        tokio::spawn(async move { adapter.reload_now().await })
    };
    assert!(eventually(Duration::from_secs(2), || adapter.status().is_reloading).await);

    // Served from the live engine while the stuck reload holds the store
    let started = Instant::now();
    let board = adapter.get_board().await.unwrap();
    assert!(started.elapsed() < Duration::from_millis(600));
    assert_eq!(board.len(), 0);
    assert_eq!(adapter.status().reloads, 0);

    // The superseded reload drops its result; the next read picks the change up
    assert!(!reload.await.unwrap().unwrap());
    let board = adapter.get_board().await.unwrap();
    assert_eq!(board.len(), 1);
    assert_eq!(adapter.status().reloads, 1);
}
