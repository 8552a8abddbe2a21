// Integration tests for the board adapter: connect, debounced publish,
// external change detection, reload and dispose

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{bump_mtime, eventually, external_create, fast_config, Fixture};
use corkboard_core::model::{IssueStatus, Relation, RelationKind};
use corkboard_core::ops::NewIssue;
use corkboard_engine::{AdapterConfig, BoardAdapter, BoardBackend, ErrorKind};
use corkboard_store::{init_database, SqliteEngine};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const SETTLE: Duration = Duration::from_secs(2);

fn slow_debounce(fixture: &Fixture) -> BoardAdapter {
    fixture.adapter_with(AdapterConfig {
        debounce_ms: 10_000,
        ..fast_config(&fixture.db)
    })
}

// ---------------------------------------------------------------------------
// connect
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_connect_missing_store_fails() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("absent.db");
    let adapter = BoardAdapter::new(fast_config(&db)).unwrap();

    let err = adapter.connect().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connection);
    assert!(!err.message().contains(dir.path().to_str().unwrap()));

    let err = adapter.get_board().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connection);
    assert!(!db.exists());
}

#[tokio::test]
async fn test_connect_rejects_foreign_file() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("notes.db");
    std::fs::write(&db, b"plain text, not a board").unwrap();

    let adapter = BoardAdapter::new(fast_config(&db)).unwrap();
    let err = adapter.connect().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connection);
}

#[tokio::test]
async fn test_connect_is_idempotent() {
    let fixture = Fixture::new();
    let adapter = fixture.adapter();

    adapter.connect().await.unwrap();
    adapter.connect().await.unwrap();

    let status = adapter.status();
    assert!(status.connected);
    assert_eq!(status.phase, "idle");
    assert_eq!(adapter.store_path(), Some(fixture.db.clone()));
}

#[tokio::test]
async fn test_connect_discovers_store_under_search_root() {
    let fixture = Fixture::new();
    let adapter = fixture.adapter_with(AdapterConfig {
        database: None,
        search_root: fixture.dir.path().to_path_buf(),
        ..fast_config(&fixture.db)
    });

    adapter.connect().await.unwrap();
    assert_eq!(adapter.store_path(), Some(fixture.db.clone()));
}

#[test]
fn test_invalid_config_rejected() {
    let fixture = Fixture::new();
    let config = AdapterConfig {
        reload_wait_max_attempts: 0,
        ..fast_config(&fixture.db)
    };
    let err = BoardAdapter::new(config).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
}

// ---------------------------------------------------------------------------
// mutations and publish
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_burst_of_mutations_publishes_once() {
    let fixture = Fixture::new();
    let adapter = fixture.adapter_with(AdapterConfig {
        debounce_ms: 150,
        ..fast_config(&fixture.db)
    });

    adapter.create_issue(NewIssue::new("First")).await.unwrap();
    adapter.create_issue(NewIssue::new("Second")).await.unwrap();
    adapter.create_issue(NewIssue::new("Third")).await.unwrap();
    assert!(adapter.is_dirty());
    assert_eq!(fixture.fs.renames(), 0);

    assert!(eventually(SETTLE, || !adapter.is_dirty()).await);
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(fixture.fs.renames(), 1);
    assert_eq!(adapter.status().publishes, 1);
    assert_eq!(fixture.issues_on_disk(), 3);
    assert!(!fixture.tmp_path().exists());
}

#[tokio::test]
async fn test_mutation_visible_before_publish() {
    let fixture = Fixture::new();
    let adapter = slow_debounce(&fixture);

    let before = adapter.get_board().await.unwrap();
    assert!(before.is_empty());

    let id = adapter.create_issue(NewIssue::new("Fresh")).await.unwrap();
    let after = adapter.get_board().await.unwrap();

    assert!(after.card(&id).is_some());
    assert_eq!(fixture.fs.renames(), 0);
    adapter.dispose().await;
}

#[tokio::test]
async fn test_repeated_reads_served_from_snapshot() {
    let fixture = Fixture::new();
    let adapter = fixture.adapter();
    adapter.create_issue(NewIssue::new("Cached")).await.unwrap();

    let first = adapter.get_board().await.unwrap();
    let second = adapter.get_board().await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    adapter.dispose().await;
}

#[tokio::test]
async fn test_validation_error_leaves_state_clean() {
    let fixture = Fixture::new();
    let adapter = fixture.adapter();

    let err = adapter.create_issue(NewIssue::new("   ")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(!adapter.is_dirty());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(fixture.fs.renames(), 0);
}

#[tokio::test]
async fn test_unknown_issue_is_not_found() {
    let fixture = Fixture::new();
    let adapter = fixture.adapter();

    let err = adapter
        .set_status("bd-ffffff", IssueStatus::Closed)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(!adapter.is_dirty());
}

#[tokio::test]
async fn test_noop_mutation_does_not_dirty() {
    let fixture = Fixture::new();
    let adapter = slow_debounce(&fixture);
    let id = adapter.create_issue(NewIssue::new("Labelled")).await.unwrap();
    adapter.flush().await.unwrap();

    assert!(adapter.add_label(&id, "ui").await.unwrap());
    adapter.flush().await.unwrap();
    assert!(!adapter.add_label(&id, "ui").await.unwrap());
    assert!(!adapter.is_dirty());
    adapter.dispose().await;
}

#[tokio::test]
async fn test_backend_operations_through_trait_object() {
    let fixture = Fixture::new();
    let adapter = fixture.adapter();
    let backend: &dyn BoardBackend = &adapter;

    let schema = backend.create_issue(NewIssue::new("Schema")).await.unwrap();
    let api = backend
        .create_issue(NewIssue::new("API").with_priority(1))
        .await
        .unwrap();
    backend
        .add_relation(Relation {
            issue_id: api.clone(),
            depends_on_id: schema.clone(),
            kind: RelationKind::Blocks,
        })
        .await
        .unwrap();
    backend.add_label(&api, "backend").await.unwrap();
    backend
        .set_status(&schema, IssueStatus::InProgress)
        .await
        .unwrap();
    let comment = backend.add_comment(&api, "ana", "waiting on schema").await.unwrap();
    assert_eq!(comment.issue_id, api);

    let board = backend.get_board().await.unwrap();
    let card = board.card(&api).unwrap();
    assert_eq!(card.blocked_by, vec![schema.clone()]);
    assert_eq!(card.labels, vec!["backend".to_string()]);
    assert!(!card.is_ready);
    assert_eq!(
        board.card(&schema).unwrap().issue.status,
        IssueStatus::InProgress
    );

    let detail = backend.get_issue(&api).await.unwrap();
    assert_eq!(detail.comments.len(), 1);

    backend.dispose().await;
    assert_eq!(fixture.issues_on_disk(), 2);
}

// ---------------------------------------------------------------------------
// publish failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_publish_failure_keeps_changes_pending() {
    let fixture = Fixture::new();
    let adapter = fixture.adapter_with(AdapterConfig {
        debounce_ms: 50,
        ..fast_config(&fixture.db)
    });
    fixture.fs.fail_next_renames(5);

    adapter.create_issue(NewIssue::new("Precious")).await.unwrap();
    let err = adapter.flush().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Persistence);
    assert!(err.is_retryable());
    assert!(adapter.is_dirty());
    let status = adapter.status();
    assert_eq!(status.phase, "dirty");
    assert!(status.last_error.is_some());
    assert_eq!(status.publishes, 0);
    assert!(!fixture.tmp_path().exists());
    assert_eq!(fixture.issues_on_disk(), 0);

    adapter.schedule_save();
    assert!(eventually(SETTLE, || !adapter.is_dirty()).await);

    assert_eq!(fixture.fs.renames(), 1);
    assert!(adapter.status().last_error.is_none());
    assert_eq!(fixture.issues_on_disk(), 1);
}

#[tokio::test]
async fn test_transient_rename_failures_are_absorbed() {
    let fixture = Fixture::new();
    let adapter = slow_debounce(&fixture);
    fixture.fs.fail_next_renames(4);

    adapter.create_issue(NewIssue::new("Retried")).await.unwrap();
    adapter.flush().await.unwrap();

    assert!(!adapter.is_dirty());
    assert_eq!(fixture.fs.renames(), 1);
    assert_eq!(fixture.issues_on_disk(), 1);
}

#[tokio::test]
async fn test_mutation_during_publish_gets_its_own_publish() {
    let fixture = Fixture::new();
    // One failed rename holds the first publish in its backoff
    let adapter = fixture.adapter_with(AdapterConfig {
        publish_initial_backoff_ms: 200,
        publish_max_backoff_ms: 200,
        ..fast_config(&fixture.db)
    });
    fixture.fs.fail_next_renames(1);

    adapter.create_issue(NewIssue::new("First")).await.unwrap();
    assert!(eventually(SETTLE, || adapter.status().is_saving).await);

    adapter.create_issue(NewIssue::new("Second")).await.unwrap();
    let status = adapter.status();
    assert!(status.is_saving);
    assert!(status.is_dirty);

    assert!(eventually(SETTLE, || !adapter.is_dirty()).await);
    assert_eq!(adapter.status().publishes, 2);
    assert_eq!(fixture.fs.renames(), 2);
    assert_eq!(fixture.issues_on_disk(), 2);
}

#[tokio::test]
async fn test_readers_only_ever_see_complete_files() {
    let fixture = Fixture::new();
    let adapter = slow_debounce(&fixture);

    let stop = Arc::new(AtomicBool::new(false));
    let loads = Arc::new(AtomicUsize::new(0));
    let reader = {
        let stop = Arc::clone(&stop);
        let loads = Arc::clone(&loads);
        let db = fixture.db.clone();
        std::thread::spawn(move || {
            while !stop.load(Ordering::SeqCst) {
                let engine = SqliteEngine::load(&db).expect("reader saw a partial file");
                engine.board().expect("reader saw an unreadable file");
                loads.fetch_add(1, Ordering::SeqCst);
            }
        })
    };

    for n in 0..15 {
        adapter
            .create_issue(NewIssue::new(format!("Issue {}", n)))
            .await
            .unwrap();
        adapter.flush().await.unwrap();
    }
    stop.store(true, Ordering::SeqCst);
    reader.join().unwrap();

    assert!(loads.load(Ordering::SeqCst) > 0);
    assert_eq!(fixture.fs.renames(), 15);
    assert_eq!(fixture.issues_on_disk(), 15);
    assert!(!fixture.tmp_path().exists());
}

// ---------------------------------------------------------------------------
// external changes and reload
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_external_rewrite_detected_before_next_read() {
    let fixture = Fixture::new();
    let adapter = fixture.adapter();

    assert!(adapter.get_board().await.unwrap().is_empty());
    external_create(&fixture.db, "Written elsewhere");

    let board = adapter.get_board().await.unwrap();
    assert_eq!(board.len(), 1);
    assert_eq!(adapter.status().reloads, 1);
}

#[tokio::test]
async fn test_own_publish_is_not_reloaded() {
    let fixture = Fixture::new();
    let adapter = fixture.adapter();

    adapter.create_issue(NewIssue::new("Mine")).await.unwrap();
    adapter.flush().await.unwrap();
    adapter.get_board().await.unwrap();
    assert!(!adapter.on_change_hint().await.unwrap());

    assert_eq!(adapter.status().reloads, 0);
}

#[tokio::test]
async fn test_self_save_window_suppresses_reload() {
    let fixture = Fixture::new();
    let adapter = fixture.adapter();

    adapter.create_issue(NewIssue::new("Mine")).await.unwrap();
    adapter.flush().await.unwrap();

    // A stamp change right after our publish is attributed to it
    bump_mtime(&fixture.db, Duration::from_secs(5));
    assert!(!adapter.on_change_hint().await.unwrap());
    assert_eq!(adapter.status().reloads, 0);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(adapter.on_change_hint().await.unwrap());
    assert_eq!(adapter.status().reloads, 1);
    assert_eq!(adapter.get_board().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_reload_publishes_pending_changes_first() {
    let fixture = Fixture::new();
    let adapter = slow_debounce(&fixture);

    let id = adapter.create_issue(NewIssue::new("Unsaved")).await.unwrap();
    assert_eq!(fixture.issues_on_disk(), 0);

    assert!(adapter.reload_now().await.unwrap());

    assert_eq!(fixture.fs.renames(), 1);
    assert_eq!(fixture.issues_on_disk(), 1);
    assert!(!adapter.is_dirty());
    assert!(adapter.get_board().await.unwrap().card(&id).is_some());
    assert_eq!(adapter.status().reloads, 1);
}

#[tokio::test]
async fn test_reload_refused_while_changes_cannot_be_published() {
    let fixture = Fixture::new();
    let adapter = slow_debounce(&fixture);
    let id = adapter.create_issue(NewIssue::new("Stuck local")).await.unwrap();
    fixture.fs.fail_next_renames(5);

    let err = adapter.reload_now().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Persistence);

    // The live engine was not replaced, so the change is still there
    assert!(adapter.get_board().await.unwrap().card(&id).is_some());
    assert!(adapter.is_dirty());
    adapter.dispose().await;
    assert_eq!(fixture.issues_on_disk(), 1);
}

#[tokio::test]
async fn test_unreadable_rewrite_disconnects_until_store_returns() {
    let fixture = Fixture::new();
    let adapter = fixture.adapter();
    adapter.get_board().await.unwrap();

    let junk = fixture.dir.path().join("junk.tmp");
    std::fs::write(&junk, b"definitely not sqlite").unwrap();
    std::fs::rename(&junk, &fixture.db).unwrap();
    bump_mtime(&fixture.db, Duration::from_secs(5));

    let err = adapter.get_board().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connection);
    assert_eq!(err.source_error().map(|e| e.kind()), Some(ErrorKind::Reload));
    assert!(!adapter.status().connected);

    std::fs::remove_file(&fixture.db).unwrap();
    init_database(&fixture.db, "bd").unwrap();

    assert!(adapter.get_board().await.unwrap().is_empty());
    assert!(adapter.status().connected);
}

#[tokio::test]
async fn test_unreadable_stamp_fails_read_as_connection() {
    let fixture = Fixture::new();
    let adapter = fixture.adapter();
    adapter.connect().await.unwrap();
    adapter.get_board().await.unwrap();

    fixture.fs.fail_stamps(true);
    let err = adapter.get_board().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connection);
    assert_eq!(err.source_error().map(|e| e.kind()), Some(ErrorKind::Io));

    fixture.fs.fail_stamps(false);
    adapter.get_board().await.unwrap();
    assert!(adapter.status().connected);
}

#[tokio::test]
async fn test_reload_falls_back_to_fresh_discovery() {
    let dir = TempDir::new().unwrap();
    let first = dir.path().join(".beads").join("a.db");
    let second = dir.path().join(".beads").join("b.db");
    init_database(&first, "bd").unwrap();
    init_database(&second, "bd").unwrap();

    let adapter = BoardAdapter::new(AdapterConfig {
        database: None,
        search_root: dir.path().to_path_buf(),
        ..fast_config(&first)
    })
    .unwrap();
    adapter.connect().await.unwrap();
    assert_eq!(adapter.store_path(), Some(first.clone()));

    std::fs::remove_file(&first).unwrap();
    assert!(adapter.reload_now().await.unwrap());

    assert_eq!(adapter.store_path(), Some(second));
}

#[tokio::test]
async fn test_missing_file_is_recreated_not_reloaded() {
    let fixture = Fixture::new();
    let adapter = fixture.adapter();
    adapter.connect().await.unwrap();

    std::fs::remove_file(&fixture.db).unwrap();
    assert!(!adapter.on_change_hint().await.unwrap());

    adapter.create_issue(NewIssue::new("Survivor")).await.unwrap();
    adapter.flush().await.unwrap();
    assert_eq!(fixture.issues_on_disk(), 1);
}

// ---------------------------------------------------------------------------
// dispose
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_dispose_flushes_once_and_is_idempotent() {
    let fixture = Fixture::new();
    let adapter = slow_debounce(&fixture);
    adapter.create_issue(NewIssue::new("Keep me")).await.unwrap();

    adapter.dispose().await;
    assert_eq!(fixture.fs.renames(), 1);
    assert_eq!(fixture.issues_on_disk(), 1);

    adapter.dispose().await;
    assert_eq!(fixture.fs.renames(), 1);

    let status = adapter.status();
    assert!(!status.connected);
    assert!(!status.is_dirty);

    let err = adapter.get_board().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connection);
}

#[tokio::test]
async fn test_dispose_with_failing_publish_reports_pending_changes() {
    let fixture = Fixture::new();
    let adapter = slow_debounce(&fixture);
    fixture.fs.fail_next_renames(5);
    adapter.create_issue(NewIssue::new("Stranded")).await.unwrap();

    adapter.dispose().await;
    let status = adapter.status();
    assert!(!status.connected);
    assert!(status.is_dirty);
    assert!(status.last_error.is_some());
    assert_eq!(fixture.fs.renames(), 0);
    assert_eq!(fixture.issues_on_disk(), 0);

    // Renames would succeed now; a second dispose must not try again
    adapter.dispose().await;
    assert_eq!(fixture.fs.renames(), 0);
    assert!(adapter.status().is_dirty);
}

#[tokio::test]
async fn test_dispose_without_changes_does_not_publish() {
    let fixture = Fixture::new();
    let adapter = fixture.adapter();
    adapter.connect().await.unwrap();

    adapter.dispose().await;
    assert_eq!(fixture.fs.renames(), 0);
}
