//! Batch execution behavior
//!
//! Partial failure, cancellation, in-flight skipping, progress reporting and
//! whole-command rejections.

use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;
use vaultsync_core::domain::{
    Command, CommandKind, DiffStatus, EditableField, ErrorKind, Role, VaultPath,
};
use vaultsync_core::ports::IBlobStore;
use vaultsync_sync::{ExecutorError, ExecutorSettings, ProgressUpdate};

use crate::common::{identity, path, Backends};

fn alice() -> vaultsync_core::domain::Identity {
    identity("alice", "m1", Role::Member)
}

// ============================================================================
// Partial failure
// ============================================================================

#[tokio::test]
async fn test_failing_units_are_counted_and_do_not_abort_batch() {
    let backends = Backends::new();
    let mut targets = Vec::new();
    for i in 0..10 {
        let p = format!("parts/p{i}.sldprt");
        backends.cloud(&p, format!("content {i}").as_bytes()).await;
        targets.push(path(&p));
    }
    let failing = ["parts/p1.sldprt", "parts/p4.sldprt", "parts/p7.sldprt"];
    for p in failing {
        backends.fs.fail_on(p);
    }
    let h = backends
        .connect_with(
            alice(),
            ExecutorSettings {
                max_concurrency: 3,
                ..ExecutorSettings::default()
            },
        )
        .await;

    let result = h
        .executor
        .execute(Command::new(CommandKind::Download, targets), &CancellationToken::new())
        .await
        .expect("batch must not be rejected");

    assert_eq!(result.failed, 3);
    assert_eq!(result.succeeded, 7);
    assert_eq!(result.per_file_errors.len(), 3);
    assert!(result.per_file_errors.iter().all(|e| e.kind == ErrorKind::Io));

    let mut failed: Vec<String> = result.per_file_errors.iter().map(|e| e.path.to_string()).collect();
    failed.sort();
    assert_eq!(failed, failing);

    let ok = h.vault.record(&path("parts/p0.sldprt")).await.unwrap();
    assert_eq!(ok.diff_status(), DiffStatus::Synced);
    let bad = h.vault.record(&path("parts/p1.sldprt")).await.unwrap();
    assert_eq!(bad.diff_status(), DiffStatus::Cloud);

    let summary = h.vault.folder_summary(&path("parts")).await;
    assert_eq!(summary.cloud, 3);
    assert_eq!(summary.checkoutable, 7);
}

#[tokio::test]
async fn test_remote_rejection_is_a_remote_error() {
    let backends = Backends::new();
    backends.synced("a.sldprt", b"a").await;
    backends.synced("b.sldprt", b"b").await;
    backends.metadata.fail_on("b.sldprt");
    let h = backends.connect(alice()).await;

    let result = h
        .executor
        .execute(Command::new(CommandKind::Checkout, vec![VaultPath::root()]), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.succeeded, 1);
    assert_eq!(result.failed, 1);
    assert_eq!(result.per_file_errors[0].kind, ErrorKind::Remote);
    assert!(h.metadata.by_path("a.sldprt").unwrap().is_checked_out());
}

// ============================================================================
// Cancellation and in-flight paths
// ============================================================================

#[tokio::test]
async fn test_cancelled_before_dispatch_runs_nothing() {
    let backends = Backends::new();
    backends.cloud("a.sldprt", b"a").await;
    backends.cloud("b.sldprt", b"b").await;
    let h = backends.connect(alice()).await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let result = h
        .executor
        .execute(Command::new(CommandKind::Download, vec![VaultPath::root()]), &cancel)
        .await
        .unwrap();

    assert!(result.cancelled);
    assert_eq!(result.succeeded, 0);
    assert_eq!(result.skipped, 2);
    assert!(!h.fs.exists("a.sldprt"));
}

#[tokio::test]
async fn test_paths_under_in_flight_folder_are_skipped() {
    let backends = Backends::new();
    backends.cloud("asm/a.sldprt", b"a").await;
    backends.cloud("asm/b.sldprt", b"b").await;
    backends.cloud("c.sldprt", b"c").await;
    let h = backends.connect(alice()).await;

    assert!(h.vault.in_flight().mark(&path("asm")));
    let result = h
        .executor
        .execute(Command::new(CommandKind::Download, vec![VaultPath::root()]), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.succeeded, 1);
    assert_eq!(result.skipped, 2);
    assert!(h.fs.exists("c.sldprt"));
    assert!(!h.fs.exists("asm/a.sldprt"));

    // Guards of finished units are released
    assert_eq!(h.vault.in_flight().len(), 1);
}

// ============================================================================
// Progress
// ============================================================================

#[tokio::test]
async fn test_progress_reported_per_unit_in_bytes_for_downloads() {
    let backends = Backends::new();
    backends.cloud("a.bin", &[0u8; 100]).await;
    backends.cloud("b.bin", &[1u8; 200]).await;
    backends.cloud("c.bin", &[2u8; 300]).await;

    let updates: Arc<Mutex<Vec<ProgressUpdate>>> = Arc::default();
    let sink = Arc::clone(&updates);
    let h = backends.connect(alice()).await;
    let executor = vaultsync_sync::CommandExecutor::new(
        Arc::clone(&h.vault),
        Arc::new(vaultsync_audit::AuditLogger::new(
            Arc::clone(&h.audit) as Arc<dyn vaultsync_core::ports::IAuditStore>,
            alice(),
        )),
        ExecutorSettings::default(),
    )
    .with_progress(Box::new(move |update| sink.lock().unwrap().push(update)));

    let result = executor
        .execute(Command::new(CommandKind::Download, vec![VaultPath::root()]), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(result.succeeded, 3);

    let updates = updates.lock().unwrap();
    assert_eq!(updates.len(), 3);
    let completed: Vec<usize> = updates.iter().map(|u| u.completed).collect();
    assert_eq!(completed, vec![1, 2, 3]);

    let last = updates.last().unwrap();
    assert_eq!(last.total, 3);
    assert_eq!(last.total_bytes, 600);
    assert_eq!(last.bytes_done, 600);
    assert!((last.fraction() - 1.0).abs() < 1e-9);
    assert!(updates.iter().all(|u| u.throughput_per_sec.is_finite()));
}

// ============================================================================
// Whole-command rejections
// ============================================================================

#[tokio::test]
async fn test_no_eligible_files_rejects_command() {
    let backends = Backends::new();
    backends.synced("a.sldprt", b"a").await;
    let h = backends.connect(alice()).await;

    let err = h
        .executor
        .execute(Command::new(CommandKind::Sync, vec![path("a.sldprt")]), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ExecutorError::NoEligibleFiles { kind: CommandKind::Sync }));
}

#[tokio::test]
async fn test_force_release_requires_admin() {
    let backends = Backends::new();
    backends.synced("a.sldprt", b"a").await;
    backends
        .metadata
        .hold("a.sldprt", &identity("bob", "m9", Role::Member));

    let member = backends.connect(alice()).await;
    let err = member
        .executor
        .execute(
            Command::new(CommandKind::ForceRelease, vec![path("a.sldprt")]),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ExecutorError::NotPrivileged { .. }));
    assert!(backends.metadata.by_path("a.sldprt").unwrap().is_checked_out());

    let admin = backends.connect(identity("carol", "m2", Role::Admin)).await;
    let result = admin
        .executor
        .execute(
            Command::new(CommandKind::ForceRelease, vec![path("a.sldprt")]),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(result.succeeded, 1);
    assert!(!backends.metadata.by_path("a.sldprt").unwrap().is_checked_out());
}

#[tokio::test]
async fn test_move_without_target_folder_is_rejected() {
    let backends = Backends::new();
    backends.local("a.sldprt", b"a");
    let h = backends.connect(alice()).await;

    let err = h
        .executor
        .execute(Command::new(CommandKind::Move, vec![path("a.sldprt")]), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ExecutorError::MissingTargetFolder { .. }));
}

#[tokio::test]
async fn test_move_rejected_when_synced_file_not_checked_out() {
    let backends = Backends::new();
    backends.local("src/new.sldprt", b"n");
    backends.synced("src/old.sldprt", b"o").await;
    let h = backends.connect(alice()).await;

    let err = h
        .executor
        .execute(
            Command::new(CommandKind::Move, vec![path("src")]).with_target_folder(path("dest")),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    match err {
        ExecutorError::MovePrecondition { blocking } => {
            assert_eq!(blocking, vec![path("src/old.sldprt")]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(h.fs.exists("src/new.sldprt"));
    assert!(!h.fs.exists("dest/src/new.sldprt"));
}

// ============================================================================
// Checkout lifecycle through the executor
// ============================================================================

#[tokio::test]
async fn test_discard_restores_server_content() {
    let backends = Backends::new();
    backends.synced("a.sldprt", b"server").await;
    backends.metadata.hold("a.sldprt", &alice());
    backends.local("a.sldprt", b"local edits");
    let h = backends.connect(alice()).await;

    let result = h
        .executor
        .execute(Command::new(CommandKind::Discard, vec![path("a.sldprt")]), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.succeeded, 1);
    assert_eq!(h.fs.contents("a.sldprt").unwrap(), b"server");
    assert!(!h.metadata.by_path("a.sldprt").unwrap().is_checked_out());
    let record = h.vault.record(&path("a.sldprt")).await.unwrap();
    assert_eq!(record.diff_status(), DiffStatus::Synced);
}

#[tokio::test]
async fn test_checkout_then_checkin_bumps_version() {
    let backends = Backends::new();
    backends.synced("a.sldprt", b"v1").await;
    let h = backends.connect(alice()).await;
    let cancel = CancellationToken::new();

    let checkout = h
        .executor
        .execute(Command::new(CommandKind::Checkout, vec![path("a.sldprt")]), &cancel)
        .await
        .unwrap();
    assert_eq!(checkout.succeeded, 1);
    assert_eq!(h.vault.folder_summary(&VaultPath::root()).await.checked_out_by_me, 1);

    h.fs.put("a.sldprt", b"v2");
    let checkin = h
        .executor
        .execute(
            Command::new(CommandKind::Checkin, vec![path("a.sldprt")]).with_comment("rev B"),
            &cancel,
        )
        .await
        .unwrap();
    assert_eq!(checkin.succeeded, 1);

    let remote = h.metadata.by_path("a.sldprt").unwrap();
    assert_eq!(remote.version, 2);
    assert!(!remote.is_checked_out());
    assert!(h.blobs.contains(&remote.content_hash));
}

#[tokio::test]
async fn test_delete_server_with_local_removal() {
    let backends = Backends::new();
    backends.synced("a.sldprt", b"a").await;
    backends.synced("b.sldprt", b"b").await;
    let h = backends.connect(alice()).await;
    let cancel = CancellationToken::new();

    let result = h
        .executor
        .execute(
            Command::new(CommandKind::DeleteServer, vec![path("a.sldprt")]).with_delete_local(),
            &cancel,
        )
        .await
        .unwrap();
    assert_eq!(result.succeeded, 1);
    assert!(h.metadata.by_path("a.sldprt").is_none());
    assert!(!h.fs.exists("a.sldprt"));
    assert!(h.vault.record(&path("a.sldprt")).await.is_none());

    // Without local removal the file stays behind as orphaned
    let result = h
        .executor
        .execute(Command::new(CommandKind::DeleteServer, vec![path("b.sldprt")]), &cancel)
        .await
        .unwrap();
    assert_eq!(result.succeeded, 1);
    assert!(h.fs.exists("b.sldprt"));
    let record = h.vault.record(&path("b.sldprt")).await.unwrap();
    assert_eq!(record.diff_status(), DiffStatus::DeletedRemote);
    assert_eq!(h.vault.folder_summary(&VaultPath::root()).await.orphaned, 1);
}

#[tokio::test]
async fn test_checkin_flushes_staged_metadata() {
    let backends = Backends::new();
    backends.synced("a.sldprt", b"v1").await;
    backends.metadata.hold("a.sldprt", &alice());
    let h = backends.connect(alice()).await;

    h.vault
        .stage_metadata(&path("a.sldprt"), EditableField::Description, "bracket, left")
        .await
        .unwrap();
    h.vault
        .stage_metadata(&path("a.sldprt"), EditableField::Revision, "C")
        .await
        .unwrap();

    let result = h
        .executor
        .execute(Command::new(CommandKind::Checkin, vec![path("a.sldprt")]), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(result.succeeded, 1);

    let remote = h.metadata.by_path("a.sldprt").unwrap();
    assert_eq!(remote.description.as_deref(), Some("bracket, left"));
    assert_eq!(remote.revision.as_deref(), Some("C"));
    assert_eq!(remote.version, 2);

    let record = h.vault.record(&path("a.sldprt")).await.unwrap();
    assert!(record.pending_metadata().is_empty());
    assert_eq!(record.live_remote().unwrap().description.as_deref(), Some("bracket, left"));
}

// ============================================================================
// Get latest and deletes
// ============================================================================

#[tokio::test]
async fn test_get_latest_refreshes_outdated_files_only() {
    let backends = Backends::new();
    let head = backends.synced("a.sldprt", b"a v1").await;
    backends.synced("b.sldprt", b"b v1").await;
    let h = backends.connect(alice()).await;

    let mut next = head.clone();
    next.version = 2;
    next.size = 4;
    next.content_hash = h.blobs.put(b"a v2").await.unwrap();
    h.metadata.insert(next);
    h.vault.rescan().await.unwrap();

    let result = h
        .executor
        .execute(
            Command::new(CommandKind::GetLatest, vec![path("a.sldprt"), path("b.sldprt")]),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(result.succeeded, 1);
    assert_eq!(result.skipped, 1);
    assert_eq!(h.fs.contents("a.sldprt").unwrap(), b"a v2");
    assert_eq!(h.fs.contents("b.sldprt").unwrap(), b"b v1");

    let record = h.vault.record(&path("a.sldprt")).await.unwrap();
    assert_eq!(record.diff_status(), DiffStatus::Synced);
    assert_eq!(record.local().unwrap().active_version, Some(2));
}

#[tokio::test]
async fn test_delete_local_keeps_synced_files_in_cloud() {
    let backends = Backends::new();
    backends.synced("a.sldprt", b"a").await;
    backends.local("scratch.txt", b"s");
    let h = backends.connect(alice()).await;

    let result = h
        .executor
        .execute(
            Command::new(CommandKind::DeleteLocal, vec![path("a.sldprt"), path("scratch.txt")]),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(result.succeeded, 2);
    assert!(!h.fs.exists("a.sldprt"));
    assert!(!h.fs.exists("scratch.txt"));

    // The synced file becomes cloud-only, the local-only one disappears
    let a = h.vault.record(&path("a.sldprt")).await.unwrap();
    assert!(a.local().is_none());
    assert_eq!(a.diff_status(), DiffStatus::Cloud);
    assert!(h.metadata.by_path("a.sldprt").is_some());
    assert!(h.vault.record(&path("scratch.txt")).await.is_none());
}

#[tokio::test]
async fn test_delete_both_removes_record_everywhere() {
    let backends = Backends::new();
    backends.synced("a.sldprt", b"a").await;
    backends.synced("held.sldprt", b"h").await;
    backends
        .metadata
        .hold("held.sldprt", &identity("bob", "m9", Role::Member));
    let h = backends.connect(alice()).await;

    let result = h
        .executor
        .execute(
            Command::new(CommandKind::DeleteBoth, vec![path("a.sldprt"), path("held.sldprt")]),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(result.succeeded, 1);
    assert_eq!(result.skipped, 1);
    assert!(h.metadata.by_path("a.sldprt").is_none());
    assert!(!h.fs.exists("a.sldprt"));
    assert!(h.vault.record(&path("a.sldprt")).await.is_none());

    // Held by someone else, so left alone
    assert!(h.metadata.by_path("held.sldprt").is_some());
    assert!(h.fs.exists("held.sldprt"));
}
