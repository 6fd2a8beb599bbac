//! End-to-end checkout scenarios
//!
//! First sync of an added file, cross-machine checkin with the holding
//! machine online and offline, collision handling on copy/move and moves
//! carried to the server by the next checkin.

use tokio_util::sync::CancellationToken;
use vaultsync_core::domain::{
    AuditAction, Command, CommandKind, DiffStatus, ErrorKind, Resolution, Role,
};
use vaultsync_sync::content_hash_of;

use crate::common::{identity, path, Backends};

// ============================================================================
// First sync
// ============================================================================

#[tokio::test]
async fn test_sync_creates_remote_record_for_added_file() {
    let backends = Backends::new();
    backends.local("a.sldprt", b"part a");
    let h = backends.connect(identity("alice", "m1", Role::Member)).await;

    let before = h.vault.record(&path("a.sldprt")).await.unwrap();
    assert_eq!(before.diff_status(), DiffStatus::Added);

    let result = h
        .executor
        .execute(
            Command::new(CommandKind::Sync, vec![path("a.sldprt")]),
            &CancellationToken::new(),
        )
        .await
        .expect("sync rejected");

    assert_eq!(result.succeeded, 1);
    assert_eq!(result.failed, 0);

    let remote = h.metadata.by_path("a.sldprt").expect("no remote record");
    assert_eq!(remote.content_hash, content_hash_of(b"part a"));
    assert!(h.blobs.contains(&remote.content_hash));

    let after = h.vault.record(&path("a.sldprt")).await.unwrap();
    assert_eq!(after.diff_status(), DiffStatus::Synced);
    assert_eq!(after.live_remote().map(|r| &r.id), Some(&remote.id));
}

// ============================================================================
// Cross-machine checkin
// ============================================================================

async fn held_on_other_machine(online: bool) -> crate::common::Harness {
    let backends = Backends::new();
    backends.synced("b.sldprt", b"v1").await;
    let on_m1 = identity("alice", "m1", Role::Member);
    backends.metadata.hold("b.sldprt", &on_m1);
    backends.metadata.set_online(on_m1.machine_id(), online);

    // Edited on the second workstation
    backends.local("b.sldprt", b"v2");
    backends.connect(identity("alice", "m2", Role::Member)).await
}

#[tokio::test]
async fn test_checkin_from_second_machine_needs_confirmation_when_holder_online() {
    let h = held_on_other_machine(true).await;
    let cancel = CancellationToken::new();

    let first = h
        .executor
        .execute(Command::new(CommandKind::Checkin, vec![path("b.sldprt")]), &cancel)
        .await
        .unwrap();

    assert_eq!(first.succeeded, 0);
    assert_eq!(first.failed, 0);
    assert_eq!(first.confirmations_required.len(), 1);
    assert_eq!(
        first.confirmations_required[0].machine_id.as_ref().map(|m| m.as_str()),
        Some("m1")
    );
    assert!(h.metadata.by_path("b.sldprt").unwrap().is_checked_out());

    let confirmed = h
        .executor
        .execute(
            Command::new(CommandKind::Checkin, vec![path("b.sldprt")]).with_force_checkin_confirmed(),
            &cancel,
        )
        .await
        .unwrap();

    assert_eq!(confirmed.succeeded, 1);
    let remote = h.metadata.by_path("b.sldprt").unwrap();
    assert!(!remote.is_checked_out());
    assert_eq!(remote.version, 2);
    assert_eq!(remote.content_hash, content_hash_of(b"v2"));

    let record = h.vault.record(&path("b.sldprt")).await.unwrap();
    assert_eq!(record.holder(), None);
    assert_eq!(record.diff_status(), DiffStatus::Synced);

    let actions: Vec<AuditAction> = h.audit.entries().await.iter().map(|e| e.action()).collect();
    assert!(actions.contains(&AuditAction::ForceCheckin), "audit trail: {actions:?}");
}

#[tokio::test]
async fn test_checkin_from_second_machine_blocked_when_holder_offline() {
    let h = held_on_other_machine(false).await;
    let before = h.vault.record(&path("b.sldprt")).await.unwrap();

    // Confirmation does not lift an offline block
    let result = h
        .executor
        .execute(
            Command::new(CommandKind::Checkin, vec![path("b.sldprt")]).with_force_checkin_confirmed(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(result.succeeded, 0);
    assert_eq!(result.failed, 0);
    assert_eq!(result.blocked.len(), 1);
    assert_eq!(result.blocked[0].path, path("b.sldprt"));

    let remote = h.metadata.by_path("b.sldprt").unwrap();
    assert_eq!(remote.version, 1);
    assert!(remote.is_checked_out());
    assert!(!h.blobs.contains(&content_hash_of(b"v2")));
    assert_eq!(h.vault.record(&path("b.sldprt")).await.unwrap(), before);
}

#[tokio::test]
async fn test_blocked_checkin_does_not_read_the_file() {
    let h = held_on_other_machine(false).await;
    h.fs.fail_on("b.sldprt");

    let result = h
        .executor
        .execute(
            Command::new(CommandKind::Checkin, vec![path("b.sldprt")]),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(result.failed, 0);
    assert_eq!(result.blocked.len(), 1);
    assert!(result.per_file_errors.is_empty());
}

#[tokio::test]
async fn test_unconfirmed_checkin_does_not_read_the_file() {
    let h = held_on_other_machine(true).await;
    h.fs.fail_on("b.sldprt");

    let result = h
        .executor
        .execute(
            Command::new(CommandKind::Checkin, vec![path("b.sldprt")]),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(result.failed, 0);
    assert_eq!(result.confirmations_required.len(), 1);
}

// ============================================================================
// Collision handling
// ============================================================================

#[tokio::test]
async fn test_copy_into_folder_renames_existing_destination() {
    let backends = Backends::new();
    backends.local("dest/x.txt", b"already here");
    backends.local("src/x.txt", b"new x");
    backends.local("src/y.txt", b"new y");
    let h = backends.connect(identity("alice", "m1", Role::Member)).await;

    let command = Command::new(CommandKind::Copy, vec![path("src/x.txt"), path("src/y.txt")])
        .with_target_folder(path("dest"))
        .with_resolution(Resolution::Rename);
    let result = h
        .executor
        .execute(command, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.succeeded, 2);
    assert_eq!(h.fs.contents("dest/x.txt").unwrap(), b"already here");
    assert_eq!(h.fs.contents("dest/x (1).txt").unwrap(), b"new x");
    assert_eq!(h.fs.contents("dest/y.txt").unwrap(), b"new y");
    assert!(h.fs.exists("src/x.txt"));

    let copy = h.vault.record(&path("dest/x (1).txt")).await.unwrap();
    assert_eq!(copy.diff_status(), DiffStatus::Added);
}

#[tokio::test]
async fn test_move_folder_target_keeps_relative_layout() {
    let backends = Backends::new();
    backends.local("dest/x.txt", b"already here");
    backends.local("src/x.txt", b"new x");
    backends.local("src/sub/y.txt", b"new y");
    let h = backends.connect(identity("alice", "m1", Role::Member)).await;

    let command = Command::new(CommandKind::Move, vec![path("src")])
        .with_target_folder(path("dest"))
        .with_resolution(Resolution::Rename);
    let result = h
        .executor
        .execute(command, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.succeeded, 2);
    assert!(h.fs.exists("dest/src/x.txt"));
    assert!(h.fs.exists("dest/src/sub/y.txt"));
    assert!(!h.fs.exists("src/x.txt"));
    assert!(h.vault.record(&path("src/x.txt")).await.is_none());
    assert!(h.vault.record(&path("dest/src/sub/y.txt")).await.is_some());
}

#[tokio::test]
async fn test_skip_resolution_drops_colliding_copy() {
    let backends = Backends::new();
    backends.local("dest/x.txt", b"already here");
    backends.local("src/x.txt", b"new x");
    backends.local("src/y.txt", b"new y");
    let h = backends.connect(identity("alice", "m1", Role::Member)).await;

    let command = Command::new(CommandKind::Copy, vec![path("src/x.txt"), path("src/y.txt")])
        .with_target_folder(path("dest"))
        .with_resolution(Resolution::Skip);
    let result = h
        .executor
        .execute(command, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.succeeded, 1);
    assert_eq!(result.skipped, 1);
    assert_eq!(h.fs.contents("dest/x.txt").unwrap(), b"already here");
}

#[tokio::test]
async fn test_overwrite_refused_on_file_checked_out_by_someone_else() {
    let backends = Backends::new();
    backends.synced("dest/x.sldprt", b"bob's work").await;
    backends
        .metadata
        .hold("dest/x.sldprt", &identity("bob", "m9", Role::Member));
    backends.local("src/x.sldprt", b"mine");
    backends.local("src/y.sldprt", b"also mine");
    let h = backends.connect(identity("alice", "m1", Role::Member)).await;

    let command = Command::new(CommandKind::Copy, vec![path("src/x.sldprt"), path("src/y.sldprt")])
        .with_target_folder(path("dest"))
        .with_resolution(Resolution::Overwrite);
    let result = h
        .executor
        .execute(command, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.succeeded, 1);
    assert_eq!(result.failed, 1);
    assert_eq!(result.per_file_errors[0].path, path("src/x.sldprt"));
    assert_eq!(result.per_file_errors[0].kind, ErrorKind::Precondition);
    assert_eq!(h.fs.contents("dest/x.sldprt").unwrap(), b"bob's work");
    assert_eq!(h.fs.contents("dest/y.sldprt").unwrap(), b"also mine");

    let kept = h.vault.record(&path("dest/x.sldprt")).await.unwrap();
    assert_eq!(kept.diff_status(), DiffStatus::Synced);
    assert!(h
        .audit
        .entries()
        .await
        .iter()
        .any(|e| e.action() == AuditAction::Copy && e.path() == Some(&path("dest/x.sldprt"))));
}

#[tokio::test]
async fn test_move_overwriting_held_file_keeps_its_remote_record() {
    let backends = Backends::new();
    let me = identity("alice", "m1", Role::Member);
    let target = backends.synced("dest/x.sldprt", b"old").await;
    backends.metadata.hold("dest/x.sldprt", &me);
    backends.local("src/x.sldprt", b"replacement");
    let h = backends.connect(me).await;
    let cancel = CancellationToken::new();

    let command = Command::new(CommandKind::Move, vec![path("src/x.sldprt")])
        .with_target_folder(path("dest"))
        .with_resolution(Resolution::Overwrite);
    let result = h.executor.execute(command, &cancel).await.unwrap();

    assert_eq!(result.succeeded, 1);
    assert!(!h.fs.exists("src/x.sldprt"));
    assert_eq!(h.fs.contents("dest/x.sldprt").unwrap(), b"replacement");
    assert!(h.vault.record(&path("src/x.sldprt")).await.is_none());

    let record = h.vault.record(&path("dest/x.sldprt")).await.unwrap();
    assert_eq!(record.live_remote().map(|r| &r.id), Some(&target.id));
    assert_eq!(record.local().unwrap().active_version, Some(1));
    assert_eq!(record.diff_status(), DiffStatus::Modified);

    let checkin = h
        .executor
        .execute(Command::new(CommandKind::Checkin, vec![path("dest/x.sldprt")]), &cancel)
        .await
        .unwrap();
    assert_eq!(checkin.succeeded, 1);
    let remote = h.metadata.by_path("dest/x.sldprt").unwrap();
    assert_eq!(remote.id, target.id);
    assert_eq!(remote.content_hash, content_hash_of(b"replacement"));
}

// ============================================================================
// Moves reach the server on checkin
// ============================================================================

#[tokio::test]
async fn test_moved_file_pushes_new_path_on_checkin() {
    let backends = Backends::new();
    let me = identity("alice", "m1", Role::Member);
    let original = backends.synced("a.sldprt", b"a").await;
    backends.metadata.hold("a.sldprt", &me);
    let h = backends.connect(me).await;
    let cancel = CancellationToken::new();

    let result = h
        .executor
        .execute(
            Command::new(CommandKind::Move, vec![path("a.sldprt")]).with_target_folder(path("parts")),
            &cancel,
        )
        .await
        .unwrap();
    assert_eq!(result.succeeded, 1);

    let moved = h.vault.record(&path("parts/a.sldprt")).await.unwrap();
    assert_eq!(moved.diff_status(), DiffStatus::Moved);
    assert_eq!(moved.live_remote().unwrap().path, path("a.sldprt"));
    assert!(h.metadata.by_path("a.sldprt").is_some());

    let checkin = h
        .executor
        .execute(Command::new(CommandKind::Checkin, vec![path("parts/a.sldprt")]), &cancel)
        .await
        .unwrap();
    assert_eq!(checkin.succeeded, 1);

    let remote = h.metadata.by_path("parts/a.sldprt").expect("remote path not updated");
    assert_eq!(remote.id, original.id);
    assert!(h.metadata.by_path("a.sldprt").is_none());

    let record = h.vault.record(&path("parts/a.sldprt")).await.unwrap();
    assert_eq!(record.diff_status(), DiffStatus::Synced);
}
