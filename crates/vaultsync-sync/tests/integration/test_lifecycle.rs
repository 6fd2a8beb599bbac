//! Vault lifecycle: connect, rescan, disconnect
//!
//! Move detection through the local index and by content, staged metadata
//! surviving rescans and being flushed on disconnect.

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use vaultsync_core::domain::{
    Command, CommandKind, DiffStatus, EditableField, FileId, RemoteRecord, Role,
};
use vaultsync_core::ports::IBlobStore;
use vaultsync_sync::{content_hash_of, SyncError, Vault};

use crate::common::{identity, path, user, Backends};

async fn status_of(vault: &Vault, p: &str) -> Option<DiffStatus> {
    vault.record(&path(p)).await.map(|r| r.diff_status())
}

// ============================================================================
// Connect
// ============================================================================

#[tokio::test]
async fn test_connect_classifies_every_file() {
    let backends = Backends::new();
    backends.synced("asm/top.sldasm", b"top").await;
    backends.cloud("asm/bolt.sldprt", b"bolt").await;
    backends.local("asm/new.sldprt", b"new");

    let mut by_bob = RemoteRecord::new(
        FileId::new("fresh").unwrap(),
        path("asm/fresh.sldprt"),
        content_hash_of(b"fresh"),
        5,
    );
    by_bob.created_by = Some(user("bob"));
    by_bob.created_at = Some(Utc::now());
    backends.metadata.insert(by_bob);

    let mut gone = RemoteRecord::new(
        FileId::new("gone").unwrap(),
        path("asm/gone.sldprt"),
        content_hash_of(b"gone"),
        4,
    );
    gone.deleted = true;
    backends.metadata.insert(gone);

    let h = backends.connect(identity("alice", "m1", Role::Member)).await;
    let report = h.vault.rescan().await.unwrap();

    assert_eq!(report.stats.dropped_tombstones, 1);
    assert_eq!(status_of(&h.vault, "asm/top.sldasm").await, Some(DiffStatus::Synced));
    assert_eq!(status_of(&h.vault, "asm/bolt.sldprt").await, Some(DiffStatus::Cloud));
    assert_eq!(status_of(&h.vault, "asm/new.sldprt").await, Some(DiffStatus::Added));
    assert_eq!(status_of(&h.vault, "asm/fresh.sldprt").await, Some(DiffStatus::CloudNew));
    assert_eq!(status_of(&h.vault, "asm/gone.sldprt").await, None);

    let summary = h.vault.folder_summary(&path("asm")).await;
    assert_eq!(summary.total_files, 4);
    assert_eq!(summary.cloud, 1);
    assert_eq!(summary.cloud_new, 1);
    assert_eq!(summary.local_only, 1);
    assert!(!summary.is_fully_synced);
    assert_eq!(report.status_counts.values().sum::<usize>(), 4);
}

#[tokio::test]
async fn test_rescan_keeps_untouched_file_behind_head_outdated() {
    let backends = Backends::new();
    let v1 = backends.synced("a.sldprt", b"a v1").await;
    let h = backends.connect(identity("alice", "m1", Role::Member)).await;
    assert_eq!(status_of(&h.vault, "a.sldprt").await, Some(DiffStatus::Synced));

    // Someone else checks in a new version
    let mut v2 = v1.clone();
    v2.version = 2;
    v2.content_hash = backends.blobs.put(b"a v2").await.unwrap();
    backends.metadata.insert(v2);

    h.vault.rescan().await.unwrap();
    let record = h.vault.record(&path("a.sldprt")).await.unwrap();
    assert_eq!(record.diff_status(), DiffStatus::Outdated);
    assert_eq!(record.local().unwrap().active_version, Some(1));

    let result = h
        .executor
        .execute(
            Command::new(CommandKind::GetLatest, vec![path("a.sldprt")]),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(result.succeeded, 1);
    assert_eq!(h.fs.contents("a.sldprt").unwrap(), b"a v2");
    assert_eq!(status_of(&h.vault, "a.sldprt").await, Some(DiffStatus::Synced));
}

#[tokio::test]
async fn test_move_outside_client_detected_by_content() {
    let backends = Backends::new();
    backends.metadata.seed("old/part.sldprt", b"same bytes");
    backends.local("new/part.sldprt", b"same bytes");

    let h = backends.connect(identity("alice", "m1", Role::Member)).await;
    let report = h.vault.rescan().await.unwrap();

    assert_eq!(report.stats.paired_by_hash, 1);
    let record = h.vault.record(&path("new/part.sldprt")).await.unwrap();
    assert_eq!(record.diff_status(), DiffStatus::Moved);
    assert!(h.vault.record(&path("old/part.sldprt")).await.is_none());
}

#[tokio::test]
async fn test_move_through_client_survives_reconnect_via_index() {
    let backends = Backends::new();
    backends.synced("a.sldprt", b"a v1").await;
    let me = identity("alice", "m1", Role::Member);
    backends.metadata.hold("a.sldprt", &me);

    let first = backends.connect(me.clone()).await;
    let result = first
        .executor
        .execute(
            Command::new(CommandKind::Move, vec![path("a.sldprt")]).with_target_folder(path("dest")),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(result.succeeded, 1);

    // Edited after the move, so only the index can pair it
    backends.fs.put("dest/a.sldprt", b"a v2");
    first.vault.disconnect().await.unwrap();

    let second = backends.connect(me).await;
    let report = second.vault.rescan().await.unwrap();
    assert_eq!(report.stats.paired_by_index, 1);

    let record = second.vault.record(&path("dest/a.sldprt")).await.unwrap();
    assert_eq!(record.live_remote().unwrap().path, path("a.sldprt"));
    assert_eq!(record.diff_status(), DiffStatus::Modified);
}

// ============================================================================
// Staged metadata
// ============================================================================

#[tokio::test]
async fn test_staged_metadata_survives_rescan_and_flushes_on_disconnect() {
    let backends = Backends::new();
    backends.synced("a.sldprt", b"a").await;
    let me = identity("alice", "m1", Role::Member);
    backends.metadata.hold("a.sldprt", &me);
    let h = backends.connect(me).await;

    h.vault
        .stage_metadata(&path("a.sldprt"), EditableField::Description, "bracket, left")
        .await
        .unwrap();
    h.vault.rescan().await.unwrap();

    let record = h.vault.record(&path("a.sldprt")).await.unwrap();
    assert_eq!(
        record.pending_metadata().get(&EditableField::Description).map(String::as_str),
        Some("bracket, left")
    );

    let report = h.vault.disconnect().await.unwrap();
    assert_eq!(report.flushed, 1);
    assert_eq!(report.failed, 0);

    let remote = h.metadata.by_path("a.sldprt").unwrap();
    assert_eq!(remote.description.as_deref(), Some("bracket, left"));
    assert!(remote.is_checked_out(), "disconnect must not release checkouts");

    let record = h.vault.record(&path("a.sldprt")).await.unwrap();
    assert!(record.pending_metadata().is_empty());
    assert!(h.fs.exists(".vaultsync/index.json"));
}

#[tokio::test]
async fn test_staging_requires_checkout() {
    let backends = Backends::new();
    backends.synced("a.sldprt", b"a").await;
    let h = backends.connect(identity("alice", "m1", Role::Member)).await;

    let err = h
        .vault
        .stage_metadata(&path("a.sldprt"), EditableField::PartNumber, "P-100")
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::DomainError(_)));

    let missing = h
        .vault
        .stage_metadata(&path("nope.sldprt"), EditableField::PartNumber, "P-100")
        .await
        .unwrap_err();
    assert!(matches!(missing, SyncError::PathNotFound(_)));
}

#[tokio::test]
async fn test_failed_flush_is_reported() {
    let backends = Backends::new();
    backends.synced("a.sldprt", b"a").await;
    let me = identity("alice", "m1", Role::Member);
    backends.metadata.hold("a.sldprt", &me);
    let h = backends.connect(me).await;

    h.vault
        .stage_metadata(&path("a.sldprt"), EditableField::Revision, "C")
        .await
        .unwrap();
    backends.metadata.fail_on("a.sldprt");

    let report = h.vault.disconnect().await.unwrap();
    assert_eq!(report.flushed, 0);
    assert_eq!(report.failed, 1);
    let record = h.vault.record(&path("a.sldprt")).await.unwrap();
    assert!(!record.pending_metadata().is_empty());
}
