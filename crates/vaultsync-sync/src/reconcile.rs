//! Reconciliation scan
//!
//! Lists the working tree, hashes files with bounded concurrency and merges
//! the result with the remote manifest and the local index into unclassified
//! file records.
//!
//! Pairing order for a local file:
//! 1. the remote record known under the same path
//! 2. the remote record the local index recorded for that path, if the
//!    record now lives elsewhere (a move made through the client)
//! 3. a live remote record with the same content whose own path is absent
//!    locally (a move made outside the client), one-to-one in path order
//!
//! Tombstoned remote records pair only by path; without a local file they
//! are dropped.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use futures_util::{stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use vaultsync_core::{
    domain::{ContentHash, FileId, FileRecord, LocalState, RemoteRecord, VaultPath},
    ports::IVaultFileSystem,
};

use crate::{
    ignore::{IgnoreRules, METADATA_DIR},
    SyncError,
};

/// Vault-relative location of the local index
pub const INDEX_PATH: &str = ".vaultsync/index.json";

// ============================================================================
// Local index
// ============================================================================

/// What was last materialized at a path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexEntry {
    pub path: VaultPath,
    pub file_id: FileId,
    pub active_version: u64,
    pub base_hash: ContentHash,
}

/// Persisted per-path sync state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalIndex {
    entries: Vec<IndexEntry>,
    #[serde(skip)]
    by_path: BTreeMap<VaultPath, usize>,
}

impl LocalIndex {
    pub fn new(entries: Vec<IndexEntry>) -> Self {
        let by_path = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.path.clone(), i))
            .collect();
        Self { entries, by_path }
    }

    /// Index entries for every synced file present locally
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a FileRecord>) -> Self {
        let entries = records
            .into_iter()
            .filter_map(|record| {
                let remote = record.live_remote()?;
                let local = record.local()?;
                Some(IndexEntry {
                    path: record.path().clone(),
                    file_id: remote.id.clone(),
                    active_version: local.active_version?,
                    base_hash: local.base_hash.clone()?,
                })
            })
            .collect();
        Self::new(entries)
    }

    /// This index with `newer`'s entries replacing any at the same path
    pub fn overlay(self, newer: LocalIndex) -> Self {
        let mut entries: Vec<IndexEntry> = self
            .entries
            .into_iter()
            .filter(|e| newer.get(&e.path).is_none())
            .collect();
        entries.extend(newer.entries);
        Self::new(entries)
    }

    pub fn get(&self, path: &VaultPath) -> Option<&IndexEntry> {
        self.by_path.get(path).map(|&i| &self.entries[i])
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reads the index; a missing file yields an empty index
    pub async fn load(filesystem: &dyn IVaultFileSystem) -> Result<Self, SyncError> {
        let path = VaultPath::new(INDEX_PATH)?;
        if !filesystem.file_exists(&path).await.map_err(SyncError::Scan)? {
            debug!("No local index yet");
            return Ok(Self::default());
        }

        let data = filesystem.read_file(&path).await.map_err(SyncError::Scan)?;
        let parsed: LocalIndex =
            serde_json::from_slice(&data).map_err(|e| SyncError::Index(e.to_string()))?;
        Ok(Self::new(parsed.entries))
    }

    pub async fn save(&self, filesystem: &dyn IVaultFileSystem) -> Result<(), SyncError> {
        let path = VaultPath::new(INDEX_PATH)?;
        let data = serde_json::to_vec_pretty(self).map_err(|e| SyncError::Index(e.to_string()))?;
        filesystem
            .write_file(&path, &data)
            .await
            .map_err(|e| SyncError::Index(format!("{e:#}")))?;
        debug!(entries = self.entries.len(), "Local index saved");
        Ok(())
    }
}

// ============================================================================
// Tree scan
// ============================================================================

/// A listed and hashed working tree entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalEntry {
    pub path: VaultPath,
    pub is_directory: bool,
    pub size: u64,
    /// None for directories and ignored files
    pub hash: Option<ContentHash>,
    pub ignored: bool,
}

impl LocalEntry {
    /// Local state without any sync history
    fn state(&self) -> LocalState {
        if self.is_directory {
            return LocalState::directory();
        }
        LocalState {
            content_hash: self.hash.clone(),
            size: self.size,
            active_version: None,
            base_hash: None,
        }
    }
}

/// Lists and hashes the working tree
pub struct TreeScanner {
    filesystem: Arc<dyn IVaultFileSystem>,
    concurrency: usize,
}

impl TreeScanner {
    pub fn new(filesystem: Arc<dyn IVaultFileSystem>, concurrency: usize) -> Self {
        Self {
            filesystem,
            concurrency: concurrency.max(1),
        }
    }

    /// Entries of the whole vault in path order
    ///
    /// The metadata folder is not listed. Files that vanish or cannot be
    /// read while hashing are left out.
    pub async fn scan(&self, ignore: &IgnoreRules) -> Result<Vec<LocalEntry>, SyncError> {
        let listed = self
            .filesystem
            .read_directory(&VaultPath::root())
            .await
            .map_err(SyncError::Scan)?;

        let filesystem = &self.filesystem;
        let listed = listed
            .into_iter()
            .filter(|entry| entry.path.as_str().split('/').next() != Some(METADATA_DIR));
        let mut entries: Vec<LocalEntry> = stream::iter(listed)
            .map(|entry| async move {
                let ignored = ignore.is_ignored(&entry.path);
                let hash = if entry.is_directory || ignored {
                    None
                } else {
                    match filesystem.compute_hash(&entry.path).await {
                        Ok(hash) => Some(hash),
                        Err(e) => {
                            warn!(path = %entry.path, error = %e, "Skipping unreadable file");
                            return None;
                        }
                    }
                };
                Some(LocalEntry {
                    path: entry.path,
                    is_directory: entry.is_directory,
                    size: entry.size,
                    hash,
                    ignored,
                })
            })
            .buffer_unordered(self.concurrency)
            .filter_map(|entry| async move { entry })
            .collect()
            .await;

        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }
}

// ============================================================================
// Merge
// ============================================================================

/// Counts from one merge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeStats {
    pub local_entries: usize,
    pub remote_records: usize,
    pub paired_by_path: usize,
    pub paired_by_index: usize,
    pub paired_by_hash: usize,
    pub dropped_tombstones: usize,
}

/// Merges a scanned tree with the manifest and the local index
///
/// Records come back in path order with the default diff status; the caller
/// classifies them.
pub fn merge(
    local: Vec<LocalEntry>,
    manifest: Vec<RemoteRecord>,
    index: &LocalIndex,
) -> (Vec<FileRecord>, MergeStats) {
    let mut stats = MergeStats {
        local_entries: local.len(),
        remote_records: manifest.len(),
        ..MergeStats::default()
    };

    // Live records win over tombstones sharing a path
    let total_tombstones = manifest.iter().filter(|r| r.deleted).count();
    let mut by_path: BTreeMap<VaultPath, RemoteRecord> = BTreeMap::new();
    for remote in manifest {
        let keep_existing = by_path.get(&remote.path).is_some_and(|e| !e.deleted);
        if !keep_existing {
            by_path.insert(remote.path.clone(), remote);
        }
    }

    let local_paths: HashSet<VaultPath> = local.iter().map(|e| e.path.clone()).collect();
    let mut claimed: HashSet<FileId> = HashSet::new();
    let mut records: Vec<FileRecord> = Vec::with_capacity(local.len() + by_path.len());
    let mut unmatched: Vec<LocalEntry> = Vec::new();

    for entry in local {
        if entry.is_directory {
            records.push(FileRecord::new(entry.path.clone(), true).with_local(entry.state()));
            continue;
        }
        match by_path.get(&entry.path) {
            Some(remote) if !claimed.contains(&remote.id) => {
                claimed.insert(remote.id.clone());
                stats.paired_by_path += 1;
                records.push(pair(&entry, remote.clone(), index));
            }
            _ => unmatched.push(entry),
        }
    }

    {
        // Live records whose own path is gone locally may have moved
        let movable: BTreeMap<&VaultPath, &RemoteRecord> = by_path
            .values()
            .filter(|r| !r.deleted && !claimed.contains(&r.id) && !local_paths.contains(&r.path))
            .map(|r| (&r.path, r))
            .collect();
        let by_id: BTreeMap<&FileId, &RemoteRecord> =
            movable.values().map(|r| (&r.id, *r)).collect();

        let mut still_unmatched = Vec::new();
        for entry in unmatched {
            let known = index
                .get(&entry.path)
                .and_then(|e| by_id.get(&e.file_id).copied())
                .filter(|r| !claimed.contains(&r.id));
            match known {
                Some(remote) => {
                    claimed.insert(remote.id.clone());
                    stats.paired_by_index += 1;
                    records.push(pair(&entry, remote.clone(), index));
                }
                None => still_unmatched.push(entry),
            }
        }

        for entry in still_unmatched {
            let same_content = entry
                .hash
                .as_ref()
                .filter(|_| !entry.ignored)
                .and_then(|hash| {
                    movable
                        .values()
                        .copied()
                        .find(|r| !claimed.contains(&r.id) && r.content_hash == *hash)
                });
            match same_content {
                Some(remote) => {
                    claimed.insert(remote.id.clone());
                    stats.paired_by_hash += 1;
                    records.push(pair(&entry, remote.clone(), index));
                }
                None => records.push(local_only(&entry, index)),
            }
        }
    }

    let taken: BTreeSet<VaultPath> = records.iter().map(|r| r.path().clone()).collect();
    for remote in by_path.into_values() {
        if claimed.contains(&remote.id) || taken.contains(&remote.path) {
            continue;
        }
        if !remote.deleted {
            records.push(FileRecord::new(remote.path.clone(), false).with_remote(remote));
        }
    }

    let paired_tombstones = records
        .iter()
        .filter(|r| r.remote().is_some_and(|remote| remote.deleted))
        .count();
    stats.dropped_tombstones = total_tombstones - paired_tombstones;
    records.sort_by(|a, b| a.path().cmp(b.path()));
    (records, stats)
}

/// Record for a local file paired with a remote record
fn pair(entry: &LocalEntry, remote: RemoteRecord, index: &LocalIndex) -> FileRecord {
    let mut state = entry.state();
    match index.get(&entry.path).filter(|e| e.file_id == remote.id) {
        Some(known) => {
            state.active_version = Some(known.active_version);
            state.base_hash = Some(known.base_hash.clone());
        }
        None if state.content_hash.as_ref() == Some(&remote.content_hash) => {
            state = state.synced_at(remote.version);
        }
        None => {}
    }
    FileRecord::new(entry.path.clone(), false)
        .with_local(state)
        .with_remote(remote)
}

/// Record for a local file without a remote counterpart
fn local_only(entry: &LocalEntry, index: &LocalIndex) -> FileRecord {
    let mut state = entry.state();
    if let Some(known) = index.get(&entry.path) {
        state.active_version = Some(known.active_version);
        state.base_hash = Some(known.base_hash.clone());
    }
    FileRecord::new(entry.path.clone(), false).with_local(state)
}

/// Logs a merge summary
pub(crate) fn log_stats(stats: &MergeStats, records: usize) {
    info!(
        local = stats.local_entries,
        remote = stats.remote_records,
        by_path = stats.paired_by_path,
        by_index = stats.paired_by_index,
        by_hash = stats.paired_by_hash,
        dropped = stats.dropped_tombstones,
        records,
        "Reconciled working tree with manifest"
    );
}
