//! Folder summaries
//!
//! One pass over every non-directory record, adding each file's facts into
//! every ancestor folder (the vault root included), then one pass over the
//! folders to order their holder sets. Counting is commutative, so the
//! result does not depend on iteration order.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use vaultsync_core::domain::{DiffStatus, FileRecord, UserId, VaultPath};

/// Rollup of the files beneath one folder
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderSummary {
    pub total_files: usize,
    pub cloud: usize,
    pub cloud_new: usize,
    /// Files that exist locally only (`added`)
    pub local_only: usize,
    /// Files whose remote record is gone (`deletedRemote`)
    pub orphaned: usize,
    /// Unheld, present locally, with a live remote record
    pub checkoutable: usize,
    pub outdated: usize,
    pub modified: usize,
    /// Held by the acting user and still present locally
    pub checked_out_by_me: usize,
    /// Distinct checkout holders, acting user first, then by id
    pub holders: Vec<UserId>,
    pub is_fully_synced: bool,
}

impl Default for FolderSummary {
    fn default() -> Self {
        Self {
            total_files: 0,
            cloud: 0,
            cloud_new: 0,
            local_only: 0,
            orphaned: 0,
            checkoutable: 0,
            outdated: 0,
            modified: 0,
            checked_out_by_me: 0,
            holders: Vec::new(),
            is_fully_synced: true,
        }
    }
}

impl FolderSummary {
    /// Adds one file's contribution
    fn add(&mut self, file: &FileRecord, me: &UserId) {
        let status = file.diff_status();
        self.total_files += 1;

        match status {
            DiffStatus::Cloud => self.cloud += 1,
            DiffStatus::CloudNew => self.cloud_new += 1,
            DiffStatus::Added => self.local_only += 1,
            DiffStatus::DeletedRemote => self.orphaned += 1,
            DiffStatus::Outdated => self.outdated += 1,
            DiffStatus::Modified => self.modified += 1,
            _ => {}
        }

        // Deleted files cannot be operated on locally
        if status != DiffStatus::Deleted && status != DiffStatus::Ignored {
            if file.live_remote().is_some() && file.holder().is_none() && file.local_present() {
                self.checkoutable += 1;
            }
            if file.is_held_by(me) {
                self.checked_out_by_me += 1;
            }
        }

        if !status.is_settled() {
            self.is_fully_synced = false;
        }
    }
}

/// Builds folder summaries from the file table
pub struct FolderAggregator;

impl FolderAggregator {
    /// Summaries for every folder that has at least one file beneath it
    pub fn aggregate<'a>(
        files: impl IntoIterator<Item = &'a FileRecord>,
        me: &UserId,
    ) -> BTreeMap<VaultPath, FolderSummary> {
        let mut summaries: BTreeMap<VaultPath, FolderSummary> = BTreeMap::new();
        let mut holders: BTreeMap<VaultPath, BTreeSet<UserId>> = BTreeMap::new();

        for file in files.into_iter().filter(|f| !f.is_directory()) {
            let holder = file.holder();
            for folder in file.path().ancestor_paths() {
                if let Some(h) = holder {
                    holders.entry(folder.clone()).or_default().insert(h.clone());
                }
                summaries.entry(folder).or_default().add(file, me);
            }
        }

        for (folder, set) in holders {
            if let Some(summary) = summaries.get_mut(&folder) {
                summary.holders = Self::order_holders(set, me);
            }
        }

        summaries
    }

    fn order_holders(set: BTreeSet<UserId>, me: &UserId) -> Vec<UserId> {
        let mut ordered = Vec::with_capacity(set.len());
        if set.contains(me) {
            ordered.push(me.clone());
        }
        ordered.extend(set.into_iter().filter(|h| h != me));
        ordered
    }
}
