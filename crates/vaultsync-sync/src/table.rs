//! The vault file table
//!
//! Records keyed by vault path plus the folder summaries derived from them.
//! Summaries are never patched: callers mutate records, then call
//! [`FileTable::rebuild_summaries`] once.

use std::collections::BTreeMap;

use vaultsync_core::domain::{FileRecord, UserId, VaultPath};

use crate::aggregator::{FolderAggregator, FolderSummary};

/// A change produced by one completed unit of work
#[derive(Debug, Clone, PartialEq)]
pub enum FileUpdate {
    /// Insert or replace the record at its path
    Upsert(FileRecord),
    /// Drop the record at a path
    Remove(VaultPath),
    /// Move the record at `from` to `to`, keeping its remote record
    Relocate { from: VaultPath, to: VaultPath },
}

impl FileUpdate {
    /// Path the update leaves a record at, if any
    pub fn touched_path(&self) -> Option<&VaultPath> {
        match self {
            FileUpdate::Upsert(record) => Some(record.path()),
            FileUpdate::Remove(_) => None,
            FileUpdate::Relocate { to, .. } => Some(to),
        }
    }
}

/// Records and derived summaries
#[derive(Debug, Clone, Default)]
pub struct FileTable {
    records: BTreeMap<VaultPath, FileRecord>,
    summaries: BTreeMap<VaultPath, FolderSummary>,
}

impl FileTable {
    /// Builds a table and its summaries
    pub fn new(records: impl IntoIterator<Item = FileRecord>, me: &UserId) -> Self {
        let mut table = Self {
            records: records
                .into_iter()
                .map(|r| (r.path().clone(), r))
                .collect(),
            summaries: BTreeMap::new(),
        };
        table.rebuild_summaries(me);
        table
    }

    pub fn get(&self, path: &VaultPath) -> Option<&FileRecord> {
        self.records.get(path)
    }

    pub fn get_mut(&mut self, path: &VaultPath) -> Option<&mut FileRecord> {
        self.records.get_mut(path)
    }

    pub fn contains(&self, path: &VaultPath) -> bool {
        self.records.contains_key(path)
    }

    /// Records in path order
    pub fn iter(&self) -> impl Iterator<Item = &FileRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records strictly beneath `folder`
    pub fn beneath<'a>(&'a self, folder: &'a VaultPath) -> impl Iterator<Item = &'a FileRecord> + 'a {
        self.records
            .values()
            .filter(move |r| r.path().strip_prefix(folder).is_some())
    }

    /// Returns true if `path` is a directory record or has records beneath it
    pub fn is_folder(&self, path: &VaultPath) -> bool {
        path.is_root()
            || self.records.get(path).is_some_and(FileRecord::is_directory)
            || self.beneath(path).next().is_some()
    }

    /// Applies one update; summaries are left stale
    ///
    /// Returns the path of the record the update leaves behind.
    pub fn apply(&mut self, update: FileUpdate) -> Option<VaultPath> {
        match update {
            FileUpdate::Upsert(record) => {
                let path = record.path().clone();
                self.records.insert(path.clone(), record);
                Some(path)
            }
            FileUpdate::Remove(path) => {
                self.records.remove(&path);
                None
            }
            FileUpdate::Relocate { from, to } => {
                let mut record = self.records.remove(&from)?;
                record.relocate(to.clone());
                self.records.insert(to.clone(), record);
                Some(to)
            }
        }
    }

    /// Recomputes every folder summary in one pass
    pub fn rebuild_summaries(&mut self, me: &UserId) {
        self.summaries = FolderAggregator::aggregate(self.records.values(), me);
    }

    /// Summary of `folder`; folders without files are trivially synced
    pub fn summary(&self, folder: &VaultPath) -> FolderSummary {
        self.summaries.get(folder).cloned().unwrap_or_default()
    }

    pub fn summaries(&self) -> &BTreeMap<VaultPath, FolderSummary> {
        &self.summaries
    }
}
