//! Vault context object
//!
//! Owns everything one connected working tree needs: the acting identity, the
//! ports, the ignore rules, the file table and the in-flight registry.
//! The table is written only by the scan and by the command executor;
//! readers get clones.
//!
//! Lifecycle:
//! - `connect`: fetch the manifest and run the initial scan
//! - `rescan`: the same, keeping metadata staged on held files
//! - `disconnect`: flush staged metadata, persist the local index; nothing is
//!   released server-side

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use vaultsync_core::{
    config::Config,
    domain::{DiffStatus, EditableField, FileId, FileRecord, Identity, PendingMetadata, VaultPath},
    ports::{IBlobStore, IMetadataService, IVaultFileSystem},
};

use crate::{
    aggregator::FolderSummary,
    classifier::{ClassifyContext, DiffClassifier},
    ignore::IgnoreRules,
    inflight::InFlightPaths,
    reconcile::{self, LocalIndex, MergeStats, TreeScanner},
    table::{FileTable, FileUpdate},
    SyncError,
};

/// External collaborators of a vault
#[derive(Clone)]
pub struct VaultPorts {
    pub metadata: Arc<dyn IMetadataService>,
    pub blobs: Arc<dyn IBlobStore>,
    pub filesystem: Arc<dyn IVaultFileSystem>,
}

/// Tunables of the scan and the classifier
#[derive(Debug, Clone)]
pub struct VaultSettings {
    pub ignore_patterns: Vec<String>,
    pub cloud_new_window: Duration,
    pub scan_concurrency: usize,
}

impl Default for VaultSettings {
    fn default() -> Self {
        Self {
            ignore_patterns: Vec::new(),
            cloud_new_window: Duration::hours(24),
            scan_concurrency: 8,
        }
    }
}

impl VaultSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            ignore_patterns: config.ignore.patterns.clone(),
            cloud_new_window: Duration::hours(i64::from(config.classifier.cloud_new_window_hours)),
            scan_concurrency: config.executor.max_concurrency,
        }
    }
}

/// Outcome of a scan
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub stats: MergeStats,
    pub records: usize,
    pub status_counts: BTreeMap<DiffStatus, usize>,
}

/// Outcome of a disconnect
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisconnectReport {
    pub flushed: usize,
    pub failed: usize,
}

/// One connected working tree
pub struct Vault {
    identity: Identity,
    ports: VaultPorts,
    ignore: IgnoreRules,
    classifier: DiffClassifier,
    cloud_new_window: Duration,
    scan_concurrency: usize,
    table: RwLock<FileTable>,
    in_flight: InFlightPaths,
}

impl Vault {
    pub fn new(identity: Identity, ports: VaultPorts, settings: VaultSettings) -> Self {
        Self {
            ignore: IgnoreRules::new(&settings.ignore_patterns),
            identity,
            ports,
            classifier: DiffClassifier,
            cloud_new_window: settings.cloud_new_window,
            scan_concurrency: settings.scan_concurrency.max(1),
            table: RwLock::new(FileTable::default()),
            in_flight: InFlightPaths::new(),
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Loads the manifest and runs the initial scan
    pub async fn connect(&self) -> Result<ScanReport, SyncError> {
        info!(user = %self.identity.user_id(), machine = %self.identity.machine_id(), "Connecting vault");
        self.rescan().await
    }

    /// Rebuilds the file table from the working tree and the manifest
    pub async fn rescan(&self) -> Result<ScanReport, SyncError> {
        let manifest = self
            .ports
            .metadata
            .fetch_manifest()
            .await
            .map_err(SyncError::Manifest)?;
        // Sync state learned since the index was last saved wins over the file
        let known = {
            let table = self.table.read().await;
            LocalIndex::from_records(table.iter())
        };
        let index = LocalIndex::load(self.ports.filesystem.as_ref())
            .await?
            .overlay(known);
        let local = TreeScanner::new(Arc::clone(&self.ports.filesystem), self.scan_concurrency)
            .scan(&self.ignore)
            .await?;

        let (mut records, stats) = reconcile::merge(local, manifest, &index);
        let ctx = self.context();
        let me = self.identity.user_id();

        let mut table = self.table.write().await;
        for record in &mut records {
            if let Some(previous) = table.get(record.path()) {
                for (field, value) in previous.pending_metadata() {
                    if let Err(e) = record.stage_metadata(me, *field, value.clone()) {
                        debug!(path = %record.path(), error = %e, "Dropping staged metadata");
                    }
                }
            }
            let status = self.classifier.classify_record(record, &self.ignore, &ctx);
            record.set_diff_status(status);
        }

        *table = FileTable::new(records, me);
        reconcile::log_stats(&stats, table.len());

        Ok(ScanReport {
            stats,
            records: table.len(),
            status_counts: Self::count_statuses(&table),
        })
    }

    /// Flushes staged metadata and persists the local index
    pub async fn disconnect(&self) -> Result<DisconnectReport, SyncError> {
        let me = self.identity.user_id();
        let staged: Vec<(VaultPath, FileId, PendingMetadata)> = {
            let table = self.table.read().await;
            table
                .iter()
                .filter(|r| r.is_held_by(me) && !r.pending_metadata().is_empty())
                .filter_map(|r| {
                    let remote = r.live_remote()?;
                    Some((r.path().clone(), remote.id.clone(), r.pending_metadata().clone()))
                })
                .collect()
        };

        let mut report = DisconnectReport::default();
        for (path, id, fields) in staged {
            match self.ports.metadata.update_metadata(&id, me, &fields).await {
                Ok(remote) => {
                    let mut table = self.table.write().await;
                    if let Some(record) = table.get_mut(&path) {
                        record.take_pending_metadata();
                        record.set_remote(Some(remote));
                    }
                    report.flushed += 1;
                }
                Err(e) => {
                    warn!(path = %path, error = %e, "Failed to flush staged metadata");
                    report.failed += 1;
                }
            }
        }

        self.save_index().await?;
        info!(flushed = report.flushed, failed = report.failed, "Vault disconnected");
        Ok(report)
    }

    /// Writes the local index for the current table
    pub async fn save_index(&self) -> Result<(), SyncError> {
        let index = {
            let table = self.table.read().await;
            LocalIndex::from_records(table.iter())
        };
        index.save(self.ports.filesystem.as_ref()).await
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Stages an edit to an editable field of a file held by the acting user
    pub async fn stage_metadata(
        &self,
        path: &VaultPath,
        field: EditableField,
        value: impl Into<String>,
    ) -> Result<(), SyncError> {
        let mut table = self.table.write().await;
        let record = table
            .get_mut(path)
            .ok_or_else(|| SyncError::PathNotFound(path.clone()))?;
        record.stage_metadata(self.identity.user_id(), field, value)?;
        debug!(path = %path, field = %field, "Metadata staged");
        Ok(())
    }

    /// Applies one update and reclassifies the touched record
    ///
    /// Summaries are left stale until [`Self::rebuild_summaries`].
    pub async fn apply(&self, update: FileUpdate) {
        let ctx = self.context();
        let mut table = self.table.write().await;
        if let Some(path) = table.apply(update) {
            if let Some(record) = table.get_mut(&path) {
                let status = self.classifier.classify_record(record, &self.ignore, &ctx);
                record.set_diff_status(status);
            }
        }
    }

    pub async fn rebuild_summaries(&self) {
        self.table
            .write()
            .await
            .rebuild_summaries(self.identity.user_id());
    }

    /// Applies a batch of updates, then rebuilds summaries once
    pub async fn apply_all(&self, updates: impl IntoIterator<Item = FileUpdate>) {
        for update in updates {
            self.apply(update).await;
        }
        self.rebuild_summaries().await;
    }

    // ========================================================================
    // Readers
    // ========================================================================

    pub async fn record(&self, path: &VaultPath) -> Option<FileRecord> {
        self.table.read().await.get(path).cloned()
    }

    /// Every record in path order
    pub async fn records(&self) -> Vec<FileRecord> {
        self.table.read().await.iter().cloned().collect()
    }

    pub async fn folder_summary(&self, folder: &VaultPath) -> FolderSummary {
        self.table.read().await.summary(folder)
    }

    pub async fn status_counts(&self) -> BTreeMap<DiffStatus, usize> {
        Self::count_statuses(&*self.table.read().await)
    }

    /// Copy of the whole table
    pub async fn snapshot(&self) -> FileTable {
        self.table.read().await.clone()
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn ports(&self) -> &VaultPorts {
        &self.ports
    }

    pub fn ignore(&self) -> &IgnoreRules {
        &self.ignore
    }

    pub fn in_flight(&self) -> &InFlightPaths {
        &self.in_flight
    }

    fn context(&self) -> ClassifyContext {
        ClassifyContext::new(self.identity.user_id().clone(), Utc::now(), self.cloud_new_window)
    }

    fn count_statuses(table: &FileTable) -> BTreeMap<DiffStatus, usize> {
        let mut counts = BTreeMap::new();
        for record in table.iter().filter(|r| !r.is_directory()) {
            *counts.entry(record.diff_status()).or_insert(0) += 1;
        }
        counts
    }
}
