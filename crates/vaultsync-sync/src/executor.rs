//! Batch command executor
//!
//! The only entry point the UI layer calls. A command runs in four steps:
//!
//! 1. **Expansion**: folder targets expand to every contained file the
//!    command applies to; explicit file targets that do not qualify are
//!    counted as skipped.
//! 2. **Whole-command preconditions**: privilege, target folder, eligibility
//!    and the move precondition. Any violation rejects the command before
//!    any I/O.
//! 3. **Dispatch**: one independent unit of work per file through a bounded
//!    pool. A unit's failure becomes a per-file error and never aborts the
//!    batch. Cancellation is checked once, before dispatch.
//! 4. **Completion**: every finished unit updates the file table in place and
//!    emits a progress update; summaries are rebuilt once at the end.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;

use futures_util::{stream, StreamExt};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use vaultsync_audit::{AuditLogger, ReasonCode};
use vaultsync_conflict::{ConflictError, ConflictResolver};
use vaultsync_core::{
    config::Config,
    domain::{
        AuditAction, BlockedFile, Command, CommandKind, CommandOptions, CommandResult,
        ConfirmationRequest, DiffStatus, DomainError, ErrorKind, FileError, FileRecord, LocalState,
        MachineId, Placement, Resolution, UserId, VaultPath,
    },
    ports::{CheckinFields, NewRecord},
};

use crate::{
    checkout::{CheckinGate, CheckinOutcome, CheckoutCoordinator, CheckoutError},
    inflight::InFlightGuard,
    progress::{ProgressFn, ProgressTracker},
    table::{FileTable, FileUpdate},
    vault::Vault,
};

// ============================================================================
// Errors and settings
// ============================================================================

/// Reasons a whole command is rejected before dispatch
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("No eligible files for {kind}")]
    NoEligibleFiles { kind: CommandKind },

    #[error("{kind} requires the admin role")]
    NotPrivileged { kind: CommandKind },

    #[error("{kind} requires a target folder")]
    MissingTargetFolder { kind: CommandKind },

    #[error("Move refused: {} file(s) are synced but not checked out by you, first {}", blocking.len(), first_of(blocking))]
    MovePrecondition { blocking: Vec<VaultPath> },

    #[error("Collision resolution failed: {0}")]
    Conflict(#[from] ConflictError),
}

fn first_of(paths: &[VaultPath]) -> String {
    paths.first().map(ToString::to_string).unwrap_or_default()
}

/// Executor tunables
#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    pub max_concurrency: usize,
    pub throughput_smoothing: f64,
    pub default_resolution: Resolution,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            throughput_smoothing: 0.3,
            default_resolution: Resolution::Rename,
        }
    }
}

impl ExecutorSettings {
    pub fn from_config(config: &Config) -> Result<Self, DomainError> {
        Ok(Self {
            max_concurrency: config.executor.max_concurrency,
            throughput_smoothing: config.executor.throughput_smoothing,
            default_resolution: config.default_resolution()?,
        })
    }
}

// ============================================================================
// Units of work
// ============================================================================

/// A file selected for the command
struct Eligible {
    record: FileRecord,
    /// Path relative to the parent of the target it was expanded from
    relative: String,
}

struct Unit {
    record: FileRecord,
    destination: Option<VaultPath>,
    _guards: Vec<InFlightGuard>,
}

enum Completion {
    Done { updates: Vec<FileUpdate>, bytes: u64 },
    Blocked {
        machine_id: Option<MachineId>,
        machine_name: Option<String>,
    },
    NeedsConfirmation {
        machine_id: Option<MachineId>,
        machine_name: Option<String>,
    },
}

impl Completion {
    fn single(update: FileUpdate, bytes: u64) -> Self {
        Completion::Done {
            updates: vec![update],
            bytes,
        }
    }
}

struct UnitFailure {
    kind: ErrorKind,
    message: String,
}

impl UnitFailure {
    fn io(e: anyhow::Error) -> Self {
        Self {
            kind: ErrorKind::Io,
            message: format!("{e:#}"),
        }
    }

    fn remote(e: anyhow::Error) -> Self {
        Self {
            kind: ErrorKind::Remote,
            message: format!("{e:#}"),
        }
    }

    fn precondition(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Precondition,
            message: message.into(),
        }
    }
}

impl From<CheckoutError> for UnitFailure {
    fn from(e: CheckoutError) -> Self {
        let kind = if e.is_precondition() {
            ErrorKind::Precondition
        } else {
            ErrorKind::Remote
        };
        Self {
            kind,
            message: e.to_string(),
        }
    }
}

type UnitResult = Result<Completion, UnitFailure>;

struct UnitReport {
    path: VaultPath,
    result: UnitResult,
}

// ============================================================================
// CommandExecutor
// ============================================================================

/// Runs batch commands against a vault
pub struct CommandExecutor {
    vault: Arc<Vault>,
    coordinator: CheckoutCoordinator,
    resolver: ConflictResolver,
    audit: Arc<AuditLogger>,
    settings: ExecutorSettings,
    progress: Option<ProgressFn>,
}

impl CommandExecutor {
    pub fn new(vault: Arc<Vault>, audit: Arc<AuditLogger>, settings: ExecutorSettings) -> Self {
        let coordinator = CheckoutCoordinator::new(
            Arc::clone(&vault.ports().metadata),
            vault.identity().clone(),
            Arc::clone(&audit),
        );
        let resolver = ConflictResolver::new(Arc::clone(&vault.ports().filesystem));
        Self {
            vault,
            coordinator,
            resolver,
            audit,
            settings,
            progress: None,
        }
    }

    /// Installs a callback invoked after every completed unit
    #[must_use]
    pub fn with_progress(mut self, callback: ProgressFn) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn coordinator(&self) -> &CheckoutCoordinator {
        &self.coordinator
    }

    pub fn vault(&self) -> &Arc<Vault> {
        &self.vault
    }

    fn me(&self) -> &UserId {
        self.vault.identity().user_id()
    }

    /// Executes `command`
    ///
    /// Only whole-command precondition violations return `Err`; every per-file
    /// outcome is reported in the returned [`CommandResult`].
    pub async fn execute(
        &self,
        command: Command,
        cancel: &CancellationToken,
    ) -> Result<CommandResult, ExecutorError> {
        let started = Instant::now();
        let kind = command.kind;
        info!(kind = %kind, targets = command.targets.len(), "Executing command");

        if kind == CommandKind::ForceRelease && !self.vault.identity().is_admin() {
            let first = command.targets.first().cloned().unwrap_or_else(VaultPath::root);
            self.audit
                .log_denied(
                    AuditAction::ForceRelease,
                    &first,
                    ReasonCode::NotPrivileged,
                    "force release requires the admin role",
                )
                .await;
            return Err(ExecutorError::NotPrivileged { kind });
        }

        let target_folder = match (&command.options.target_folder, kind.needs_target_folder()) {
            (None, true) => return Err(ExecutorError::MissingTargetFolder { kind }),
            (folder, _) => folder.clone(),
        };

        let snapshot = self.vault.snapshot().await;
        let (eligible, skipped) = self.expand(&snapshot, &command);
        if eligible.is_empty() {
            return Err(ExecutorError::NoEligibleFiles { kind });
        }

        if kind == CommandKind::Move {
            let blocking: Vec<VaultPath> = eligible
                .iter()
                .filter(|e| !self.coordinator.can_modify_locally(&e.record))
                .map(|e| e.record.path().clone())
                .collect();
            if let Some(first) = blocking.first() {
                warn!(count = blocking.len(), first = %first, "Move rejected, files not checked out");
                self.audit
                    .log_denied(
                        AuditAction::Move,
                        first,
                        ReasonCode::NotHolder,
                        "move requires a checkout on every synced file",
                    )
                    .await;
                return Err(ExecutorError::MovePrecondition { blocking });
            }
        }

        if cancel.is_cancelled() {
            let result = CommandResult::cancelled(skipped + eligible.len());
            info!(kind = %kind, result = %result, "Command cancelled before dispatch");
            self.audit
                .log_command_complete(kind, &result, elapsed_ms(started))
                .await;
            return Ok(result);
        }

        let mut result = CommandResult {
            skipped,
            ..CommandResult::default()
        };

        let planned: Vec<(FileRecord, Option<VaultPath>)> = match &target_folder {
            Some(folder) if kind.needs_target_folder() => {
                let resolution = command
                    .options
                    .resolution
                    .unwrap_or(self.settings.default_resolution);
                self.place(&snapshot, kind, eligible, folder, resolution, &mut result)
                    .await?
            }
            _ => eligible.into_iter().map(|e| (e.record, None)).collect(),
        };

        let units = self.register(planned, &mut result);
        let total_bytes = if kind.is_byte_based() {
            units
                .iter()
                .filter_map(|u| u.record.live_remote().map(|r| r.size))
                .sum()
        } else {
            0
        };
        let mut tracker = ProgressTracker::new(
            units.len(),
            total_bytes,
            kind.is_byte_based(),
            self.settings.throughput_smoothing,
            Instant::now(),
        );

        let options = &command.options;
        let mut completions = stream::iter(units)
            .map(|unit| self.run_unit(kind, unit, options))
            .buffer_unordered(self.settings.max_concurrency.max(1));

        while let Some(report) = completions.next().await {
            let bytes = match &report.result {
                Ok(Completion::Done { bytes, .. }) => *bytes,
                _ => 0,
            };
            let update = tracker.record(report.path.clone(), bytes, Instant::now());
            if let Some(callback) = &self.progress {
                callback(update);
            }
            self.fold(report, &mut result).await;
        }
        drop(completions);

        self.vault.rebuild_summaries().await;

        info!(
            kind = %kind,
            succeeded = result.succeeded,
            failed = result.failed,
            skipped = result.skipped,
            blocked = result.blocked.len(),
            confirmations = result.confirmations_required.len(),
            "Command complete"
        );
        self.audit
            .log_command_complete(kind, &result, elapsed_ms(started))
            .await;
        Ok(result)
    }

    /// Folds one unit's outcome into the result and the file table
    async fn fold(&self, report: UnitReport, result: &mut CommandResult) {
        let UnitReport { path, result: outcome } = report;
        match outcome {
            Ok(Completion::Done { updates, .. }) => {
                for update in updates {
                    self.vault.apply(update).await;
                }
                result.succeeded += 1;
            }
            Ok(Completion::Blocked {
                machine_id,
                machine_name,
            }) => {
                info!(path = %path, machine = ?machine_name, "Checkin blocked, holding machine offline");
                result.blocked.push(BlockedFile {
                    path,
                    machine_id,
                    machine_name,
                });
            }
            Ok(Completion::NeedsConfirmation {
                machine_id,
                machine_name,
            }) => {
                result.confirmations_required.push(ConfirmationRequest {
                    path,
                    machine_id,
                    machine_name,
                });
            }
            Err(failure) => {
                warn!(path = %path, kind = ?failure.kind, error = %failure.message, "Unit failed");
                result.record_failure(FileError::new(path, failure.kind, failure.message));
            }
        }
    }

    // ========================================================================
    // Expansion and planning
    // ========================================================================

    /// Files the command applies to, plus the count of explicit targets that
    /// do not qualify
    fn expand(&self, table: &FileTable, command: &Command) -> (Vec<Eligible>, usize) {
        let kind = command.kind;
        let mut seen: BTreeSet<VaultPath> = BTreeSet::new();
        let mut eligible = Vec::new();
        let mut skipped = 0;

        for target in &command.targets {
            let base = target.parent().unwrap_or_else(VaultPath::root);
            let relative = |record: &FileRecord| {
                record
                    .path()
                    .strip_prefix(&base)
                    .unwrap_or(record.path().as_str())
                    .to_string()
            };

            match table.get(target) {
                Some(record) if !record.is_directory() => {
                    if !seen.insert(record.path().clone()) {
                        continue;
                    }
                    if applies(kind, record, self.me()) {
                        eligible.push(Eligible {
                            relative: relative(record),
                            record: record.clone(),
                        });
                    } else {
                        debug!(path = %target, kind = %kind, status = %record.diff_status(), "Target does not qualify");
                        skipped += 1;
                    }
                }
                _ if table.is_folder(target) => {
                    for record in table.beneath(target) {
                        if record.is_directory()
                            || seen.contains(record.path())
                            || !applies(kind, record, self.me())
                        {
                            continue;
                        }
                        seen.insert(record.path().clone());
                        eligible.push(Eligible {
                            relative: relative(record),
                            record: record.clone(),
                        });
                    }
                }
                _ => {
                    warn!(path = %target, "Target not in file table");
                    skipped += 1;
                }
            }
        }

        (eligible, skipped)
    }

    /// Destinations for move/copy after collision resolution
    ///
    /// A destination that would overwrite a synced file the acting user may
    /// not modify fails its unit before any I/O.
    async fn place(
        &self,
        snapshot: &FileTable,
        kind: CommandKind,
        eligible: Vec<Eligible>,
        folder: &VaultPath,
        resolution: Resolution,
        result: &mut CommandResult,
    ) -> Result<Vec<(FileRecord, Option<VaultPath>)>, ExecutorError> {
        let mut by_source: HashMap<VaultPath, FileRecord> = HashMap::new();
        let mut placements = Vec::with_capacity(eligible.len());

        for Eligible { record, relative } in eligible {
            match folder.join_relative(&relative) {
                Ok(destination) => {
                    placements.push(Placement::new(record.path().clone(), destination));
                    by_source.insert(record.path().clone(), record);
                }
                Err(e) => result.record_failure(FileError::new(
                    record.path().clone(),
                    ErrorKind::Precondition,
                    e.to_string(),
                )),
            }
        }

        let proposed = placements.len();
        let finals = self.resolver.place(placements, resolution).await?;
        result.skipped += proposed - finals.len();

        let mut planned = Vec::with_capacity(finals.len());
        for Placement {
            source,
            destination,
        } in finals
        {
            let Some(record) = by_source.remove(&source) else {
                continue;
            };
            if let Some(existing) = snapshot.get(&destination) {
                if !self.coordinator.can_modify_locally(existing) {
                    let (reason, message) = match existing.holder() {
                        Some(holder) => (
                            ReasonCode::NotHolder,
                            format!("destination {destination} is checked out by {holder}"),
                        ),
                        None => (
                            ReasonCode::NotCheckedOut,
                            format!("destination {destination} is not checked out"),
                        ),
                    };
                    warn!(path = %source, destination = %destination, "Overwrite refused");
                    self.audit
                        .log_denied(placement_action(kind), &destination, reason, &message)
                        .await;
                    result.record_failure(FileError::new(source, ErrorKind::Precondition, message));
                    continue;
                }
            }
            planned.push((record, Some(destination)));
        }
        Ok(planned)
    }

    /// Registers every unit's paths; units already in flight are skipped
    fn register(&self, planned: Vec<(FileRecord, Option<VaultPath>)>, result: &mut CommandResult) -> Vec<Unit> {
        let registry = self.vault.in_flight();
        let mut units = Vec::with_capacity(planned.len());

        for (record, destination) in planned {
            let mut guards = Vec::with_capacity(2);
            let mut paths = vec![record.path().clone()];
            paths.extend(destination.iter().cloned());

            for path in &paths {
                match registry.try_register(path) {
                    Some(guard) => guards.push(guard),
                    None => break,
                }
            }

            if guards.len() < paths.len() {
                debug!(path = %record.path(), "Already in flight, skipping");
                result.skipped += 1;
                continue;
            }

            units.push(Unit {
                record,
                destination,
                _guards: guards,
            });
        }

        units
    }

    // ========================================================================
    // Unit implementations
    // ========================================================================

    async fn run_unit(&self, kind: CommandKind, unit: Unit, options: &CommandOptions) -> UnitReport {
        let Unit {
            record,
            destination,
            _guards,
        } = unit;

        let result = match (kind, destination) {
            (CommandKind::Download | CommandKind::GetLatest, _) => self.download(&record).await,
            (CommandKind::Checkout, _) => self.checkout(&record).await,
            (CommandKind::Checkin, _) => self.checkin(&record, options).await,
            (CommandKind::Discard, _) => self.discard(&record).await,
            (CommandKind::ForceRelease, _) => self.force_release(&record).await,
            (CommandKind::Sync, _) => self.first_sync(&record).await,
            (CommandKind::Move, Some(to)) => self.move_file(&record, to).await,
            (CommandKind::Copy, Some(to)) => self.copy_file(&record, to).await,
            (CommandKind::Move | CommandKind::Copy, None) => {
                Err(UnitFailure::precondition("no destination planned"))
            }
            (CommandKind::DeleteLocal, _) => self.delete_local(&record).await,
            (CommandKind::DeleteServer, _) => self.delete_server(&record, options.delete_local).await,
            (CommandKind::DeleteBoth, _) => self.delete_both(&record).await,
        };

        UnitReport {
            path: record.path().clone(),
            result,
        }
    }

    async fn download(&self, record: &FileRecord) -> UnitResult {
        let started = Instant::now();
        let remote = record
            .live_remote()
            .ok_or_else(|| UnitFailure::precondition("no remote record"))?;

        let data = self
            .vault
            .ports()
            .blobs
            .get(&remote.content_hash)
            .await
            .map_err(UnitFailure::io)?;
        self.vault
            .ports()
            .filesystem
            .write_file(record.path(), &data)
            .await
            .map_err(UnitFailure::io)?;

        let size = data.len() as u64;
        let mut updated = record.clone();
        updated.set_local(Some(
            LocalState::file(remote.content_hash.clone(), size).synced_at(remote.version),
        ));

        self.audit
            .log_download(record.path(), size, elapsed_ms(started))
            .await;
        Ok(Completion::single(FileUpdate::Upsert(updated), size))
    }

    async fn checkout(&self, record: &FileRecord) -> UnitResult {
        let remote = self.coordinator.checkout(record).await?;
        let mut updated = record.clone();
        updated.set_remote(Some(remote));
        Ok(Completion::single(FileUpdate::Upsert(updated), 0))
    }

    async fn checkin(&self, record: &FileRecord, options: &CommandOptions) -> UnitResult {
        let path = record.path();
        let remote = record
            .live_remote()
            .ok_or_else(|| UnitFailure::precondition("no remote record"))?;
        let gate = self.coordinator.arbitrate(record).await?;

        let proceeding = match gate {
            CheckinGate::Proceed => true,
            CheckinGate::ConfirmationRequired { .. } => options.confirm_force_checkin,
            CheckinGate::Blocked { .. } => false,
        };

        // A gate that does not proceed never touches the file
        let mut hash = remote.content_hash.clone();
        let mut size = record.local().map_or(0, |l| l.size);
        if proceeding {
            let filesystem = &self.vault.ports().filesystem;
            hash = filesystem.compute_hash(path).await.map_err(UnitFailure::io)?;
            if hash != remote.content_hash {
                let data = filesystem.read_file(path).await.map_err(UnitFailure::io)?;
                size = data.len() as u64;
                hash = self
                    .vault
                    .ports()
                    .blobs
                    .put(&data)
                    .await
                    .map_err(UnitFailure::io)?;
                debug!(path = %path, hash = %hash.short(), bytes = size, "Uploaded new content");
            }
        }

        let fields = CheckinFields {
            content_hash: hash.clone(),
            size,
            path: path.clone(),
            metadata: record.pending_metadata().clone(),
            comment: options.comment.clone(),
            force: false,
        };

        match self
            .coordinator
            .checkin_with_gate(record, fields, gate, options.confirm_force_checkin)
            .await?
        {
            CheckinOutcome::Completed(updated_remote) => {
                let version = updated_remote.version;
                let mut updated = record.clone();
                updated.set_remote(Some(updated_remote));
                updated.take_pending_metadata();
                updated.set_local(Some(LocalState::file(hash, size).synced_at(version)));
                Ok(Completion::single(FileUpdate::Upsert(updated), size))
            }
            CheckinOutcome::Blocked {
                machine_id,
                machine_name,
            } => Ok(Completion::Blocked {
                machine_id,
                machine_name,
            }),
            CheckinOutcome::ConfirmationRequired {
                machine_id,
                machine_name,
            } => Ok(Completion::NeedsConfirmation {
                machine_id,
                machine_name,
            }),
        }
    }

    async fn discard(&self, record: &FileRecord) -> UnitResult {
        let remote = self.coordinator.discard(record).await?;

        let local_hash = record.local().and_then(|l| l.content_hash.as_ref());
        let mut size = record.local().map_or(remote.size, |l| l.size);
        let mut bytes = 0;
        if local_hash != Some(&remote.content_hash) {
            let data = self
                .vault
                .ports()
                .blobs
                .get(&remote.content_hash)
                .await
                .map_err(UnitFailure::io)?;
            self.vault
                .ports()
                .filesystem
                .write_file(record.path(), &data)
                .await
                .map_err(UnitFailure::io)?;
            size = data.len() as u64;
            bytes = size;
        }

        let mut updated = record.clone();
        updated.set_local(Some(
            LocalState::file(remote.content_hash.clone(), size).synced_at(remote.version),
        ));
        updated.set_remote(Some(remote));
        Ok(Completion::single(FileUpdate::Upsert(updated), bytes))
    }

    async fn force_release(&self, record: &FileRecord) -> UnitResult {
        let remote = self.coordinator.force_release(record).await?;
        let mut updated = record.clone();
        updated.set_remote(Some(remote));
        Ok(Completion::single(FileUpdate::Upsert(updated), 0))
    }

    /// First check-in of a local-only file
    async fn first_sync(&self, record: &FileRecord) -> UnitResult {
        let path = record.path();
        let data = self
            .vault
            .ports()
            .filesystem
            .read_file(path)
            .await
            .map_err(UnitFailure::io)?;
        let size = data.len() as u64;
        let hash = self
            .vault
            .ports()
            .blobs
            .put(&data)
            .await
            .map_err(UnitFailure::io)?;

        let new_record = NewRecord {
            path: path.clone(),
            content_hash: hash.clone(),
            size,
        };
        let remote = self
            .vault
            .ports()
            .metadata
            .create_record(&new_record, self.me())
            .await
            .map_err(UnitFailure::remote)?;

        info!(path = %path, id = %remote.id, "First check-in");
        self.audit.log_first_sync(path, &remote.id, size).await;

        let mut updated = record.clone();
        updated.set_local(Some(LocalState::file(hash, size).synced_at(remote.version)));
        updated.set_remote(Some(remote));
        Ok(Completion::single(FileUpdate::Upsert(updated), size))
    }

    async fn move_file(&self, record: &FileRecord, to: VaultPath) -> UnitResult {
        let from = record.path();
        self.vault
            .ports()
            .filesystem
            .move_file(from, &to)
            .await
            .map_err(UnitFailure::io)?;
        self.audit.log_placement(AuditAction::Move, from, &to).await;

        let overwritten = self
            .vault
            .record(&to)
            .await
            .filter(|existing| existing.live_remote().is_some());
        let Some(existing) = overwritten else {
            return Ok(Completion::single(
                FileUpdate::Relocate {
                    from: from.clone(),
                    to,
                },
                0,
            ));
        };

        // The destination keeps its remote record; the source's, if any,
        // stays behind as a cloud-only record
        let moved = overwrite(existing, record.local().cloned().unwrap_or_default());
        let left = if record.live_remote().is_some() {
            let mut left = record.clone();
            left.set_local(None);
            FileUpdate::Upsert(left)
        } else {
            FileUpdate::Remove(from.clone())
        };
        Ok(Completion::Done {
            updates: vec![FileUpdate::Upsert(moved), left],
            bytes: 0,
        })
    }

    async fn copy_file(&self, record: &FileRecord, to: VaultPath) -> UnitResult {
        let from = record.path();
        self.vault
            .ports()
            .filesystem
            .copy_file(from, &to)
            .await
            .map_err(UnitFailure::io)?;

        let source = record.local().cloned().unwrap_or_default();
        let copy = match self.vault.record(&to).await {
            Some(existing) if !existing.is_directory() => overwrite(existing, source),
            _ => FileRecord::new(to.clone(), false).with_local(LocalState {
                active_version: None,
                base_hash: None,
                ..source
            }),
        };

        self.audit.log_placement(AuditAction::Copy, from, &to).await;
        Ok(Completion::single(FileUpdate::Upsert(copy), 0))
    }

    async fn delete_local(&self, record: &FileRecord) -> UnitResult {
        let path = record.path();
        self.vault
            .ports()
            .filesystem
            .delete_item(path)
            .await
            .map_err(UnitFailure::io)?;
        self.audit.log_delete(path, None).await;

        let update = if record.live_remote().is_some() {
            let mut updated = record.clone();
            updated.set_local(None);
            FileUpdate::Upsert(updated)
        } else {
            FileUpdate::Remove(path.clone())
        };
        Ok(Completion::single(update, 0))
    }

    async fn delete_server(&self, record: &FileRecord, delete_local: bool) -> UnitResult {
        let path = record.path();
        let remote = record
            .live_remote()
            .ok_or_else(|| UnitFailure::precondition("no remote record"))?;

        self.vault
            .ports()
            .metadata
            .soft_delete(&remote.id, self.me())
            .await
            .map_err(UnitFailure::remote)?;
        self.audit.log_delete(path, Some(&remote.id)).await;

        if !record.local_present() {
            return Ok(Completion::single(FileUpdate::Remove(path.clone()), 0));
        }
        if delete_local {
            self.vault
                .ports()
                .filesystem
                .delete_item(path)
                .await
                .map_err(UnitFailure::io)?;
            return Ok(Completion::single(FileUpdate::Remove(path.clone()), 0));
        }

        let mut tombstone = remote.clone();
        tombstone.deleted = true;
        let mut updated = record.clone();
        updated.set_remote(Some(tombstone));
        Ok(Completion::single(FileUpdate::Upsert(updated), 0))
    }

    async fn delete_both(&self, record: &FileRecord) -> UnitResult {
        let path = record.path();
        let id = record.live_remote().map(|r| r.id.clone());

        if let Some(id) = &id {
            self.vault
                .ports()
                .metadata
                .soft_delete(id, self.me())
                .await
                .map_err(UnitFailure::remote)?;
        }
        if record.local_present() {
            self.vault
                .ports()
                .filesystem
                .delete_item(path)
                .await
                .map_err(UnitFailure::io)?;
        }

        self.audit.log_delete(path, id.as_ref()).await;
        Ok(Completion::single(FileUpdate::Remove(path.clone()), 0))
    }
}

// ============================================================================
// Applicability
// ============================================================================

/// Returns true if `kind` applies to `record` for the acting user `me`
pub fn applies(kind: CommandKind, record: &FileRecord, me: &UserId) -> bool {
    if record.is_directory() {
        return false;
    }
    let live = record.live_remote();
    let local = record.local_present();
    let ignored = record.diff_status() == DiffStatus::Ignored;
    let free_or_mine = record.holder().map_or(true, |h| h == me);

    match kind {
        CommandKind::Download => live.is_some() && !local,
        CommandKind::GetLatest => record.diff_status() == DiffStatus::Outdated,
        CommandKind::Checkout => live.is_some_and(|r| !r.is_checked_out()) && local,
        CommandKind::Checkin => record.is_held_by(me) && local,
        CommandKind::Discard => record.is_held_by(me),
        CommandKind::ForceRelease => record.holder().is_some_and(|h| h != me),
        CommandKind::Sync => local && live.is_none() && !ignored,
        CommandKind::Move => local && !ignored,
        CommandKind::Copy => local,
        CommandKind::DeleteLocal => local,
        CommandKind::DeleteServer => live.is_some() && free_or_mine,
        CommandKind::DeleteBoth => match live {
            Some(_) => free_or_mine,
            None => local,
        },
    }
}

/// `existing` with its local side replaced by `source`; the sync base stays
fn overwrite(mut existing: FileRecord, source: LocalState) -> FileRecord {
    let (active_version, base_hash) = existing
        .local()
        .map(|l| (l.active_version, l.base_hash.clone()))
        .unwrap_or_default();
    existing.set_local(Some(LocalState {
        active_version,
        base_hash,
        ..source
    }));
    existing
}

fn placement_action(kind: CommandKind) -> AuditAction {
    match kind {
        CommandKind::Move => AuditAction::Move,
        _ => AuditAction::Copy,
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
