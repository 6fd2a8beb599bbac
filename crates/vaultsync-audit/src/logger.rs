//! AuditLogger - high-level audit logging service
//!
//! Wraps `IAuditStore::save_audit()` with convenience methods for each kind
//! of auditable operation. Every entry is stamped with the acting user and
//! machine. All methods are non-fatal: persistence errors are logged via
//! `tracing::warn!` but never propagated.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use vaultsync_core::{
    domain::{
        AuditAction, AuditEntry, AuditResult, CommandKind, CommandResult, FileId, Identity,
        MachineId, UserId, VaultPath,
    },
    ports::IAuditStore,
};

use crate::reason::ReasonCode;

/// High-level audit logger over an [`IAuditStore`].
///
/// All methods silently swallow errors (logging a warning) so audit failures
/// never break a command.
pub struct AuditLogger {
    store: Arc<dyn IAuditStore>,
    identity: Identity,
}

impl AuditLogger {
    /// Creates a new `AuditLogger` acting as `identity`.
    pub fn new(store: Arc<dyn IAuditStore>, identity: Identity) -> Self {
        Self { store, identity }
    }

    fn entry(&self, action: AuditAction, result: AuditResult) -> AuditEntry {
        AuditEntry::new(action, result).with_actor(
            self.identity.user_id().clone(),
            self.identity.machine_id().clone(),
        )
    }

    /// Persist an audit entry, swallowing errors with a tracing warning.
    async fn save(&self, entry: &AuditEntry) {
        if let Err(e) = self.store.save_audit(entry).await {
            tracing::warn!(error = %e, action = %entry.action(), "Failed to save audit entry");
        }
    }

    // ========================================================================
    // Checkout transitions
    // ========================================================================

    /// Log a successful checkout.
    pub async fn log_checkout(&self, path: &VaultPath, file_id: &FileId) {
        let entry = self
            .entry(AuditAction::Checkout, AuditResult::success())
            .with_path(path.clone())
            .with_file_id(file_id.clone());
        self.save(&entry).await;
    }

    /// Log a checkin. `overridden` names the machine whose checkout was
    /// overridden, which turns the entry into a `force_checkin`.
    pub async fn log_checkin(
        &self,
        path: &VaultPath,
        file_id: &FileId,
        version: u64,
        overridden: Option<&MachineId>,
    ) {
        let action = if overridden.is_some() {
            AuditAction::ForceCheckin
        } else {
            AuditAction::Checkin
        };
        let entry = self
            .entry(action, AuditResult::success())
            .with_path(path.clone())
            .with_file_id(file_id.clone())
            .with_details(json!({
                "version": version,
                "overridden_machine": overridden.map(MachineId::as_str),
            }));
        self.save(&entry).await;
    }

    /// Log a discarded checkout.
    pub async fn log_discard(&self, path: &VaultPath, file_id: &FileId) {
        let entry = self
            .entry(AuditAction::Discard, AuditResult::success())
            .with_path(path.clone())
            .with_file_id(file_id.clone());
        self.save(&entry).await;
    }

    /// Log a privileged release of another user's checkout.
    pub async fn log_force_release(
        &self,
        path: &VaultPath,
        file_id: &FileId,
        previous_holder: &UserId,
    ) {
        let entry = self
            .entry(AuditAction::ForceRelease, AuditResult::success())
            .with_path(path.clone())
            .with_file_id(file_id.clone())
            .with_details(json!({
                "previous_holder": previous_holder.as_str(),
                "role": self.identity.role().to_string(),
            }));
        self.save(&entry).await;
    }

    /// Log a refused or failed checkout-related operation.
    pub async fn log_denied(
        &self,
        action: AuditAction,
        path: &VaultPath,
        reason: ReasonCode,
        message: &str,
    ) {
        let entry = self
            .entry(action, AuditResult::failed(reason.to_string(), message))
            .with_path(path.clone());
        self.save(&entry).await;
    }

    // ========================================================================
    // File operations
    // ========================================================================

    /// Log the first check-in of a local-only file.
    pub async fn log_first_sync(&self, path: &VaultPath, file_id: &FileId, size_bytes: u64) {
        let entry = self
            .entry(AuditAction::FirstSync, AuditResult::success())
            .with_path(path.clone())
            .with_file_id(file_id.clone())
            .with_details(json!({ "size_bytes": size_bytes }));
        self.save(&entry).await;
    }

    /// Log a download of remote content.
    pub async fn log_download(&self, path: &VaultPath, size_bytes: u64, duration_ms: u64) {
        let entry = self
            .entry(AuditAction::Download, AuditResult::success())
            .with_path(path.clone())
            .with_duration_ms(duration_ms)
            .with_details(json!({ "size_bytes": size_bytes }));
        self.save(&entry).await;
    }

    /// Log a move or copy inside the working tree.
    pub async fn log_placement(&self, action: AuditAction, from: &VaultPath, to: &VaultPath) {
        let entry = self
            .entry(action, AuditResult::success())
            .with_path(to.clone())
            .with_details(json!({ "from": from.as_str() }));
        self.save(&entry).await;
    }

    /// Log a deletion. Server deletions carry the record id.
    pub async fn log_delete(&self, path: &VaultPath, file_id: Option<&FileId>) {
        let action = if file_id.is_some() {
            AuditAction::DeleteServer
        } else {
            AuditAction::DeleteLocal
        };
        let mut entry = self
            .entry(action, AuditResult::success())
            .with_path(path.clone());
        if let Some(id) = file_id {
            entry = entry.with_file_id(id.clone());
        }
        self.save(&entry).await;
    }

    // ========================================================================
    // Commands and errors
    // ========================================================================

    /// Log the outcome of a batch command.
    pub async fn log_command_complete(
        &self,
        kind: CommandKind,
        result: &CommandResult,
        duration_ms: u64,
    ) {
        let audit_result = if result.failed == 0 {
            AuditResult::success()
        } else {
            AuditResult::failed("partial_failure", result.to_string())
        };
        let entry = self
            .entry(AuditAction::CommandComplete, audit_result)
            .with_duration_ms(duration_ms)
            .with_details(json!({
                "command": kind.as_str(),
                "succeeded": result.succeeded,
                "failed": result.failed,
                "skipped": result.skipped,
                "blocked": result.blocked.len(),
                "confirmations_required": result.confirmations_required.len(),
                "cancelled": result.cancelled,
            }));
        self.save(&entry).await;
    }

    /// Log a non-fatal error.
    pub async fn log_error(&self, message: &str, context: Option<&str>) {
        let result = AuditResult::failed("VAULT_ERROR", message);
        let mut entry = self.entry(AuditAction::Error, result);
        if let Some(ctx) = context {
            entry = entry.with_details(json!({
                "context": ctx,
                "timestamp": Utc::now().to_rfc3339(),
            }));
        }
        self.save(&entry).await;
    }
}
