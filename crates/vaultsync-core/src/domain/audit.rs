//! Audit entry domain entities
//!
//! Checkout transitions and privileged overrides are recorded so an
//! administrator can later explain who changed what, from which machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::newtypes::{FileId, MachineId, UserId, VaultPath};

/// Actions that can be recorded in the audit log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Checkout,
    Checkin,
    /// Checkin that overrode a checkout held on another machine
    ForceCheckin,
    Discard,
    /// Privileged release of another user's checkout
    ForceRelease,
    /// First check-in of a local-only file
    FirstSync,
    Download,
    Move,
    Copy,
    DeleteLocal,
    DeleteServer,
    /// A batch command finished
    CommandComplete,
    Error,
}

impl AuditAction {
    /// Returns true for actions that override someone else's lock
    pub fn is_privileged(&self) -> bool {
        matches!(self, AuditAction::ForceRelease | AuditAction::ForceCheckin)
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AuditAction::Checkout => "checkout",
            AuditAction::Checkin => "checkin",
            AuditAction::ForceCheckin => "force_checkin",
            AuditAction::Discard => "discard",
            AuditAction::ForceRelease => "force_release",
            AuditAction::FirstSync => "first_sync",
            AuditAction::Download => "download",
            AuditAction::Move => "move",
            AuditAction::Copy => "copy",
            AuditAction::DeleteLocal => "delete_local",
            AuditAction::DeleteServer => "delete_server",
            AuditAction::CommandComplete => "command_complete",
            AuditAction::Error => "error",
        };
        write!(f, "{}", s)
    }
}

/// Result of an audited action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditResult {
    Success,
    Failed {
        /// Reason code for categorization
        code: String,
        message: String,
    },
}

impl AuditResult {
    pub fn success() -> Self {
        AuditResult::Success
    }

    pub fn failed(code: impl Into<String>, message: impl Into<String>) -> Self {
        AuditResult::Failed {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AuditResult::Success)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, AuditResult::Failed { .. })
    }
}

/// An audit log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    timestamp: DateTime<Utc>,
    actor: Option<UserId>,
    machine: Option<MachineId>,
    path: Option<VaultPath>,
    file_id: Option<FileId>,
    action: AuditAction,
    result: AuditResult,
    details: Value,
    duration_ms: Option<u64>,
}

impl AuditEntry {
    /// Creates a new audit entry stamped with the current time
    ///
    /// # Example
    ///
    /// ```
    /// use vaultsync_core::domain::audit::{AuditAction, AuditEntry, AuditResult};
    ///
    /// let entry = AuditEntry::new(AuditAction::Checkout, AuditResult::success());
    /// assert!(entry.result().is_success());
    /// assert!(entry.path().is_none());
    /// ```
    pub fn new(action: AuditAction, result: AuditResult) -> Self {
        Self {
            timestamp: Utc::now(),
            actor: None,
            machine: None,
            path: None,
            file_id: None,
            action,
            result,
            details: Value::Null,
            duration_ms: None,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn actor(&self) -> Option<&UserId> {
        self.actor.as_ref()
    }

    pub fn machine(&self) -> Option<&MachineId> {
        self.machine.as_ref()
    }

    pub fn path(&self) -> Option<&VaultPath> {
        self.path.as_ref()
    }

    pub fn file_id(&self) -> Option<&FileId> {
        self.file_id.as_ref()
    }

    pub fn action(&self) -> AuditAction {
        self.action
    }

    pub fn result(&self) -> &AuditResult {
        &self.result
    }

    pub fn details(&self) -> &Value {
        &self.details
    }

    pub fn duration_ms(&self) -> Option<u64> {
        self.duration_ms
    }

    /// Sets who acted, and from which machine
    #[must_use]
    pub fn with_actor(mut self, actor: UserId, machine: MachineId) -> Self {
        self.actor = Some(actor);
        self.machine = Some(machine);
        self
    }

    #[must_use]
    pub fn with_path(mut self, path: VaultPath) -> Self {
        self.path = Some(path);
        self
    }

    #[must_use]
    pub fn with_file_id(mut self, file_id: FileId) -> Self {
        self.file_id = Some(file_id);
        self
    }

    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    #[must_use]
    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    /// Overrides the timestamp (used by stores that reload entries)
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}
