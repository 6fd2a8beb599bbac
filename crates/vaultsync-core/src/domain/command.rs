//! Command and result value types
//!
//! A [`Command`] names an operation and its targets; executing it always
//! yields a [`CommandResult`], never an error, once the command passed its
//! whole-batch preconditions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::conflict::Resolution;
use super::errors::DomainError;
use super::newtypes::{MachineId, VaultPath};

// ============================================================================
// CommandKind
// ============================================================================

/// Batch operations on vault files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommandKind {
    Download,
    GetLatest,
    Checkout,
    Checkin,
    Discard,
    ForceRelease,
    /// First check-in of a local-only file
    Sync,
    Move,
    Copy,
    DeleteLocal,
    DeleteServer,
    DeleteBoth,
}

impl CommandKind {
    pub const ALL: [CommandKind; 12] = [
        CommandKind::Download,
        CommandKind::GetLatest,
        CommandKind::Checkout,
        CommandKind::Checkin,
        CommandKind::Discard,
        CommandKind::ForceRelease,
        CommandKind::Sync,
        CommandKind::Move,
        CommandKind::Copy,
        CommandKind::DeleteLocal,
        CommandKind::DeleteServer,
        CommandKind::DeleteBoth,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::Download => "download",
            CommandKind::GetLatest => "get-latest",
            CommandKind::Checkout => "checkout",
            CommandKind::Checkin => "checkin",
            CommandKind::Discard => "discard",
            CommandKind::ForceRelease => "force-release",
            CommandKind::Sync => "sync",
            CommandKind::Move => "move",
            CommandKind::Copy => "copy",
            CommandKind::DeleteLocal => "delete-local",
            CommandKind::DeleteServer => "delete-server",
            CommandKind::DeleteBoth => "delete-both",
        }
    }

    /// Commands that place files at a new destination
    pub fn needs_target_folder(&self) -> bool {
        matches!(self, CommandKind::Move | CommandKind::Copy)
    }

    /// Commands whose progress is measured in bytes
    pub fn is_byte_based(&self) -> bool {
        matches!(self, CommandKind::Download | CommandKind::GetLatest)
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CommandKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| DomainError::UnknownLiteral {
                kind: "command",
                value: s.to_string(),
            })
    }
}

// ============================================================================
// Command
// ============================================================================

/// Options that modify how a command runs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOptions {
    /// Destination folder for move/copy
    pub target_folder: Option<VaultPath>,
    /// For `delete-server`: also trash the local copy
    pub delete_local: bool,
    /// Proceed with checkins held by this user on another, reachable machine
    pub confirm_force_checkin: bool,
    /// Collision policy for move/copy (configured default when unset)
    pub resolution: Option<Resolution>,
    /// Checkin comment forwarded to the metadata service
    pub comment: Option<String>,
}

/// A command over a set of files and folders
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub kind: CommandKind,
    pub targets: Vec<VaultPath>,
    pub options: CommandOptions,
}

impl Command {
    pub fn new(kind: CommandKind, targets: Vec<VaultPath>) -> Self {
        Self {
            kind,
            targets,
            options: CommandOptions::default(),
        }
    }

    #[must_use]
    pub fn with_target_folder(mut self, folder: VaultPath) -> Self {
        self.options.target_folder = Some(folder);
        self
    }

    #[must_use]
    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.options.resolution = Some(resolution);
        self
    }

    #[must_use]
    pub fn with_force_checkin_confirmed(mut self) -> Self {
        self.options.confirm_force_checkin = true;
        self
    }

    #[must_use]
    pub fn with_delete_local(mut self) -> Self {
        self.options.delete_local = true;
        self
    }

    #[must_use]
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.options.comment = Some(comment.into());
        self
    }
}

// ============================================================================
// CommandResult
// ============================================================================

/// Category of a per-file failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Rejected before any I/O
    Precondition,
    /// Local filesystem or blob transfer failure
    Io,
    /// Metadata service rejected or failed the call
    Remote,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Precondition => write!(f, "precondition"),
            ErrorKind::Io => write!(f, "io"),
            ErrorKind::Remote => write!(f, "remote"),
        }
    }
}

/// A failure of one unit of work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileError {
    pub path: VaultPath,
    pub kind: ErrorKind,
    pub message: String,
}

impl FileError {
    pub fn new(path: VaultPath, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            path,
            kind,
            message: message.into(),
        }
    }
}

/// A checkin refused because the holding machine is unreachable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockedFile {
    pub path: VaultPath,
    pub machine_id: Option<MachineId>,
    pub machine_name: Option<String>,
}

/// A checkin that needs the user to confirm overriding another machine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationRequest {
    pub path: VaultPath,
    pub machine_id: Option<MachineId>,
    pub machine_name: Option<String>,
}

/// Outcome of a command
///
/// Blocked files and pending confirmations are reported separately and never
/// counted as failed, since they need a user decision rather than a retry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub per_file_errors: Vec<FileError>,
    pub blocked: Vec<BlockedFile>,
    pub confirmations_required: Vec<ConfirmationRequest>,
    pub cancelled: bool,
}

impl CommandResult {
    /// A result for a command cancelled before dispatch
    pub fn cancelled(skipped: usize) -> Self {
        Self {
            skipped,
            cancelled: true,
            ..Self::default()
        }
    }

    /// Records a per-file failure
    pub fn record_failure(&mut self, error: FileError) {
        self.failed += 1;
        self.per_file_errors.push(error);
    }

    /// Returns true if every attempted unit succeeded and nothing awaits a decision
    pub fn is_clean(&self) -> bool {
        self.failed == 0
            && self.blocked.is_empty()
            && self.confirmations_required.is_empty()
            && !self.cancelled
    }

    /// Number of files accounted for
    pub fn total(&self) -> usize {
        self.succeeded
            + self.failed
            + self.skipped
            + self.blocked.len()
            + self.confirmations_required.len()
    }
}

impl fmt::Display for CommandResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} succeeded, {} failed, {} skipped",
            self.succeeded, self.failed, self.skipped
        )?;
        if !self.blocked.is_empty() {
            write!(f, ", {} blocked", self.blocked.len())?;
        }
        if !self.confirmations_required.is_empty() {
            write!(
                f,
                ", {} awaiting confirmation",
                self.confirmations_required.len()
            )?;
        }
        if self.cancelled {
            write!(f, " (cancelled)")?;
        }
        Ok(())
    }
}
