//! Diff status of a single file
//!
//! The serialized literals are a stable contract for whatever renders the
//! working tree, so they must not change.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// Classification of a file's local-vs-remote relationship
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DiffStatus {
    /// Local only, never synced
    Added,
    /// Local content differs from the remote head
    Modified,
    /// Path changed, content unchanged
    Moved,
    /// Absent locally while still checked out by the acting user
    Deleted,
    /// Remote record removed, local copy orphaned
    DeletedRemote,
    /// Remote head is newer than the local copy
    Outdated,
    /// Remote only
    Cloud,
    /// Remote only, recently added by someone else
    CloudNew,
    /// Matches a vault ignore pattern
    Ignored,
    /// Fully synced
    #[default]
    #[serde(rename = "none")]
    Synced,
}

impl DiffStatus {
    /// Every status, in declaration order
    pub const ALL: [DiffStatus; 10] = [
        DiffStatus::Added,
        DiffStatus::Modified,
        DiffStatus::Moved,
        DiffStatus::Deleted,
        DiffStatus::DeletedRemote,
        DiffStatus::Outdated,
        DiffStatus::Cloud,
        DiffStatus::CloudNew,
        DiffStatus::Ignored,
        DiffStatus::Synced,
    ];

    /// The serialized literal
    pub fn as_str(&self) -> &'static str {
        match self {
            DiffStatus::Added => "added",
            DiffStatus::Modified => "modified",
            DiffStatus::Moved => "moved",
            DiffStatus::Deleted => "deleted",
            DiffStatus::DeletedRemote => "deletedRemote",
            DiffStatus::Outdated => "outdated",
            DiffStatus::Cloud => "cloud",
            DiffStatus::CloudNew => "cloudNew",
            DiffStatus::Ignored => "ignored",
            DiffStatus::Synced => "none",
        }
    }

    /// Returns true for statuses that only exist on the remote side
    pub fn is_remote_only(&self) -> bool {
        matches!(self, DiffStatus::Cloud | DiffStatus::CloudNew)
    }

    /// Returns true if nothing needs to happen for this file
    pub fn is_settled(&self) -> bool {
        matches!(self, DiffStatus::Synced | DiffStatus::Ignored)
    }
}

impl fmt::Display for DiffStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiffStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DiffStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| DomainError::UnknownLiteral {
                kind: "diff status",
                value: s.to_string(),
            })
    }
}
