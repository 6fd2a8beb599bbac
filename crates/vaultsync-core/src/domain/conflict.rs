//! Placement conflict types
//!
//! A placement is a proposed (source, destination) pair produced by an add,
//! copy or move. Placements whose destination already exists collide and are
//! resolved with a single [`Resolution`] applied to the whole batch.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::VaultPath;

/// A proposed move/copy of one file
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Placement {
    pub source: VaultPath,
    pub destination: VaultPath,
}

impl Placement {
    pub fn new(source: VaultPath, destination: VaultPath) -> Self {
        Self {
            source,
            destination,
        }
    }
}

/// Batch-wide policy for colliding destinations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Keep destinations as-is, replacing the existing files
    Overwrite,
    /// Pick the lowest free `name (n).ext`
    #[default]
    Rename,
    /// Drop colliding placements
    Skip,
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Overwrite => write!(f, "overwrite"),
            Resolution::Rename => write!(f, "rename"),
            Resolution::Skip => write!(f, "skip"),
        }
    }
}

impl FromStr for Resolution {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "overwrite" => Ok(Resolution::Overwrite),
            "rename" => Ok(Resolution::Rename),
            "skip" => Ok(Resolution::Skip),
            other => Err(DomainError::UnknownLiteral {
                kind: "resolution",
                value: other.to_string(),
            }),
        }
    }
}

/// Placements partitioned by whether their destination already exists
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictSet {
    pub conflicts: Vec<Placement>,
    pub non_conflicts: Vec<Placement>,
}

impl ConflictSet {
    /// Returns true if nothing collides
    pub fn is_clear(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// Total number of placements
    pub fn len(&self) -> usize {
        self.conflicts.len() + self.non_conflicts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
