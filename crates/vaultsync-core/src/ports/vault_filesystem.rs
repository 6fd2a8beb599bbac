//! Vault filesystem port (driven/secondary port)
//!
//! This module defines the interface for the host filesystem holding the
//! working tree. All paths are vault-relative; the adapter owns the mapping
//! to real locations.
//!
//! ## Design Notes
//!
//! - Every call is fallible and awaited on its own. Callers never assume
//!   atomicity across calls.
//! - `delete_item` moves into a trash folder, it never deletes permanently.
//! - `write_file` and `copy_file` create missing parent folders.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ContentHash, VaultPath};

/// One entry returned by a recursive directory listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    pub path: VaultPath,
    pub is_directory: bool,
    /// Size in bytes (0 for directories)
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
}

impl DirEntry {
    /// Creates a file entry
    pub fn file(path: VaultPath, size: u64) -> Self {
        Self {
            path,
            is_directory: false,
            size,
            modified: None,
        }
    }

    /// Creates a directory entry
    pub fn directory(path: VaultPath) -> Self {
        Self {
            path,
            is_directory: true,
            size: 0,
            modified: None,
        }
    }
}

/// Port trait for working tree operations
#[async_trait::async_trait]
pub trait IVaultFileSystem: Send + Sync {
    /// Creates a folder and any missing parents
    async fn create_folder(&self, path: &VaultPath) -> anyhow::Result<()>;

    /// Copies a file, replacing the destination if it exists
    async fn copy_file(&self, from: &VaultPath, to: &VaultPath) -> anyhow::Result<()>;

    /// Moves a file or folder, replacing the destination if it exists
    async fn move_file(&self, from: &VaultPath, to: &VaultPath) -> anyhow::Result<()>;

    /// Moves a file or folder into the trash
    async fn delete_item(&self, path: &VaultPath) -> anyhow::Result<()>;

    /// Writes a whole file, replacing any previous content
    async fn write_file(&self, path: &VaultPath, data: &[u8]) -> anyhow::Result<()>;

    /// Reads a whole file
    async fn read_file(&self, path: &VaultPath) -> anyhow::Result<Vec<u8>>;

    /// Whether anything exists at `path`
    async fn file_exists(&self, path: &VaultPath) -> anyhow::Result<bool>;

    /// Lists everything beneath `path` recursively (the root lists the vault)
    async fn read_directory(&self, path: &VaultPath) -> anyhow::Result<Vec<DirEntry>>;

    /// Hash of a file's current content
    async fn compute_hash(&self, path: &VaultPath) -> anyhow::Result<ContentHash>;
}
