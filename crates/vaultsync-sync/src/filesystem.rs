//! Local filesystem adapter (secondary/driven adapter)
//!
//! Implements [`IVaultFileSystem`] on top of `tokio::fs`, rooted at the vault
//! folder.
//!
//! ## Design Decisions
//!
//! - **Atomic writes**: write-to-temp + rename in the same folder, so a crash
//!   never leaves a half-written file behind.
//! - **Trash**: `delete_item` moves the item under the trash folder in a
//!   timestamped bucket; nothing is removed permanently.
//! - **Content hash**: SHA-256 of the file bytes, lowercase hex. The same
//!   function addresses blobs in the content store.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};
use vaultsync_core::{
    domain::{ContentHash, VaultPath},
    ports::{DirEntry, IVaultFileSystem},
};

/// Suffix of in-progress atomic writes; never listed
const TEMP_SUFFIX: &str = ".vaultsync-tmp";

/// SHA-256 content hash of a byte slice
pub fn content_hash_of(data: &[u8]) -> ContentHash {
    ContentHash::from_digest(&Sha256::digest(data))
}

// ============================================================================
// LocalVaultFileSystem
// ============================================================================

/// Adapter bridging the [`IVaultFileSystem`] port to a real folder
#[derive(Debug, Clone)]
pub struct LocalVaultFileSystem {
    root: PathBuf,
    trash_dir: VaultPath,
}

impl LocalVaultFileSystem {
    /// Creates an adapter for the vault at `root`
    ///
    /// `trash_dir` is vault-relative and is skipped by directory listings.
    pub fn new(root: impl Into<PathBuf>, trash_dir: VaultPath) -> Self {
        Self {
            root: root.into(),
            trash_dir,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a vault path to its location on disk
    fn resolve(&self, path: &VaultPath) -> PathBuf {
        if path.is_root() {
            return self.root.clone();
        }
        path.as_str()
            .split('/')
            .fold(self.root.clone(), |acc, part| acc.join(part))
    }

    async fn ensure_parent(target: &Path) -> std::io::Result<()> {
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    fn temp_path(target: &Path) -> PathBuf {
        let mut p = target.as_os_str().to_owned();
        p.push(TEMP_SUFFIX);
        PathBuf::from(p)
    }

    fn modified_of(metadata: &std::fs::Metadata) -> Option<DateTime<Utc>> {
        metadata.modified().ok().map(DateTime::<Utc>::from)
    }
}

#[async_trait::async_trait]
impl IVaultFileSystem for LocalVaultFileSystem {
    #[instrument(skip(self), fields(path = %path))]
    async fn create_folder(&self, path: &VaultPath) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(self.resolve(path)).await?;
        debug!("folder created");
        Ok(())
    }

    #[instrument(skip(self), fields(from = %from, to = %to))]
    async fn copy_file(&self, from: &VaultPath, to: &VaultPath) -> anyhow::Result<()> {
        let target = self.resolve(to);
        Self::ensure_parent(&target).await?;

        let tmp_path = Self::temp_path(&target);
        let bytes = tokio::fs::copy(self.resolve(from), &tmp_path).await?;
        tokio::fs::rename(&tmp_path, &target).await?;

        debug!(bytes, "copy complete");
        Ok(())
    }

    #[instrument(skip(self), fields(from = %from, to = %to))]
    async fn move_file(&self, from: &VaultPath, to: &VaultPath) -> anyhow::Result<()> {
        let target = self.resolve(to);
        Self::ensure_parent(&target).await?;
        tokio::fs::rename(self.resolve(from), &target).await?;
        debug!("move complete");
        Ok(())
    }

    #[instrument(skip(self), fields(path = %path))]
    async fn delete_item(&self, path: &VaultPath) -> anyhow::Result<()> {
        let bucket = Utc::now().format("%Y%m%dT%H%M%S%.3f").to_string();
        let trashed = self.trash_dir.join_relative(&bucket)?.join_relative(path.as_str())?;
        let target = self.resolve(&trashed);

        Self::ensure_parent(&target).await?;
        tokio::fs::rename(self.resolve(path), &target).await?;

        debug!(trash = %trashed, "moved to trash");
        Ok(())
    }

    #[instrument(skip(self, data), fields(path = %path, bytes = data.len()))]
    async fn write_file(&self, path: &VaultPath, data: &[u8]) -> anyhow::Result<()> {
        let target = self.resolve(path);
        Self::ensure_parent(&target).await?;

        let tmp_path = Self::temp_path(&target);
        debug!(?tmp_path, "writing to temporary file");
        tokio::fs::write(&tmp_path, data).await?;
        tokio::fs::rename(&tmp_path, &target).await?;

        debug!("write complete");
        Ok(())
    }

    #[instrument(skip(self), fields(path = %path))]
    async fn read_file(&self, path: &VaultPath) -> anyhow::Result<Vec<u8>> {
        let data = tokio::fs::read(self.resolve(path)).await?;
        debug!(bytes = data.len(), "file read complete");
        Ok(data)
    }

    #[instrument(skip(self), fields(path = %path))]
    async fn file_exists(&self, path: &VaultPath) -> anyhow::Result<bool> {
        match tokio::fs::metadata(self.resolve(path)).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self), fields(path = %path))]
    async fn read_directory(&self, path: &VaultPath) -> anyhow::Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        let mut pending = vec![path.clone()];

        while let Some(folder) = pending.pop() {
            let mut dir = tokio::fs::read_dir(self.resolve(&folder)).await?;
            while let Some(item) = dir.next_entry().await? {
                let name = item.file_name().to_string_lossy().into_owned();
                if name.ends_with(TEMP_SUFFIX) {
                    continue;
                }
                let child = folder.join(&name)?;
                if child == self.trash_dir {
                    continue;
                }

                let metadata = item.metadata().await?;
                if metadata.is_dir() {
                    entries.push(DirEntry {
                        modified: Self::modified_of(&metadata),
                        ..DirEntry::directory(child.clone())
                    });
                    pending.push(child);
                } else {
                    entries.push(DirEntry {
                        modified: Self::modified_of(&metadata),
                        ..DirEntry::file(child, metadata.len())
                    });
                }
            }
        }

        entries.sort_by(|a, b| a.path.cmp(&b.path));
        debug!(entries = entries.len(), "directory listed");
        Ok(entries)
    }

    #[instrument(skip(self), fields(path = %path))]
    async fn compute_hash(&self, path: &VaultPath) -> anyhow::Result<ContentHash> {
        let data = tokio::fs::read(self.resolve(path)).await?;
        let hash = content_hash_of(&data);
        debug!(hash = %hash.short(), "hash computed");
        Ok(hash)
    }
}

// ============================================================================
// Unit tests
// ============================================================================
