//! Offline adapters for read-only commands
//!
//! `status` only needs the manifest. These adapters serve it from a JSON
//! export of remote records and refuse every mutating call.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tracing::debug;
use vaultsync_core::{
    domain::{ContentHash, FileId, Identity, MachineId, PendingMetadata, RemoteRecord, UserId},
    ports::{CheckinFields, IBlobStore, IMetadataService, NewRecord},
};

/// Metadata service backed by a manifest file, or by nothing at all
#[derive(Debug, Clone, Default)]
pub struct ManifestFile {
    path: Option<PathBuf>,
}

impl ManifestFile {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    /// Parses a JSON array of remote records
    pub fn read(path: &Path) -> Result<Vec<RemoteRecord>> {
        let data = std::fs::read(path)
            .with_context(|| format!("Failed to read manifest {}", path.display()))?;
        let records: Vec<RemoteRecord> = serde_json::from_slice(&data)
            .with_context(|| format!("Failed to parse manifest {}", path.display()))?;
        debug!(records = records.len(), manifest = %path.display(), "Manifest loaded");
        Ok(records)
    }
}

fn offline<T>(operation: &str) -> Result<T> {
    bail!("{operation} needs the metadata service; this command runs offline")
}

#[async_trait]
impl IMetadataService for ManifestFile {
    async fn fetch_manifest(&self) -> Result<Vec<RemoteRecord>> {
        match &self.path {
            Some(path) => Self::read(path),
            None => Ok(Vec::new()),
        }
    }

    async fn checkout(&self, _file_id: &FileId, _holder: &Identity) -> Result<RemoteRecord> {
        offline("checkout")
    }

    async fn checkin(
        &self,
        _file_id: &FileId,
        _user: &UserId,
        _fields: &CheckinFields,
    ) -> Result<RemoteRecord> {
        offline("checkin")
    }

    async fn discard(&self, _file_id: &FileId, _user: &UserId) -> Result<RemoteRecord> {
        offline("discard")
    }

    async fn force_release(&self, _file_id: &FileId, _acting: &UserId) -> Result<RemoteRecord> {
        offline("force release")
    }

    async fn soft_delete(&self, _file_id: &FileId, _user: &UserId) -> Result<()> {
        offline("delete")
    }

    async fn create_record(&self, _record: &NewRecord, _user: &UserId) -> Result<RemoteRecord> {
        offline("first sync")
    }

    async fn is_online(&self, _user: &UserId, _machine: &MachineId) -> Result<bool> {
        Ok(false)
    }

    async fn update_metadata(
        &self,
        _file_id: &FileId,
        _user: &UserId,
        _fields: &PendingMetadata,
    ) -> Result<RemoteRecord> {
        offline("metadata update")
    }
}

/// Blob store that has no blobs
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBlobStore;

#[async_trait]
impl IBlobStore for NoBlobStore {
    async fn get(&self, hash: &ContentHash) -> Result<Vec<u8>> {
        bail!("blob {} is not available offline", hash.short())
    }

    async fn put(&self, _data: &[u8]) -> Result<ContentHash> {
        offline("upload")
    }
}
