//! Metadata service port (driven/secondary port)
//!
//! This module defines the narrow interface the engine needs from the remote
//! vault metadata service: manifest listing, checkout transitions, first
//! check-in and metadata edits.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because errors at port boundaries are adapter-specific
//!   and don't need domain-level classification.
//! - The service is the authority for checkout exclusivity. A rejected
//!   checkout or checkin is final for the current command; callers never retry.
//! - Content bytes never travel through this port; see [`super::IBlobStore`].

use serde::{Deserialize, Serialize};

use crate::domain::{
    ContentHash, FileId, Identity, MachineId, PendingMetadata, RemoteRecord, UserId, VaultPath,
};

// ============================================================================
// Request DTOs
// ============================================================================

/// Fields sent with a checkin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckinFields {
    /// Hash of the content being checked in (already uploaded)
    pub content_hash: ContentHash,
    pub size: u64,
    /// Current local path; differs from the record's path after a move
    pub path: VaultPath,
    /// Staged edits to editable fields
    pub metadata: PendingMetadata,
    pub comment: Option<String>,
    /// The holder's checkout on another machine is being overridden
    pub force: bool,
}

/// Fields for the first check-in of a local-only file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRecord {
    pub path: VaultPath,
    pub content_hash: ContentHash,
    pub size: u64,
}

// ============================================================================
// IMetadataService trait
// ============================================================================

/// Port trait for the remote vault metadata service
#[async_trait::async_trait]
pub trait IMetadataService: Send + Sync {
    /// Lists every record of the vault, including soft-deleted tombstones
    async fn fetch_manifest(&self) -> anyhow::Result<Vec<RemoteRecord>>;

    /// Takes the exclusive checkout for `holder` on its machine
    ///
    /// # Errors
    /// Fails if the record is already checked out by anyone
    async fn checkout(&self, file_id: &FileId, holder: &Identity) -> anyhow::Result<RemoteRecord>;

    /// Pushes a new version and releases the checkout
    ///
    /// # Errors
    /// Fails if `user` does not hold the checkout
    async fn checkin(
        &self,
        file_id: &FileId,
        user: &UserId,
        fields: &CheckinFields,
    ) -> anyhow::Result<RemoteRecord>;

    /// Releases the checkout without pushing a new version
    async fn discard(&self, file_id: &FileId, user: &UserId) -> anyhow::Result<RemoteRecord>;

    /// Releases someone else's checkout (privileged)
    async fn force_release(&self, file_id: &FileId, acting: &UserId)
        -> anyhow::Result<RemoteRecord>;

    /// Marks the record deleted, leaving a tombstone in the manifest
    async fn soft_delete(&self, file_id: &FileId, user: &UserId) -> anyhow::Result<()>;

    /// Creates the first remote record of a local-only file
    async fn create_record(&self, record: &NewRecord, user: &UserId)
        -> anyhow::Result<RemoteRecord>;

    /// Whether `machine` of `user` is currently reachable
    async fn is_online(&self, user: &UserId, machine: &MachineId) -> anyhow::Result<bool>;

    /// Pushes editable field changes without a new version
    async fn update_metadata(
        &self,
        file_id: &FileId,
        user: &UserId,
        fields: &PendingMetadata,
    ) -> anyhow::Result<RemoteRecord>;
}
