//! FileRecord domain entity
//!
//! One record exists per path in the vault working tree. It pairs what is on
//! disk ([`LocalState`]) with what the metadata service knows
//! ([`RemoteRecord`]) and carries the derived [`DiffStatus`].
//!
//! ## Checkout state machine
//!
//! ```text
//!   Unsynced ──sync──► CheckedIn ──checkout──► CheckedOutByMe
//!                          ▲   │                     │
//!                          │   └─(other user)──► CheckedOutByOther
//!                          │                         │
//!                          ├──── checkin|discard ────┘ (by me)
//!                          └──── force release ──────┘ (admin only)
//! ```

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::diff_status::DiffStatus;
use super::errors::DomainError;
use super::newtypes::{ContentHash, FileId, MachineId, UserId, VaultPath};

// ============================================================================
// EditableField
// ============================================================================

/// Metadata fields a checkout holder may edit locally before checkin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EditableField {
    /// Part number
    PartNumber,
    /// Free-form description
    Description,
    /// Revision label
    Revision,
}

impl EditableField {
    /// Writes `value` into the matching field of a remote record
    pub fn apply_to(&self, record: &mut RemoteRecord, value: &str) {
        let slot = match self {
            EditableField::PartNumber => &mut record.part_number,
            EditableField::Description => &mut record.description,
            EditableField::Revision => &mut record.revision,
        };
        *slot = Some(value.to_string());
    }
}

impl fmt::Display for EditableField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditableField::PartNumber => write!(f, "partNumber"),
            EditableField::Description => write!(f, "description"),
            EditableField::Revision => write!(f, "revision"),
        }
    }
}

/// Staged edits, keyed by field
pub type PendingMetadata = BTreeMap<EditableField, String>;

// ============================================================================
// RemoteRecord
// ============================================================================

/// A file as the metadata service knows it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRecord {
    pub id: FileId,
    /// Path the remote knows the file under (differs locally after a move)
    pub path: VaultPath,
    /// Monotonic version number
    pub version: u64,
    pub content_hash: ContentHash,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub checked_out_by: Option<UserId>,
    #[serde(default)]
    pub checked_out_by_machine_id: Option<MachineId>,
    #[serde(default)]
    pub checked_out_by_machine_name: Option<String>,
    #[serde(default)]
    pub part_number: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub revision: Option<String>,
    #[serde(default)]
    pub workflow_state: Option<String>,
    #[serde(default)]
    pub eco_tags: Vec<String>,
    #[serde(default)]
    pub custom_properties: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub created_by: Option<UserId>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Soft-delete tombstone
    #[serde(default)]
    pub deleted: bool,
}

impl RemoteRecord {
    /// Creates a minimal, unheld, version-1 record
    pub fn new(id: FileId, path: VaultPath, content_hash: ContentHash, size: u64) -> Self {
        Self {
            id,
            path,
            version: 1,
            content_hash,
            size,
            checked_out_by: None,
            checked_out_by_machine_id: None,
            checked_out_by_machine_name: None,
            part_number: None,
            description: None,
            revision: None,
            workflow_state: None,
            eco_tags: Vec::new(),
            custom_properties: BTreeMap::new(),
            created_by: None,
            created_at: None,
            deleted: false,
        }
    }

    /// Returns true if somebody holds the checkout
    pub fn is_checked_out(&self) -> bool {
        self.checked_out_by.is_some()
    }

    /// Returns true if `user` holds the checkout
    pub fn is_held_by(&self, user: &UserId) -> bool {
        self.checked_out_by.as_ref() == Some(user)
    }

    /// Clears holder and machine fields
    pub fn clear_checkout(&mut self) {
        self.checked_out_by = None;
        self.checked_out_by_machine_id = None;
        self.checked_out_by_machine_name = None;
    }
}

// ============================================================================
// LocalState
// ============================================================================

/// What is currently on disk for a path
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalState {
    /// None for directories
    pub content_hash: Option<ContentHash>,
    pub size: u64,
    /// Version materialized on disk, may lag or lead the remote head
    pub active_version: Option<u64>,
    /// Hash of the version last materialized or checked in
    pub base_hash: Option<ContentHash>,
}

impl LocalState {
    /// Local state for a file that has never been synced
    pub fn file(content_hash: ContentHash, size: u64) -> Self {
        Self {
            content_hash: Some(content_hash),
            size,
            active_version: None,
            base_hash: None,
        }
    }

    /// Local state for a directory
    pub fn directory() -> Self {
        Self::default()
    }

    /// Marks the content as matching the given synced version
    #[must_use]
    pub fn synced_at(mut self, version: u64) -> Self {
        self.active_version = Some(version);
        self.base_hash = self.content_hash.clone();
        self
    }

    /// Returns true if the content differs from the last synced base
    ///
    /// Without a base, `fallback` (usually the remote hash) is compared.
    pub fn differs_from_base(&self, fallback: Option<&ContentHash>) -> bool {
        match (&self.base_hash, fallback) {
            (Some(base), _) => self.content_hash.as_ref() != Some(base),
            (None, Some(remote)) => self.content_hash.as_ref() != Some(remote),
            (None, None) => true,
        }
    }
}

// ============================================================================
// CheckoutState
// ============================================================================

/// Checkout state of a file relative to the acting user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CheckoutState {
    /// No live remote record
    Unsynced,
    /// Remote record with no holder
    CheckedIn,
    /// Held by the acting user (on any machine)
    CheckedOutByMe,
    /// Held by someone else
    CheckedOutByOther,
}

// ============================================================================
// FileRecord
// ============================================================================

/// One entry of the vault file table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    relative_path: VaultPath,
    is_directory: bool,
    local: Option<LocalState>,
    remote_record: Option<RemoteRecord>,
    diff_status: DiffStatus,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pending_metadata: PendingMetadata,
}

impl FileRecord {
    /// Creates a record with neither local nor remote state
    pub fn new(relative_path: VaultPath, is_directory: bool) -> Self {
        Self {
            relative_path,
            is_directory,
            local: None,
            remote_record: None,
            diff_status: DiffStatus::default(),
            pending_metadata: PendingMetadata::new(),
        }
    }

    /// Sets the local state
    #[must_use]
    pub fn with_local(mut self, local: LocalState) -> Self {
        self.local = Some(local);
        self
    }

    /// Sets the remote record
    #[must_use]
    pub fn with_remote(mut self, remote: RemoteRecord) -> Self {
        self.remote_record = Some(remote);
        self
    }

    /// Sets the diff status
    #[must_use]
    pub fn with_status(mut self, status: DiffStatus) -> Self {
        self.diff_status = status;
        self
    }

    // --- accessors ---

    pub fn path(&self) -> &VaultPath {
        &self.relative_path
    }

    pub fn is_directory(&self) -> bool {
        self.is_directory
    }

    pub fn local(&self) -> Option<&LocalState> {
        self.local.as_ref()
    }

    /// Remote record, including soft-deleted tombstones
    pub fn remote(&self) -> Option<&RemoteRecord> {
        self.remote_record.as_ref()
    }

    /// Remote record unless it is a tombstone
    pub fn live_remote(&self) -> Option<&RemoteRecord> {
        self.remote_record.as_ref().filter(|r| !r.deleted)
    }

    pub fn diff_status(&self) -> DiffStatus {
        self.diff_status
    }

    pub fn pending_metadata(&self) -> &PendingMetadata {
        &self.pending_metadata
    }

    pub fn local_present(&self) -> bool {
        self.local.is_some()
    }

    /// Current checkout holder of the live remote record
    pub fn holder(&self) -> Option<&UserId> {
        self.live_remote().and_then(|r| r.checked_out_by.as_ref())
    }

    pub fn is_held_by(&self, user: &UserId) -> bool {
        self.holder() == Some(user)
    }

    /// Returns true if the file was synced at some point and lost its remote
    pub fn was_synced(&self) -> bool {
        match &self.remote_record {
            Some(remote) => remote.deleted,
            None => self
                .local
                .as_ref()
                .is_some_and(|l| l.active_version.is_some()),
        }
    }

    /// Checkout state relative to `me`
    pub fn checkout_state(&self, me: &UserId) -> CheckoutState {
        match self.live_remote() {
            None => CheckoutState::Unsynced,
            Some(remote) => match &remote.checked_out_by {
                None => CheckoutState::CheckedIn,
                Some(holder) if holder == me => CheckoutState::CheckedOutByMe,
                Some(_) => CheckoutState::CheckedOutByOther,
            },
        }
    }

    // --- mutators ---

    pub fn set_local(&mut self, local: Option<LocalState>) {
        self.local = local;
    }

    pub fn local_mut(&mut self) -> Option<&mut LocalState> {
        self.local.as_mut()
    }

    /// Replaces the remote record
    ///
    /// Staged metadata only survives while the new holder matches the old one.
    pub fn set_remote(&mut self, remote: Option<RemoteRecord>) {
        let old_holder = self.holder().cloned();
        self.remote_record = remote;
        if self.holder() != old_holder.as_ref() || self.holder().is_none() {
            self.pending_metadata.clear();
        }
    }

    pub fn set_diff_status(&mut self, status: DiffStatus) {
        self.diff_status = status;
    }

    /// Moves the record to a new path; the remote record is kept untouched
    pub fn relocate(&mut self, new_path: VaultPath) {
        self.relative_path = new_path;
    }

    /// Stages an edit to an editable metadata field
    ///
    /// # Errors
    /// Fails unless `actor` currently holds the checkout.
    pub fn stage_metadata(
        &mut self,
        actor: &UserId,
        field: EditableField,
        value: impl Into<String>,
    ) -> Result<(), DomainError> {
        if !self.is_held_by(actor) {
            return Err(DomainError::ValidationFailed(format!(
                "{} is not checked out by {actor}",
                self.relative_path
            )));
        }
        self.pending_metadata.insert(field, value.into());
        Ok(())
    }

    /// Drops all staged edits, returning them
    pub fn take_pending_metadata(&mut self) -> PendingMetadata {
        std::mem::take(&mut self.pending_metadata)
    }
}
