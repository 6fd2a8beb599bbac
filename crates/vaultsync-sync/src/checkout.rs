//! Checkout coordinator
//!
//! Owns the checkout state transitions of a file and decides whether a local
//! operation on it is currently permitted:
//!
//! ```text
//! Unsynced --sync--> CheckedIn --checkout--> CheckedOutByMe | CheckedOutByOther
//! CheckedOutByMe --checkin | discard--> CheckedIn
//! CheckedOutByOther --force release (admin)--> CheckedIn
//! ```
//!
//! The metadata service is the authority on exclusivity. A rejected call is
//! reported as-is and never retried.
//!
//! ## Cross-machine checkin
//!
//! When the acting user holds the checkout from another machine, that
//! machine's reachability decides:
//! - reachable: the checkin needs explicit confirmation (the other machine's
//!   unsaved state is considered lost)
//! - unreachable: the checkin is blocked outright, since nothing shows that
//!   the other machine has no unsynced work

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};
use vaultsync_audit::{AuditLogger, ReasonCode};
use vaultsync_core::{
    domain::{AuditAction, FileRecord, Identity, MachineId, RemoteRecord, UserId, VaultPath},
    ports::{CheckinFields, IMetadataService},
};

/// Errors from checkout transitions
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("{path} is already checked out by {holder}")]
    AlreadyCheckedOut { path: VaultPath, holder: UserId },

    #[error("{path} is not checked out by the acting user")]
    NotHolder {
        path: VaultPath,
        holder: Option<UserId>,
    },

    #[error("Force release of {path} requires the admin role")]
    NotPrivileged { path: VaultPath },

    #[error("{path} is not checked out")]
    NotCheckedOut { path: VaultPath },

    #[error("{path} has no remote record")]
    NoRemoteRecord { path: VaultPath },

    #[error("Metadata service error: {0:#}")]
    Remote(#[from] anyhow::Error),
}

impl CheckoutError {
    /// Returns true for refusals decided before any remote call
    pub fn is_precondition(&self) -> bool {
        !matches!(self, CheckoutError::Remote(_))
    }

    fn reason(&self) -> ReasonCode {
        match self {
            CheckoutError::AlreadyCheckedOut { .. } => ReasonCode::AlreadyCheckedOut,
            CheckoutError::NotHolder { .. } => ReasonCode::NotHolder,
            CheckoutError::NotPrivileged { .. } => ReasonCode::NotPrivileged,
            CheckoutError::NotCheckedOut { .. } | CheckoutError::NoRemoteRecord { .. } => {
                ReasonCode::NotCheckedOut
            }
            CheckoutError::Remote(_) => ReasonCode::RemoteRejected,
        }
    }
}

/// Verdict of cross-machine arbitration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckinGate {
    /// Held on this machine, or not held at all
    Proceed,
    /// Held on another machine that is online
    ConfirmationRequired {
        machine_id: Option<MachineId>,
        machine_name: Option<String>,
    },
    /// Held on another machine that is offline
    Blocked {
        machine_id: Option<MachineId>,
        machine_name: Option<String>,
    },
}

/// Result of a checkin attempt
#[derive(Debug, Clone, PartialEq)]
pub enum CheckinOutcome {
    Completed(RemoteRecord),
    ConfirmationRequired {
        machine_id: Option<MachineId>,
        machine_name: Option<String>,
    },
    Blocked {
        machine_id: Option<MachineId>,
        machine_name: Option<String>,
    },
}

/// Coordinates checkout transitions for one identity
pub struct CheckoutCoordinator {
    metadata: Arc<dyn IMetadataService>,
    identity: Identity,
    audit: Arc<AuditLogger>,
}

impl CheckoutCoordinator {
    pub fn new(metadata: Arc<dyn IMetadataService>, identity: Identity, audit: Arc<AuditLogger>) -> Self {
        Self {
            metadata,
            identity,
            audit,
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    fn me(&self) -> &UserId {
        self.identity.user_id()
    }

    fn live_remote<'a>(record: &'a FileRecord) -> Result<&'a RemoteRecord, CheckoutError> {
        record.live_remote().ok_or_else(|| CheckoutError::NoRemoteRecord {
            path: record.path().clone(),
        })
    }

    async fn deny(&self, action: AuditAction, path: &VaultPath, error: CheckoutError) -> CheckoutError {
        warn!(path = %path, action = %action, error = %error, "Checkout transition refused");
        self.audit
            .log_denied(action, path, error.reason(), &error.to_string())
            .await;
        error
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    /// Takes the exclusive checkout
    pub async fn checkout(&self, record: &FileRecord) -> Result<RemoteRecord, CheckoutError> {
        let path = record.path();
        let remote = Self::live_remote(record)?;

        if let Some(holder) = &remote.checked_out_by {
            let err = CheckoutError::AlreadyCheckedOut {
                path: path.clone(),
                holder: holder.clone(),
            };
            return Err(self.deny(AuditAction::Checkout, path, err).await);
        }

        let updated = match self.metadata.checkout(&remote.id, &self.identity).await {
            Ok(updated) => updated,
            Err(e) => {
                let err = CheckoutError::Remote(e);
                return Err(self.deny(AuditAction::Checkout, path, err).await);
            }
        };

        // Someone else won the race on the server
        if !updated.is_held_by(self.me()) {
            let err = CheckoutError::AlreadyCheckedOut {
                path: path.clone(),
                holder: updated
                    .checked_out_by
                    .clone()
                    .unwrap_or_else(|| self.me().clone()),
            };
            return Err(self.deny(AuditAction::Checkout, path, err).await);
        }

        info!(path = %path, user = %self.me(), machine = %self.identity.machine_id(), "Checked out");
        self.audit.log_checkout(path, &updated.id).await;
        Ok(updated)
    }

    /// Decides whether a checkin may run from this machine
    ///
    /// Fails with `NotHolder` when another user holds the checkout.
    pub async fn arbitrate(&self, record: &FileRecord) -> Result<CheckinGate, CheckoutError> {
        let remote = Self::live_remote(record)?;

        let Some(holder) = &remote.checked_out_by else {
            return Ok(CheckinGate::Proceed);
        };
        if holder != self.me() {
            let err = CheckoutError::NotHolder {
                path: record.path().clone(),
                holder: Some(holder.clone()),
            };
            return Err(self.deny(AuditAction::Checkin, record.path(), err).await);
        }

        let machine_id = remote.checked_out_by_machine_id.clone();
        let machine_name = remote.checked_out_by_machine_name.clone();
        let other = match &machine_id {
            Some(m) if m != self.identity.machine_id() => m,
            _ => return Ok(CheckinGate::Proceed),
        };

        let online = self.metadata.is_online(self.me(), other).await?;
        debug!(path = %record.path(), machine = %other, online, "Cross-machine checkin");

        Ok(if online {
            CheckinGate::ConfirmationRequired {
                machine_id,
                machine_name,
            }
        } else {
            CheckinGate::Blocked {
                machine_id,
                machine_name,
            }
        })
    }

    /// Arbitrates, then pushes the checkin
    ///
    /// `confirmed` is the user's answer to a cross-machine confirmation.
    pub async fn checkin(
        &self,
        record: &FileRecord,
        fields: CheckinFields,
        confirmed: bool,
    ) -> Result<CheckinOutcome, CheckoutError> {
        let gate = self.arbitrate(record).await?;
        self.checkin_with_gate(record, fields, gate, confirmed).await
    }

    /// Pushes a checkin whose arbitration already ran
    pub async fn checkin_with_gate(
        &self,
        record: &FileRecord,
        mut fields: CheckinFields,
        gate: CheckinGate,
        confirmed: bool,
    ) -> Result<CheckinOutcome, CheckoutError> {
        let path = record.path();
        let remote = Self::live_remote(record)?;

        let overridden = match gate {
            CheckinGate::Proceed => None,
            CheckinGate::Blocked {
                machine_id,
                machine_name,
            } => {
                let name = machine_name.as_deref().unwrap_or("another machine");
                self.audit
                    .log_denied(
                        AuditAction::Checkin,
                        path,
                        ReasonCode::MachineOffline,
                        &format!("checked out on {name}, which is offline"),
                    )
                    .await;
                return Ok(CheckinOutcome::Blocked {
                    machine_id,
                    machine_name,
                });
            }
            CheckinGate::ConfirmationRequired {
                machine_id,
                machine_name,
            } => {
                if !confirmed {
                    return Ok(CheckinOutcome::ConfirmationRequired {
                        machine_id,
                        machine_name,
                    });
                }
                machine_id
            }
        };

        if !remote.is_held_by(self.me()) {
            let err = CheckoutError::NotHolder {
                path: path.clone(),
                holder: remote.checked_out_by.clone(),
            };
            return Err(self.deny(AuditAction::Checkin, path, err).await);
        }

        fields.force = overridden.is_some();
        if fields.metadata.is_empty() {
            fields.metadata = record.pending_metadata().clone();
        }

        let updated = match self.metadata.checkin(&remote.id, self.me(), &fields).await {
            Ok(updated) => updated,
            Err(e) => return Err(self.deny(AuditAction::Checkin, path, CheckoutError::Remote(e)).await),
        };

        info!(
            path = %path,
            version = updated.version,
            forced = overridden.is_some(),
            "Checked in"
        );
        self.audit
            .log_checkin(path, &updated.id, updated.version, overridden.as_ref())
            .await;
        Ok(CheckinOutcome::Completed(updated))
    }

    /// Releases the acting user's checkout without pushing content
    pub async fn discard(&self, record: &FileRecord) -> Result<RemoteRecord, CheckoutError> {
        let path = record.path();
        let remote = Self::live_remote(record)?;

        match &remote.checked_out_by {
            None => {
                let err = CheckoutError::NotCheckedOut { path: path.clone() };
                return Err(self.deny(AuditAction::Discard, path, err).await);
            }
            Some(holder) if holder != self.me() => {
                let err = CheckoutError::NotHolder {
                    path: path.clone(),
                    holder: Some(holder.clone()),
                };
                return Err(self.deny(AuditAction::Discard, path, err).await);
            }
            Some(_) => {}
        }

        let updated = match self.metadata.discard(&remote.id, self.me()).await {
            Ok(updated) => updated,
            Err(e) => return Err(self.deny(AuditAction::Discard, path, CheckoutError::Remote(e)).await),
        };

        info!(path = %path, "Checkout discarded");
        self.audit.log_discard(path, &updated.id).await;
        Ok(updated)
    }

    /// Releases anybody's checkout; admin only, always audited
    pub async fn force_release(&self, record: &FileRecord) -> Result<RemoteRecord, CheckoutError> {
        let path = record.path();

        if !self.identity.is_admin() {
            let err = CheckoutError::NotPrivileged { path: path.clone() };
            return Err(self.deny(AuditAction::ForceRelease, path, err).await);
        }

        let remote = Self::live_remote(record)?;
        let Some(previous) = remote.checked_out_by.clone() else {
            let err = CheckoutError::NotCheckedOut { path: path.clone() };
            return Err(self.deny(AuditAction::ForceRelease, path, err).await);
        };

        let updated = match self.metadata.force_release(&remote.id, self.me()).await {
            Ok(updated) => updated,
            Err(e) => {
                return Err(self
                    .deny(AuditAction::ForceRelease, path, CheckoutError::Remote(e))
                    .await)
            }
        };

        warn!(path = %path, previous_holder = %previous, admin = %self.me(), "Checkout force-released");
        self.audit.log_force_release(path, &updated.id, &previous).await;
        Ok(updated)
    }

    // ========================================================================
    // Predicates
    // ========================================================================

    /// Returns true if the acting identity may change the file on disk
    ///
    /// Directories and files without a live remote record are free; synced
    /// files must be checked out by the acting user.
    pub fn can_modify_locally(&self, record: &FileRecord) -> bool {
        record.is_directory() || record.live_remote().is_none() || record.is_held_by(self.me())
    }
}
