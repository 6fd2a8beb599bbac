//! Reason codes for audit log entries
//!
//! Structured codes for why a checkout-related operation was refused or
//! failed. Used by `AuditLogger` as the failure code of an entry.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Structured reason codes for refusals and failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    /// Acting user does not hold the checkout
    NotHolder,
    /// Someone already holds the checkout
    AlreadyCheckedOut,
    /// The machine holding the checkout is unreachable
    MachineOffline,
    /// Checkin needs confirmation to override another machine
    ConfirmationRequired,
    /// Privileged operation attempted without the admin role
    NotPrivileged,
    /// Operation requires a checkout nobody holds
    NotCheckedOut,
    /// The metadata service rejected the call
    RemoteRejected,
    /// Local filesystem or blob transfer failure
    IoFailure,
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReasonCode::NotHolder => "not_holder",
            ReasonCode::AlreadyCheckedOut => "already_checked_out",
            ReasonCode::MachineOffline => "machine_offline",
            ReasonCode::ConfirmationRequired => "confirmation_required",
            ReasonCode::NotPrivileged => "not_privileged",
            ReasonCode::NotCheckedOut => "not_checked_out",
            ReasonCode::RemoteRejected => "remote_rejected",
            ReasonCode::IoFailure => "io_failure",
        };
        write!(f, "{s}")
    }
}
