//! Domain entities and business rules
//!
//! This module contains the core domain types for vaultsync:
//! - Newtypes for validated identifiers, hashes and vault paths
//! - File records pairing local and remote state, with the derived diff status
//! - The acting identity (user, machine, role)
//! - Command and result value types for batch operations
//! - Placement conflict types
//! - Audit entries for checkout-relevant actions

pub mod audit;
pub mod command;
pub mod conflict;
pub mod diff_status;
pub mod errors;
pub mod file_record;
pub mod identity;
pub mod newtypes;

// Re-export commonly used types
pub use audit::{AuditAction, AuditEntry, AuditResult};
pub use command::{
    BlockedFile, Command, CommandKind, CommandOptions, CommandResult, ConfirmationRequest,
    ErrorKind, FileError,
};
pub use conflict::{ConflictSet, Placement, Resolution};
pub use diff_status::DiffStatus;
pub use errors::DomainError;
pub use file_record::{
    CheckoutState, EditableField, FileRecord, LocalState, PendingMetadata, RemoteRecord,
};
pub use identity::{Identity, Role};
pub use newtypes::*;
