//! Error types for the conflict resolver

use thiserror::Error;
use vaultsync_core::domain::DomainError;

/// Errors that can occur while planning or resolving placements
#[derive(Debug, Error)]
pub enum ConflictError {
    /// No free numbered name was found within the search limit
    #[error("no free name for {path} after {attempts} attempts")]
    NameSpaceExhausted { path: String, attempts: u32 },

    /// A generated name was not a valid vault path
    #[error("invalid generated name: {0}")]
    InvalidName(#[from] DomainError),

    /// Destination existence check failed
    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}
