//! Domain error types
//!
//! This module defines error types specific to domain operations,
//! including validation failures and path errors.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid vault path format or content
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Invalid content hash format (expected lowercase hex SHA-256)
    #[error("Invalid hash format: {0}")]
    InvalidHash(String),

    /// Invalid identifier (file, user, or machine id)
    #[error("Invalid ID format: {0}")]
    InvalidId(String),

    /// Unknown enumeration literal (role, resolution, command kind, ...)
    #[error("Unknown value '{value}' for {kind}")]
    UnknownLiteral {
        /// What was being parsed
        kind: &'static str,
        /// The rejected literal
        value: String,
    },

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}
