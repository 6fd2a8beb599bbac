//! Vaultsync Sync - Reconciliation and checkout-concurrency engine
//!
//! Provides:
//! - Diff classification of local/remote file pairs
//! - Single-pass folder summaries
//! - Exclusive checkout arbitration across users and machines
//! - Batch command execution with partial failure, progress and cancellation
//!
//! ## Modules
//!
//! - [`classifier`] - Table-driven diff status classification
//! - [`ignore`] - Vault ignore rules
//! - [`aggregator`] - Per-folder rollups of the file table
//! - [`reconcile`] - Working tree scan merged with the remote manifest
//! - [`table`] - The shared file table
//! - [`inflight`] - Registry of paths under operation
//! - [`checkout`] - Checkout coordinator
//! - [`progress`] - Progress and throughput tracking
//! - [`executor`] - Batch command executor
//! - [`vault`] - Vault context object (connect / rescan / disconnect)
//! - [`filesystem`] - Local filesystem adapter (atomic writes, SHA-256)

pub mod aggregator;
pub mod checkout;
pub mod classifier;
pub mod executor;
pub mod filesystem;
pub mod ignore;
pub mod inflight;
pub mod progress;
pub mod reconcile;
pub mod table;
pub mod vault;

pub use aggregator::{FolderAggregator, FolderSummary};
pub use checkout::{CheckinGate, CheckinOutcome, CheckoutCoordinator, CheckoutError};
pub use classifier::{ClassifyContext, DiffClassifier};
pub use executor::{applies, CommandExecutor, ExecutorError, ExecutorSettings};
pub use filesystem::{content_hash_of, LocalVaultFileSystem};
pub use ignore::IgnoreRules;
pub use inflight::{InFlightGuard, InFlightPaths};
pub use progress::{ProgressFn, ProgressTracker, ProgressUpdate};
pub use table::{FileTable, FileUpdate};
pub use vault::{DisconnectReport, ScanReport, Vault, VaultPorts, VaultSettings};

use thiserror::Error;
use vaultsync_core::domain::{DomainError, VaultPath};

/// Errors raised by the scan and the vault lifecycle
#[derive(Debug, Error)]
pub enum SyncError {
    /// The remote manifest could not be fetched
    #[error("Manifest fetch failed: {0:#}")]
    Manifest(anyhow::Error),

    /// Listing or hashing the working tree failed
    #[error("Scan failed: {0:#}")]
    Scan(anyhow::Error),

    /// The local index could not be read or written
    #[error("Local index error: {0}")]
    Index(String),

    /// No record exists at the given path
    #[error("Path not found: {0}")]
    PathNotFound(VaultPath),

    /// A domain-level error propagated from vaultsync-core
    #[error("Domain error: {0}")]
    DomainError(#[from] DomainError),
}
