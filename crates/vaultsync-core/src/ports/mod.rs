//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the domain core
//! depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IMetadataService`] - Remote vault records and checkout transitions
//! - [`IBlobStore`] - Content-addressable file bytes
//! - [`IVaultFileSystem`] - The local working tree
//! - [`IAuditStore`] - Persistent audit trail

pub mod audit_store;
pub mod blob_store;
pub mod metadata_service;
pub mod vault_filesystem;

pub use audit_store::IAuditStore;
pub use blob_store::IBlobStore;
pub use metadata_service::{CheckinFields, IMetadataService, NewRecord};
pub use vault_filesystem::{DirEntry, IVaultFileSystem};
