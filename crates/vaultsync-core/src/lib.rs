//! Vaultsync Core - Domain logic and business rules
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `FileRecord`, `RemoteRecord`, `DiffStatus`, `Command`, `CommandResult`, `AuditEntry`
//! - **Port definitions** - Traits for adapters: `IMetadataService`, `IBlobStore`, `IVaultFileSystem`, `IAuditStore`
//! - **Configuration** - YAML configuration with defaults, validation and a builder
//!
//! # Architecture
//!
//! This crate follows the hexagonal (ports & adapters) architecture pattern.
//! The domain module contains pure business logic with no I/O.
//! Ports define trait interfaces that adapter crates implement; the engine
//! in `vaultsync-sync` drives them.

pub mod config;
pub mod domain;
pub mod ports;
