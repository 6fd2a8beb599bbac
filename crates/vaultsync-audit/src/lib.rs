//! Vaultsync Audit - Audit trail for checkout-relevant actions
//!
//! Provides:
//! - `AuditLogger`: High-level service for recording audit entries
//! - `ReasonCode`: Structured reason codes for refusals and failures
//! - `MemoryAuditStore`: In-process `IAuditStore` implementation

pub mod logger;
pub mod memory;
pub mod reason;

pub use logger::AuditLogger;
pub use memory::MemoryAuditStore;
pub use reason::ReasonCode;
