//! Audit store port
//!
//! Persistence for audit entries. Adapters may be a database, a log file or
//! the in-memory store used by tests and the CLI.

use chrono::{DateTime, Utc};

use crate::domain::AuditEntry;

/// Port trait for persisting and querying audit entries
#[async_trait::async_trait]
pub trait IAuditStore: Send + Sync {
    /// Persists one entry
    async fn save_audit(&self, entry: &AuditEntry) -> anyhow::Result<()>;

    /// Entries at or after `since`, oldest first, at most `limit`
    async fn audit_since(
        &self,
        since: DateTime<Utc>,
        limit: usize,
    ) -> anyhow::Result<Vec<AuditEntry>>;
}
