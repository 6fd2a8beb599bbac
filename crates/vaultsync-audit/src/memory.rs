//! In-memory audit store
//!
//! Keeps entries for the lifetime of the process. Used by the CLI and as the
//! default store when no persistent backend is wired in.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use vaultsync_core::{domain::AuditEntry, ports::IAuditStore};

/// `IAuditStore` backed by a vector
#[derive(Debug, Default)]
pub struct MemoryAuditStore {
    entries: RwLock<Vec<AuditEntry>>,
}

impl MemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every entry, oldest first
    pub async fn entries(&self) -> Vec<AuditEntry> {
        self.entries.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl IAuditStore for MemoryAuditStore {
    async fn save_audit(&self, entry: &AuditEntry) -> anyhow::Result<()> {
        self.entries.write().await.push(entry.clone());
        Ok(())
    }

    async fn audit_since(
        &self,
        since: DateTime<Utc>,
        limit: usize,
    ) -> anyhow::Result<Vec<AuditEntry>> {
        let entries = self.entries.read().await;
        let mut matching: Vec<AuditEntry> = entries
            .iter()
            .filter(|e| e.timestamp() >= since)
            .cloned()
            .collect();
        matching.sort_by_key(|e| e.timestamp());
        matching.truncate(limit);
        Ok(matching)
    }
}
