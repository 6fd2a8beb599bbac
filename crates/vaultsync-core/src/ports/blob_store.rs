//! Blob store port
//!
//! Content-addressable storage for file bytes. The engine only ever reads a
//! blob by the hash recorded on a remote record, and writes blobs before
//! telling the metadata service about a new version.

use crate::domain::ContentHash;

/// Port trait for content-addressable blob storage
#[async_trait::async_trait]
pub trait IBlobStore: Send + Sync {
    /// Fetches the bytes stored under `hash`
    async fn get(&self, hash: &ContentHash) -> anyhow::Result<Vec<u8>>;

    /// Stores `data` and returns the hash it is addressed by
    async fn put(&self, data: &[u8]) -> anyhow::Result<ContentHash>;
}
