use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StoreResult;

/// Keyed blob storage underneath a [`PartitionedStore`](super::PartitionedStore).
///
/// Writes publish the whole blob at once: a reader sees either the previous
/// content or the new content, never a partial write.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Returns `Ok(None)` when nothing is stored under `key`.
    async fn get(&self, key: &str) -> StoreResult<Option<Bytes>>;

    /// Stores `body` under `key`, replacing any previous blob.
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> StoreResult<()>;

    /// Stores `body` under `key` only if the key is unused.
    ///
    /// Fails with [`StoreError::AlreadyExists`](crate::error::StoreError::AlreadyExists)
    /// otherwise.
    async fn put_new(&self, key: &str, body: Bytes, content_type: &str) -> StoreResult<()>;

    /// Human-readable location of `key`, used in reports and logs.
    fn location(&self, key: &str) -> String;
}
