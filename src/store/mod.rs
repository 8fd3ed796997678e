//! Partitioned persistence of speed records and the routes lookup.
//!
//! Record partitions are named `{prefix}-{YYYY-MM-DD}[-{HHmm}].bin` and hold
//! the [`codec`](crate::codec) encoding of a record sequence. Lookup
//! documents are named `{prefix}[-{YYYY-MM-DD}].json` and hold a flat JSON
//! object of route tag to title.

mod blob;
pub mod local;
pub mod memory;
pub mod s3;

pub use blob::BlobStore;
pub use local::LocalBlobStore;
pub use memory::MemoryBlobStore;
pub use s3::S3BlobStore;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use crate::codec;
use crate::error::{StoreError, StoreResult};
use crate::types::{RoutesLookup, SpeedRecord};

const RECORD_CONTENT_TYPE: &str = "application/octet-stream";
const LOOKUP_CONTENT_TYPE: &str = "application/json";

/// Time resolution of record partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    /// One partition per UTC day, rewritten with the merged batch each cycle.
    Daily,
    /// One immutable partition per UTC minute, written once.
    PerInvocation,
}

fn utc(timestamp_ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(timestamp_ms).unwrap_or(DateTime::UNIX_EPOCH)
}

/// UTC calendar date of `timestamp_ms`, as `YYYY-MM-DD`.
pub fn date_key(timestamp_ms: i64) -> String {
    utc(timestamp_ms).format("%Y-%m-%d").to_string()
}

/// Derives the partition a record stamped `timestamp_ms` belongs to.
pub fn partition_key_for(timestamp_ms: i64, granularity: Granularity) -> String {
    match granularity {
        Granularity::Daily => date_key(timestamp_ms),
        Granularity::PerInvocation => utc(timestamp_ms).format("%Y-%m-%d-%H%M").to_string(),
    }
}

/// Where an appended batch ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Appended {
    /// The batch is now stored at this location.
    Written(String),
    /// An overlapping invocation already created this per-invocation
    /// partition. The batch was dropped.
    AlreadyExists(String),
}

/// Record and lookup persistence over a [`BlobStore`].
pub struct PartitionedStore {
    backend: Arc<dyn BlobStore>,
    granularity: Granularity,
    record_prefix: String,
    routes_prefix: String,
}

impl PartitionedStore {
    pub fn new(backend: Arc<dyn BlobStore>, granularity: Granularity) -> Self {
        Self {
            backend,
            granularity,
            record_prefix: "speeds".to_string(),
            routes_prefix: "routes".to_string(),
        }
    }

    pub fn with_prefixes(mut self, record_prefix: &str, routes_prefix: &str) -> Self {
        self.record_prefix = record_prefix.to_string();
        self.routes_prefix = routes_prefix.to_string();
        self
    }

    pub fn partition_key_for(&self, timestamp_ms: i64) -> String {
        partition_key_for(timestamp_ms, self.granularity)
    }

    /// Blob key of the record partition `partition_key`.
    pub fn record_blob_key(&self, partition_key: &str) -> String {
        format!("{}-{}.bin", self.record_prefix, partition_key)
    }

    /// Blob key of the lookup document in effect at `timestamp_ms`.
    ///
    /// Daily stores keep one rolling document; per-invocation stores keep
    /// one document per date.
    pub fn routes_blob_key(&self, timestamp_ms: i64) -> String {
        match self.granularity {
            Granularity::Daily => format!("{}.json", self.routes_prefix),
            Granularity::PerInvocation => {
                format!("{}-{}.json", self.routes_prefix, date_key(timestamp_ms))
            }
        }
    }

    /// Loads every record in a partition.
    ///
    /// A missing or unreadable partition loads as empty. Bytes that do not
    /// decode are an error.
    #[tracing::instrument(skip(self))]
    pub async fn load(&self, partition_key: &str) -> StoreResult<Vec<SpeedRecord>> {
        let key = self.record_blob_key(partition_key);
        let bytes = match self.backend.get(&key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return Ok(Vec::new()),
            Err(e) => {
                warn!(error = %e, "Partition unreadable, starting fresh");
                return Ok(Vec::new());
            }
        };

        codec::decode(&bytes).map_err(|e| StoreError::Corrupt(self.backend.location(&key), e))
    }

    /// Persists a batch into `partition_key`.
    ///
    /// Daily partitions are read, extended and republished whole. Only a
    /// partition that does not exist yet starts empty: a failed read or
    /// bytes that do not decode fail the append and nothing is written.
    /// Per-invocation partitions are created once; if the key is already
    /// taken by an overlapping invocation the batch is dropped and
    /// [`Appended::AlreadyExists`] is returned.
    #[tracing::instrument(skip(self, records), fields(records = records.len()))]
    pub async fn append(&self, partition_key: &str, records: &[SpeedRecord]) -> StoreResult<Appended> {
        let key = self.record_blob_key(partition_key);
        let location = self.backend.location(&key);

        match self.granularity {
            Granularity::Daily => {
                let mut merged = match self.backend.get(&key).await? {
                    Some(bytes) => codec::decode(&bytes)
                        .map_err(|e| StoreError::Corrupt(location.clone(), e))?,
                    None => Vec::new(),
                };
                let existing = merged.len();
                merged.extend_from_slice(records);

                let body = codec::encode(&merged)?;
                self.backend
                    .put(&key, Bytes::from(body), RECORD_CONTENT_TYPE)
                    .await?;
                info!(location = %location, existing, total = merged.len(), "Partition rewritten");
                Ok(Appended::Written(location))
            }
            Granularity::PerInvocation => {
                let body = codec::encode(records)?;
                match self
                    .backend
                    .put_new(&key, Bytes::from(body), RECORD_CONTENT_TYPE)
                    .await
                {
                    Ok(()) => {
                        info!(location = %location, "Partition created");
                        Ok(Appended::Written(location))
                    }
                    Err(StoreError::AlreadyExists(_)) => {
                        warn!(location = %location, "Partition already written by another invocation, batch dropped");
                        Ok(Appended::AlreadyExists(location))
                    }
                    Err(e) => Err(e),
                }
            }
        }
    }

    /// Loads the lookup document in effect at `timestamp_ms`.
    ///
    /// Missing, unreadable and unparsable documents all load as empty.
    pub async fn load_routes(&self, timestamp_ms: i64) -> RoutesLookup {
        let key = self.routes_blob_key(timestamp_ms);
        match self.read_routes(&key).await {
            Ok(lookup) => lookup,
            Err(e) => {
                warn!(key = %key, error = %e, "Routes lookup unreadable, starting fresh");
                RoutesLookup::new()
            }
        }
    }

    /// A missing or unparsable document reads as empty; a failed read is an error.
    async fn read_routes(&self, key: &str) -> StoreResult<RoutesLookup> {
        let Some(bytes) = self.backend.get(key).await? else {
            return Ok(RoutesLookup::new());
        };
        Ok(serde_json::from_slice(&bytes).unwrap_or_else(|e| {
            warn!(key = %key, error = %e, "Routes lookup unparsable, starting fresh");
            RoutesLookup::new()
        }))
    }

    /// Merges `lookup` into the stored document, new titles winning.
    ///
    /// Returns the location written, or `None` when the stored document
    /// already held every entry. If the stored document cannot be read
    /// nothing is written.
    #[tracing::instrument(skip(self, lookup), fields(routes = lookup.len()))]
    pub async fn save_routes(&self, timestamp_ms: i64, lookup: &RoutesLookup) -> StoreResult<Option<String>> {
        let key = self.routes_blob_key(timestamp_ms);
        let location = self.backend.location(&key);

        let existing = self.read_routes(&key).await?;
        let mut merged = existing.clone();
        merged.extend(lookup.iter().map(|(tag, title)| (tag.clone(), title.clone())));

        if merged == existing && !existing.is_empty() {
            info!(location = %location, "Routes lookup already up to date");
            return Ok(None);
        }

        let body = serde_json::to_vec_pretty(&merged)?;
        match self
            .backend
            .put(&key, Bytes::from(body), LOOKUP_CONTENT_TYPE)
            .await
        {
            Ok(()) | Err(StoreError::AlreadyExists(_)) => {}
            Err(e) => return Err(e),
        }

        info!(location = %location, routes = merged.len(), "Routes lookup saved");
        Ok(Some(location))
    }
}
