use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use super::BlobStore;
use crate::error::{StoreError, StoreResult};

/// In-process [`BlobStore`]. Nothing survives the process.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Bytes>>,
    fail_writes: AtomicBool,
    fail_next_read: AtomicBool,
    writes: Mutex<Vec<String>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write fail, to simulate an unavailable store.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes the next read fail once, as a transient outage would.
    pub fn fail_next_read(&self) {
        self.fail_next_read.store(true, Ordering::SeqCst);
    }

    /// Stores raw bytes, bypassing write failure simulation.
    pub fn insert_raw(&self, key: &str, body: impl Into<Bytes>) {
        self.lock_blobs().insert(key.to_string(), body.into());
    }

    pub fn raw(&self, key: &str) -> Option<Bytes> {
        self.lock_blobs().get(key).cloned()
    }

    /// Sorted keys currently stored.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.lock_blobs().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Keys written successfully, in write order.
    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn lock_blobs(&self) -> std::sync::MutexGuard<'_, HashMap<String, Bytes>> {
        self.blobs.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_writable(&self, key: &str) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::ObjectStore(
                self.location(key),
                "simulated write failure".to_string(),
            ));
        }
        Ok(())
    }

    fn record_write(&self, key: &str) {
        self.writes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(key.to_string());
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Bytes>> {
        if self.fail_next_read.swap(false, Ordering::SeqCst) {
            return Err(StoreError::ObjectStore(
                self.location(key),
                "simulated read failure".to_string(),
            ));
        }
        Ok(self.raw(key))
    }

    async fn put(&self, key: &str, body: Bytes, _content_type: &str) -> StoreResult<()> {
        self.check_writable(key)?;
        self.lock_blobs().insert(key.to_string(), body);
        self.record_write(key);
        Ok(())
    }

    async fn put_new(&self, key: &str, body: Bytes, _content_type: &str) -> StoreResult<()> {
        self.check_writable(key)?;
        {
            let mut blobs = self.lock_blobs();
            if blobs.contains_key(key) {
                return Err(StoreError::AlreadyExists(self.location(key)));
            }
            blobs.insert(key.to_string(), body);
        }
        self.record_write(key);
        Ok(())
    }

    fn location(&self, key: &str) -> String {
        format!("memory://{key}")
    }
}
