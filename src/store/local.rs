//! Filesystem [`BlobStore`] rooted at a data directory.

use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

use super::BlobStore;
use crate::error::{StoreError, StoreResult};

pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    /// Writes `body` to a unique sibling of `path` and returns the sibling.
    async fn write_temp(&self, path: &Path, body: &[u8]) -> StoreResult<PathBuf> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(parent, e))?;
        }

        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp = path.with_file_name(format!(".{file_name}.{}.{nanos}.tmp", std::process::id()));

        tokio::fs::write(&temp, body)
            .await
            .map_err(|e| io_error(&temp, e))?;
        Ok(temp)
    }
}

fn io_error(path: &Path, e: std::io::Error) -> StoreError {
    StoreError::Io(path.display().to_string(), e)
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Bytes>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(&path, e)),
        }
    }

    async fn put(&self, key: &str, body: Bytes, _content_type: &str) -> StoreResult<()> {
        let path = self.path(key);
        let temp = self.write_temp(&path, &body).await?;

        if let Err(e) = tokio::fs::rename(&temp, &path).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(io_error(&path, e));
        }

        debug!(path = %path.display(), bytes = body.len(), "Blob written");
        Ok(())
    }

    async fn put_new(&self, key: &str, body: Bytes, _content_type: &str) -> StoreResult<()> {
        let path = self.path(key);
        let temp = self.write_temp(&path, &body).await?;

        // hard_link refuses to replace an existing file
        let linked = tokio::fs::hard_link(&temp, &path).await;
        let _ = tokio::fs::remove_file(&temp).await;

        match linked {
            Ok(()) => {
                debug!(path = %path.display(), bytes = body.len(), "Blob created");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                Err(StoreError::AlreadyExists(path.display().to_string()))
            }
            Err(e) => Err(io_error(&path, e)),
        }
    }

    fn location(&self, key: &str) -> String {
        self.path(key).display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());
        assert!(store.get("nope.bin").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_creates_directories_and_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path().join("nested"));

        store
            .put("a.bin", Bytes::from_static(b"one"), "application/octet-stream")
            .await
            .unwrap();
        store
            .put("a.bin", Bytes::from_static(b"two"), "application/octet-stream")
            .await
            .unwrap();

        let got = store.get("a.bin").await.unwrap().unwrap();
        assert_eq!(&got[..], b"two");
    }

    #[tokio::test]
    async fn test_put_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());

        store
            .put("a.bin", Bytes::from_static(b"x"), "application/octet-stream")
            .await
            .unwrap();
        store
            .put_new("b.bin", Bytes::from_static(b"y"), "application/octet-stream")
            .await
            .unwrap();

        let mut names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["a.bin", "b.bin"]);
    }

    #[tokio::test]
    async fn test_put_new_refuses_existing() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());

        store
            .put_new("a.bin", Bytes::from_static(b"first"), "application/octet-stream")
            .await
            .unwrap();
        let second = store
            .put_new("a.bin", Bytes::from_static(b"second"), "application/octet-stream")
            .await;

        assert!(matches!(second, Err(StoreError::AlreadyExists(_))));
        let got = store.get("a.bin").await.unwrap().unwrap();
        assert_eq!(&got[..], b"first");
    }
}
