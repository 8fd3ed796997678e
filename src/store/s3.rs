//! S3 [`BlobStore`]. Each put is a single-shot `PutObject`, so readers only
//! ever see complete objects.

use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use tracing::debug;

use super::BlobStore;
use crate::error::{StoreError, StoreResult};

pub struct S3BlobStore {
    client: aws_sdk_s3::Client,
    bucket: String,
    key_prefix: String,
}

impl S3BlobStore {
    pub fn new(client: aws_sdk_s3::Client, bucket: impl Into<String>, key_prefix: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            key_prefix: key_prefix.into(),
        }
    }

    /// Creates a store using the ambient AWS configuration (env vars, instance
    /// profile, etc.).
    pub async fn from_env(bucket: impl Into<String>, key_prefix: impl Into<String>) -> Self {
        let config = aws_config::load_from_env().await;
        Self::new(aws_sdk_s3::Client::new(&config), bucket, key_prefix)
    }

    fn object_key(&self, key: &str) -> String {
        if self.key_prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}/{}", self.key_prefix.trim_end_matches('/'), key)
        }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Bytes>> {
        let object_key = self.object_key(key);
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .send()
            .await;

        match result {
            Ok(output) => {
                let data = output.body.collect().await.map_err(|e| {
                    StoreError::ObjectStore(self.location(key), e.to_string())
                })?;
                Ok(Some(data.into_bytes()))
            }
            Err(e) if e.as_service_error().is_some_and(|se| se.is_no_such_key()) => Ok(None),
            Err(e) => Err(StoreError::ObjectStore(
                self.location(key),
                DisplayErrorContext(&e).to_string(),
            )),
        }
    }

    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> StoreResult<()> {
        let object_key = self.object_key(key);
        let len = body.len();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StoreError::ObjectStore(self.location(key), DisplayErrorContext(&e).to_string()))?;

        debug!(bucket = %self.bucket, key = %object_key, bytes = len, "Object uploaded");
        Ok(())
    }

    async fn put_new(&self, key: &str, body: Bytes, content_type: &str) -> StoreResult<()> {
        let object_key = self.object_key(key);
        let len = body.len();

        let result = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .if_none_match("*")
            .send()
            .await;

        match result {
            Ok(_) => {
                debug!(bucket = %self.bucket, key = %object_key, bytes = len, "Object created");
                Ok(())
            }
            // 412: object exists; 409: a concurrent conditional write won
            Err(e) if matches!(e.raw_response().map(|r| r.status().as_u16()), Some(409 | 412)) => {
                Err(StoreError::AlreadyExists(self.location(key)))
            }
            Err(e) => Err(StoreError::ObjectStore(
                self.location(key),
                DisplayErrorContext(&e).to_string(),
            )),
        }
    }

    fn location(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket, self.object_key(key))
    }
}
