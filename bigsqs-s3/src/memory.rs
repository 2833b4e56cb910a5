//! In-memory blob store

use async_trait::async_trait;
use bigsqs_core::{BlobClient, BlobError};
use bytes::Bytes;
use chrono::Utc;
use dashmap::DashMap;
use md5::{Digest, Md5};
use std::sync::Arc;
use tracing::{debug, info};

/// In-memory stored object
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Bytes,
    pub etag: String,
    pub content_type: String,
    pub last_modified: chrono::DateTime<Utc>,
}

/// In-memory bucket
#[derive(Debug)]
struct InMemoryBucket {
    objects: DashMap<String, StoredObject>,
}

impl InMemoryBucket {
    fn new() -> Self {
        Self {
            objects: DashMap::new(),
        }
    }
}

/// In-process S3 emulation
#[derive(Debug)]
pub struct MemoryBlobStore {
    buckets: DashMap<String, Arc<InMemoryBucket>>,
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self {
            buckets: DashMap::new(),
        }
    }

    fn compute_etag(data: &[u8]) -> String {
        let mut hasher = Md5::new();
        hasher.update(data);
        format!("\"{}\"", hex::encode(hasher.finalize()))
    }

    fn bucket(&self, bucket: &str) -> Result<Arc<InMemoryBucket>, BlobError> {
        self.buckets
            .get(bucket)
            .map(|b| Arc::clone(b.value()))
            .ok_or_else(|| BlobError::BucketNotFound(bucket.to_string()))
    }

    pub fn create_bucket(&self, bucket: &str) -> Result<(), BlobError> {
        if self.buckets.contains_key(bucket) {
            return Err(BlobError::service(
                "BucketAlreadyOwnedByYou",
                format!("Bucket already exists: {}", bucket),
            ));
        }
        info!(bucket = %bucket, "Creating bucket");
        self.buckets
            .insert(bucket.to_string(), Arc::new(InMemoryBucket::new()));
        Ok(())
    }

    pub fn bucket_exists(&self, bucket: &str) -> bool {
        self.buckets.contains_key(bucket)
    }

    pub fn object_exists(&self, bucket: &str, key: &str) -> bool {
        self.buckets
            .get(bucket)
            .is_some_and(|b| b.objects.contains_key(key))
    }

    pub fn object_count(&self, bucket: &str) -> usize {
        self.buckets.get(bucket).map_or(0, |b| b.objects.len())
    }

    /// Full stored object, including its content type and etag
    pub fn head_object(&self, bucket: &str, key: &str) -> Result<StoredObject, BlobError> {
        self.bucket(bucket)?
            .objects
            .get(key)
            .map(|o| o.value().clone())
            .ok_or_else(|| BlobError::ObjectNotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }
}

#[async_trait]
impl BlobClient for MemoryBlobStore {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), BlobError> {
        let bucket_ref = self.bucket(bucket)?;
        let etag = Self::compute_etag(&data);
        debug!(bucket = %bucket, key = %key, size = data.len(), "Put object");

        bucket_ref.objects.insert(
            key.to_string(),
            StoredObject {
                data,
                etag,
                content_type: content_type.to_string(),
                last_modified: Utc::now(),
            },
        );
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes, BlobError> {
        self.head_object(bucket, key).map(|o| o.data)
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), BlobError> {
        let bucket_ref = self.bucket(bucket)?;
        // Deleting a missing key succeeds, as on S3
        let deleted = bucket_ref.objects.remove(key).is_some();
        debug!(bucket = %bucket, key = %key, deleted, "Delete object");
        Ok(())
    }
}
