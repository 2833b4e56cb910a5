//! Amazon S3 client backed by the AWS SDK

use async_trait::async_trait;
use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bigsqs_core::{BlobClient, BlobError};
use bytes::Bytes;
use tracing::debug;

/// Blob client for Amazon S3
#[derive(Debug, Clone)]
pub struct S3BlobClient {
    client: Client,
}

impl S3BlobClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn map_sdk_error<E, R>(err: SdkError<E, R>, bucket: &str, key: &str) -> BlobError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    let Some(service) = err.as_service_error() else {
        return BlobError::transport(err);
    };

    let code = service.code().unwrap_or("Unknown").to_string();
    let message = service.message().unwrap_or_default().to_string();
    match code.as_str() {
        "NoSuchBucket" => BlobError::BucketNotFound(bucket.to_string()),
        "NoSuchKey" | "NotFound" => BlobError::ObjectNotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        },
        _ => BlobError::Service { code, message },
    }
}

#[async_trait]
impl BlobClient for S3BlobClient {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), BlobError> {
        let size = data.len();
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| map_sdk_error(e, bucket, key))?;
        debug!(bucket = %bucket, key = %key, size, "S3 PutObject");
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes, BlobError> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, bucket, key))?;

        let data = output
            .body
            .collect()
            .await
            .map_err(BlobError::transport)?
            .into_bytes();
        debug!(bucket = %bucket, key = %key, size = data.len(), "S3 GetObject");
        Ok(data)
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), BlobError> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, bucket, key))?;
        debug!(bucket = %bucket, key = %key, "S3 DeleteObject");
        Ok(())
    }
}
