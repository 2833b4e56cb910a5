//! Collaborator traits

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{BlobError, QueueError};
use crate::types::{
    DeleteMessageOutput, ReceiveMessageOutput, ReceiveMessageRequest, SendMessageOutput,
    SendMessageRequest,
};

/// The managed queue: enqueue, poll, delete
#[async_trait]
pub trait QueueClient: Send + Sync {
    /// Enqueue a message
    async fn send_message(
        &self,
        queue_url: &str,
        request: SendMessageRequest,
    ) -> Result<SendMessageOutput, QueueError>;

    /// Poll for up to `request.max_number_of_messages` messages
    async fn receive_message(
        &self,
        queue_url: &str,
        request: ReceiveMessageRequest,
    ) -> Result<ReceiveMessageOutput, QueueError>;

    /// Delete the delivery identified by `receipt_handle`
    async fn delete_message(
        &self,
        queue_url: &str,
        receipt_handle: &str,
    ) -> Result<DeleteMessageOutput, QueueError>;
}

/// The object store holding externalized payloads
#[async_trait]
pub trait BlobClient: Send + Sync {
    /// Put an object
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), BlobError>;

    /// Get an object's bytes
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes, BlobError>;

    /// Delete an object
    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), BlobError>;
}
