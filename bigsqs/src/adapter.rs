//! The oversize-payload SQS client

use bigsqs_core::{
    BlobClient, DeleteMessageOutput, MessageAttributeValue, QueueClient, ReceiveMessageOutput,
    ReceiveMessageRequest, ReceivedMessage, SendMessageOutput, SendMessageRequest,
};
use bigsqs_sqs::md5_hex;
use bytes::Bytes;
use dashmap::DashMap;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{AdapterConfig, OrphanPolicy};
use crate::error::{BigSqsError, Result};
use crate::pointer::{PointerBody, S3Pointer};

/// Content type of externalized payloads
pub const PAYLOAD_CONTENT_TYPE: &str = "text/plain";

/// Length of a string in bytes when encoded as UTF-8
pub fn utf8_len(message: &str) -> usize {
    message.len()
}

/// A message to send
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub body: String,
    pub attributes: HashMap<String, MessageAttributeValue>,
    /// Defaults to a fresh UUID per send
    pub group_id: Option<String>,
}

impl OutgoingMessage {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..Default::default()
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: MessageAttributeValue) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }

    pub fn with_group_id(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }
}

impl From<String> for OutgoingMessage {
    fn from(body: String) -> Self {
        Self::new(body)
    }
}

impl From<&str> for OutgoingMessage {
    fn from(body: &str) -> Self {
        Self::new(body)
    }
}

/// SQS client that stores oversize payloads on S3
///
/// Bodies over the configured threshold are uploaded to the bucket and
/// replaced by a pointer record. Received pointer records are resolved back
/// into their payloads, and the receipt handle of each resolved delivery is
/// remembered so that deleting the message also deletes its payload.
///
/// One instance may be shared between tasks; the receipt handle table is a
/// concurrent map.
pub struct BigSqsClient {
    queue: Arc<dyn QueueClient>,
    blobs: Arc<dyn BlobClient>,
    config: AdapterConfig,
    receipt_handles: DashMap<String, S3Pointer>,
}

impl fmt::Debug for BigSqsClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BigSqsClient")
            .field("config", &self.config)
            .field("tracked_handles", &self.receipt_handles.len())
            .finish_non_exhaustive()
    }
}

impl BigSqsClient {
    pub fn new(
        queue: Arc<dyn QueueClient>,
        blobs: Arc<dyn BlobClient>,
        config: AdapterConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            queue,
            blobs,
            config,
            receipt_handles: DashMap::new(),
        })
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    /// Number of resolved deliveries awaiting deletion
    pub fn tracked_handles(&self) -> usize {
        self.receipt_handles.len()
    }

    /// Send a message, substituting an S3 pointer if the body is oversize
    pub async fn send_message(&self, message: impl Into<OutgoingMessage>) -> Result<SendMessageOutput> {
        let OutgoingMessage {
            body,
            attributes,
            group_id,
        } = message.into();

        // Doubles as the deduplication id and, if needed, the object key
        let payload_id = Uuid::new_v4().to_string();
        let size = utf8_len(&body);

        let body = if size > self.config.size_threshold {
            let pointer = S3Pointer::new(self.config.bucket_name.as_str(), payload_id.as_str());
            self.blobs
                .put_object(
                    &pointer.bucket_name,
                    &pointer.key,
                    Bytes::from(body),
                    PAYLOAD_CONTENT_TYPE,
                )
                .await?;
            info!(
                bucket = %pointer.bucket_name,
                key = %pointer.key,
                size,
                "Stored oversize payload"
            );
            pointer.to_body()
        } else {
            body
        };

        let request = SendMessageRequest {
            body,
            deduplication_id: Some(payload_id),
            group_id: Some(group_id.unwrap_or_else(|| Uuid::new_v4().to_string())),
            message_attributes: attributes,
        };
        Ok(self
            .queue
            .send_message(&self.config.queue_url, request)
            .await?)
    }

    /// Send messages one after another, in order
    ///
    /// Not atomic. If message `k` fails, messages before it stay sent,
    /// nothing after it is attempted, and the error is
    /// [`BigSqsError::Batch`] carrying the results gathered so far.
    pub async fn send_messages<I, M>(&self, messages: I) -> Result<Vec<SendMessageOutput>>
    where
        I: IntoIterator<Item = M>,
        M: Into<OutgoingMessage>,
    {
        let mut sent = Vec::new();
        for (index, message) in messages.into_iter().enumerate() {
            match self.send_message(message).await {
                Ok(output) => sent.push(output),
                Err(source) => {
                    warn!(index, sent = sent.len(), error = %source, "Batch send stopped");
                    return Err(BigSqsError::Batch {
                        index,
                        sent,
                        source: Box::new(source),
                    });
                }
            }
        }
        Ok(sent)
    }

    /// Receive up to `max_number_of_messages` messages, resolving S3 pointers
    ///
    /// `attribute_names` selects message attributes; `None` asks for all.
    pub async fn receive_messages(
        &self,
        max_number_of_messages: i32,
        attribute_names: Option<Vec<String>>,
    ) -> Result<ReceiveMessageOutput> {
        if max_number_of_messages < 1 {
            return Err(BigSqsError::InvalidArgument(format!(
                "max_number_of_messages must be positive, got {max_number_of_messages}"
            )));
        }

        let request = ReceiveMessageRequest {
            max_number_of_messages,
            message_attribute_names: attribute_names.unwrap_or_else(|| vec!["All".to_string()]),
            wait_time_seconds: self.config.wait_time_seconds,
        };
        let mut output = self
            .queue
            .receive_message(&self.config.queue_url, request)
            .await?;

        // A failed receive records no bindings
        let mut bindings = Vec::new();
        for message in &mut output.messages {
            if let Some(pointer) = self.resolve(message).await? {
                bindings.push((message.receipt_handle.clone(), pointer));
            }
        }

        if !bindings.is_empty() {
            let resolved = bindings.len();
            for (receipt_handle, pointer) in bindings {
                self.receipt_handles.insert(receipt_handle, pointer);
            }
            let length = output.refresh_content_length();
            debug!(resolved, content_length = length, "Resolved S3 pointers");
        }
        Ok(output)
    }

    /// Swap a pointer body for its payload. Returns the pointer if the
    /// message was one.
    async fn resolve(&self, message: &mut ReceivedMessage) -> Result<Option<S3Pointer>> {
        let pointer = match PointerBody::inspect(&message.body) {
            PointerBody::Plain => return Ok(None),
            PointerBody::Pointer(pointer) => pointer,
            PointerBody::Malformed(reason) => {
                return Err(BigSqsError::MalformedPointer {
                    message_id: message.message_id.clone(),
                    reason,
                })
            }
        };

        let data = self
            .blobs
            .get_object(&pointer.bucket_name, &pointer.key)
            .await?;
        let md5_of_body = md5_hex(&data);
        let body = String::from_utf8(data.to_vec()).map_err(|source| BigSqsError::InvalidUtf8 {
            bucket: pointer.bucket_name.clone(),
            key: pointer.key.clone(),
            source,
        })?;

        debug!(
            message_id = %message.message_id,
            bucket = %pointer.bucket_name,
            key = %pointer.key,
            size = body.len(),
            "Resolved oversize payload"
        );
        message.body = body;
        message.md5_of_body = md5_of_body;
        Ok(Some(pointer))
    }

    /// Delete a message, and its S3 payload if this client resolved one for
    /// `receipt_handle`
    ///
    /// The queue delete goes first; if it fails the payload is left alone.
    /// A payload delete failure after that is handled per
    /// [`OrphanPolicy`].
    pub async fn delete_message(&self, receipt_handle: &str) -> Result<DeleteMessageOutput> {
        let output = self
            .queue
            .delete_message(&self.config.queue_url, receipt_handle)
            .await?;

        let Some((_, pointer)) = self.receipt_handles.remove(receipt_handle) else {
            return Ok(output);
        };

        match self
            .blobs
            .delete_object(&pointer.bucket_name, &pointer.key)
            .await
        {
            Ok(()) => {
                info!(
                    receipt = %receipt_handle,
                    bucket = %pointer.bucket_name,
                    key = %pointer.key,
                    "Deleted oversize payload"
                );
                Ok(output)
            }
            Err(source) => match self.config.orphan_policy {
                OrphanPolicy::Fail => Err(BigSqsError::OrphanedBlob {
                    pointer,
                    queue_output: output,
                    source,
                }),
                OrphanPolicy::Warn => {
                    warn!(
                        receipt = %receipt_handle,
                        bucket = %pointer.bucket_name,
                        key = %pointer.key,
                        error = %source,
                        "Message deleted but payload left behind"
                    );
                    Ok(output)
                }
            },
        }
    }
}
