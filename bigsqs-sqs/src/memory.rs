//! SQS in-memory queue

use async_trait::async_trait;
use bigsqs_core::{
    DeleteMessageOutput, MessageAttributeValue, QueueClient, QueueError, ReceiveMessageOutput,
    ReceiveMessageRequest, ReceivedMessage, ResponseMetadata, SendMessageOutput,
    SendMessageRequest,
};
use dashmap::DashMap;
use md5::{Digest, Md5};
use std::collections::{HashMap, VecDeque};
use tracing::{debug, info};
use uuid::Uuid;

/// Largest single message body SQS accepts, in bytes
pub const DEFAULT_MAXIMUM_MESSAGE_SIZE: usize = 262_144;

/// Window during which a repeated deduplication id is dropped
const DEDUPLICATION_INTERVAL_MILLIS: i64 = 5 * 60 * 1000;

#[derive(Debug, Clone)]
pub struct Queue {
    pub name: String,
    pub url: String,
    pub arn: String,
    pub created_timestamp: i64,
    pub visibility_timeout: i32,
    pub maximum_message_size: usize,
}

impl Queue {
    pub fn new(name: String) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            url: format!("http://localhost:4566/000000000000/{}", name),
            arn: format!("arn:aws:sqs:us-east-1:000000000000:{}", name),
            name,
            created_timestamp: now,
            visibility_timeout: 30,
            maximum_message_size: DEFAULT_MAXIMUM_MESSAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone)]
struct StoredMessage {
    message_id: String,
    receipt_handle: Option<String>,
    body: String,
    md5_of_body: String,
    message_attributes: HashMap<String, MessageAttributeValue>,
    group_id: Option<String>,
    deduplication_id: Option<String>,
    sent_timestamp: i64,
    approximate_receive_count: i32,
    approximate_first_receive_timestamp: Option<i64>,
    invisible_until: Option<i64>,
}

impl StoredMessage {
    fn new(request: SendMessageRequest) -> Self {
        Self {
            message_id: Uuid::new_v4().to_string(),
            receipt_handle: None,
            md5_of_body: md5_hex(request.body.as_bytes()),
            body: request.body,
            message_attributes: request.message_attributes,
            group_id: request.group_id,
            deduplication_id: request.deduplication_id,
            sent_timestamp: chrono::Utc::now().timestamp_millis(),
            approximate_receive_count: 0,
            approximate_first_receive_timestamp: None,
            invisible_until: None,
        }
    }

    fn is_visible(&self, now: i64) -> bool {
        self.invisible_until.map_or(true, |until| until <= now)
    }

    fn system_attributes(&self) -> HashMap<String, String> {
        let mut attributes = HashMap::new();
        attributes.insert(
            "ApproximateReceiveCount".to_string(),
            self.approximate_receive_count.to_string(),
        );
        attributes.insert("SentTimestamp".to_string(), self.sent_timestamp.to_string());
        if let Some(first) = self.approximate_first_receive_timestamp {
            attributes.insert(
                "ApproximateFirstReceiveTimestamp".to_string(),
                first.to_string(),
            );
        }
        if let Some(group_id) = &self.group_id {
            attributes.insert("MessageGroupId".to_string(), group_id.clone());
        }
        if let Some(dedup_id) = &self.deduplication_id {
            attributes.insert("MessageDeduplicationId".to_string(), dedup_id.clone());
        }
        attributes
    }
}

/// Lowercase hex MD5 digest, as SQS reports `MD5OfBody`
pub fn md5_hex(data: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Queue name addressed by a queue URL (its last path segment)
pub fn queue_name_from_url(queue_url: &str) -> &str {
    queue_url.split('/').next_back().unwrap_or(queue_url)
}

fn wants_attribute(selector: &[String], name: &str) -> bool {
    selector
        .iter()
        .any(|s| s == "All" || s == ".*" || s == name || prefix_match(s, name))
}

fn prefix_match(selector: &str, name: &str) -> bool {
    selector
        .strip_suffix(".*")
        .is_some_and(|prefix| name.starts_with(prefix))
}

/// In-process SQS emulation
///
/// Messages become invisible for the queue's visibility timeout once
/// received and must be deleted with the receipt handle of their latest
/// delivery. Long polling is not emulated: a receive on an empty queue
/// returns immediately.
#[derive(Debug, Default)]
pub struct MemoryQueue {
    queues: DashMap<String, Queue>,
    messages: DashMap<String, VecDeque<StoredMessage>>,
    deduplication: DashMap<String, HashMap<String, (String, i64)>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_queue(&self, name: &str) -> Result<Queue, QueueError> {
        if self.queues.contains_key(name) {
            return Err(QueueError::service(
                "QueueAlreadyExists",
                format!("Queue already exists: {}", name),
            ));
        }

        let queue = Queue::new(name.to_string());
        info!(name = %name, url = %queue.url, "Creating queue");
        self.queues.insert(name.to_string(), queue.clone());
        self.messages.insert(name.to_string(), VecDeque::new());
        self.deduplication.insert(name.to_string(), HashMap::new());
        Ok(queue)
    }

    pub fn delete_queue(&self, name: &str) -> Result<(), QueueError> {
        if self.queues.remove(name).is_none() {
            return Err(QueueError::QueueNotFound(name.to_string()));
        }

        info!(name = %name, "Deleting queue");
        self.messages.remove(name);
        self.deduplication.remove(name);
        Ok(())
    }

    pub fn get_queue(&self, name: &str) -> Result<Queue, QueueError> {
        self.queues
            .get(name)
            .map(|q| q.value().clone())
            .ok_or_else(|| QueueError::QueueNotFound(name.to_string()))
    }

    pub fn list_queues(&self, prefix: Option<&str>) -> Vec<String> {
        self.queues
            .iter()
            .filter(|q| prefix.map_or(true, |p| q.key().starts_with(p)))
            .map(|q| q.value().url.clone())
            .collect()
    }

    pub fn set_visibility_timeout(&self, name: &str, seconds: i32) -> Result<(), QueueError> {
        let mut queue = self
            .queues
            .get_mut(name)
            .ok_or_else(|| QueueError::QueueNotFound(name.to_string()))?;
        queue.visibility_timeout = seconds;
        Ok(())
    }

    /// Messages stored in the queue, in flight or not
    pub fn approximate_number_of_messages(&self, name: &str) -> usize {
        self.messages.get(name).map_or(0, |m| m.len())
    }

    /// Make every in-flight message of the queue visible again
    pub fn expire_visibility(&self, name: &str) {
        if let Some(mut messages) = self.messages.get_mut(name) {
            for msg in messages.iter_mut() {
                msg.invisible_until = None;
            }
        }
    }

    fn send(&self, queue_name: &str, request: SendMessageRequest) -> Result<SendMessageOutput, QueueError> {
        let queue = self.get_queue(queue_name)?;

        if request.body.len() > queue.maximum_message_size {
            return Err(QueueError::InvalidParameter(format!(
                "One or more parameters are invalid. Reason: Message must be shorter than {} bytes.",
                queue.maximum_message_size
            )));
        }

        let now = chrono::Utc::now().timestamp_millis();
        if let Some(dedup_id) = &request.deduplication_id {
            if let Some(mut seen) = self.deduplication.get_mut(queue_name) {
                seen.retain(|_, (_, at)| now - *at < DEDUPLICATION_INTERVAL_MILLIS);
                if let Some((message_id, _)) = seen.get(dedup_id) {
                    debug!(queue = %queue_name, dedup_id = %dedup_id, "Dropped duplicate message");
                    return Ok(SendMessageOutput {
                        message_id: message_id.clone(),
                        md5_of_message_body: Some(md5_hex(request.body.as_bytes())),
                        sequence_number: None,
                        response_metadata: ResponseMetadata::ok(Uuid::new_v4().to_string()),
                    });
                }
            }
        }

        let message = StoredMessage::new(request);
        let output = SendMessageOutput {
            message_id: message.message_id.clone(),
            md5_of_message_body: Some(message.md5_of_body.clone()),
            sequence_number: None,
            response_metadata: ResponseMetadata::ok(Uuid::new_v4().to_string()),
        };

        if let Some(dedup_id) = &message.deduplication_id {
            if let Some(mut seen) = self.deduplication.get_mut(queue_name) {
                seen.insert(dedup_id.clone(), (message.message_id.clone(), now));
            }
        }

        if let Some(mut msgs) = self.messages.get_mut(queue_name) {
            msgs.push_back(message);
        }

        info!(queue = %queue_name, message_id = %output.message_id, "Sent message");
        Ok(output)
    }

    fn receive(
        &self,
        queue_name: &str,
        request: &ReceiveMessageRequest,
    ) -> Result<ReceiveMessageOutput, QueueError> {
        let queue = self.get_queue(queue_name)?;

        let mut result = Vec::new();
        let max = usize::try_from(request.max_number_of_messages.clamp(1, 10)).unwrap_or(1);
        let now = chrono::Utc::now().timestamp_millis();
        let hidden_until = now + i64::from(queue.visibility_timeout) * 1000;

        if let Some(mut messages) = self.messages.get_mut(queue_name) {
            for msg in messages.iter_mut().filter(|m| m.is_visible(now)).take(max) {
                msg.approximate_receive_count += 1;
                if msg.approximate_first_receive_timestamp.is_none() {
                    msg.approximate_first_receive_timestamp = Some(now);
                }
                // Every delivery gets its own receipt handle
                let receipt_handle = Uuid::new_v4().to_string();
                msg.receipt_handle = Some(receipt_handle.clone());
                msg.invisible_until = Some(hidden_until);

                result.push(ReceivedMessage {
                    message_id: msg.message_id.clone(),
                    receipt_handle,
                    md5_of_body: msg.md5_of_body.clone(),
                    body: msg.body.clone(),
                    attributes: msg.system_attributes(),
                    message_attributes: msg
                        .message_attributes
                        .iter()
                        .filter(|(name, _)| wants_attribute(&request.message_attribute_names, name))
                        .map(|(name, value)| (name.clone(), value.clone()))
                        .collect(),
                });
            }
        }

        info!(queue = %queue_name, count = result.len(), "Received messages");

        let mut output = ReceiveMessageOutput {
            messages: result,
            response_metadata: ResponseMetadata::ok(Uuid::new_v4().to_string()),
        };
        output.refresh_content_length();
        Ok(output)
    }

    fn delete(&self, queue_name: &str, receipt_handle: &str) -> Result<(), QueueError> {
        let mut messages = self
            .messages
            .get_mut(queue_name)
            .ok_or_else(|| QueueError::QueueNotFound(queue_name.to_string()))?;

        let original_len = messages.len();
        messages.retain(|m| m.receipt_handle.as_deref() != Some(receipt_handle));

        if messages.len() == original_len {
            return Err(QueueError::ReceiptHandleIsInvalid(receipt_handle.to_string()));
        }

        info!(queue = %queue_name, receipt = %receipt_handle, "Deleted message");
        Ok(())
    }
}

#[async_trait]
impl QueueClient for MemoryQueue {
    async fn send_message(
        &self,
        queue_url: &str,
        request: SendMessageRequest,
    ) -> Result<SendMessageOutput, QueueError> {
        self.send(queue_name_from_url(queue_url), request)
    }

    async fn receive_message(
        &self,
        queue_url: &str,
        request: ReceiveMessageRequest,
    ) -> Result<ReceiveMessageOutput, QueueError> {
        self.receive(queue_name_from_url(queue_url), &request)
    }

    async fn delete_message(
        &self,
        queue_url: &str,
        receipt_handle: &str,
    ) -> Result<DeleteMessageOutput, QueueError> {
        self.delete(queue_name_from_url(queue_url), receipt_handle)?;
        Ok(DeleteMessageOutput {
            response_metadata: ResponseMetadata::ok(Uuid::new_v4().to_string()),
        })
    }
}
