//! Queue message types
//!
//! Field names serialise with their SQS wire names so a response can be
//! dumped as JSON exactly as the queue service shaped it.

use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Header carrying the transport-level size of a response
pub const CONTENT_LENGTH: &str = "content-length";

/// A typed message attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MessageAttributeValue {
    pub data_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string_value: Option<String>,
    /// Base64 encoded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary_value: Option<String>,
}

impl MessageAttributeValue {
    pub fn string(value: impl Into<String>) -> Self {
        Self {
            data_type: "String".to_string(),
            string_value: Some(value.into()),
            binary_value: None,
        }
    }

    pub fn number(value: impl ToString) -> Self {
        Self {
            data_type: "Number".to_string(),
            string_value: Some(value.to_string()),
            binary_value: None,
        }
    }

    pub fn binary(value: &[u8]) -> Self {
        Self {
            data_type: "Binary".to_string(),
            string_value: None,
            binary_value: Some(base64::engine::general_purpose::STANDARD.encode(value)),
        }
    }

    /// Decoded binary value, if this is a well-formed binary attribute
    pub fn binary_bytes(&self) -> Option<Vec<u8>> {
        self.binary_value
            .as_ref()
            .and_then(|v| base64::engine::general_purpose::STANDARD.decode(v).ok())
    }
}

/// Transport metadata attached to every queue response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    #[serde(rename = "RequestId", default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(rename = "HTTPStatusCode")]
    pub http_status_code: u16,
    #[serde(rename = "HTTPHeaders", default)]
    pub http_headers: BTreeMap<String, String>,
}

impl ResponseMetadata {
    pub fn ok(request_id: impl Into<String>) -> Self {
        Self {
            request_id: Some(request_id.into()),
            http_status_code: 200,
            http_headers: BTreeMap::new(),
        }
    }

    pub fn content_length(&self) -> Option<usize> {
        self.http_headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.parse().ok())
    }

    pub fn set_content_length(&mut self, length: usize) {
        self.http_headers
            .insert(CONTENT_LENGTH.to_string(), length.to_string());
    }
}

/// A message to enqueue
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendMessageRequest {
    pub body: String,
    pub deduplication_id: Option<String>,
    pub group_id: Option<String>,
    pub message_attributes: HashMap<String, MessageAttributeValue>,
}

/// Acknowledgement of an enqueue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SendMessageOutput {
    pub message_id: String,
    #[serde(rename = "MD5OfMessageBody")]
    pub md5_of_message_body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_number: Option<String>,
    #[serde(default)]
    pub response_metadata: ResponseMetadata,
}

/// Parameters of a poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiveMessageRequest {
    pub max_number_of_messages: i32,
    /// `["All"]` selects every attribute
    pub message_attribute_names: Vec<String>,
    pub wait_time_seconds: i32,
}

/// A single delivery of a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReceivedMessage {
    pub message_id: String,
    pub receipt_handle: String,
    #[serde(rename = "MD5OfBody")]
    pub md5_of_body: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub message_attributes: HashMap<String, MessageAttributeValue>,
}

/// Result of a poll
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReceiveMessageOutput {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<ReceivedMessage>,
    #[serde(default)]
    pub response_metadata: ResponseMetadata,
}

impl ReceiveMessageOutput {
    /// Length in bytes of this output rendered as JSON
    pub fn serialized_len(&self) -> usize {
        serde_json::to_string(self).map_or(0, |s| s.len())
    }

    /// Rewrite the `content-length` header so it equals the serialized
    /// length of this output, header value included.
    ///
    /// The length grows with the digit count of the value written into it,
    /// so iterate to the fixed point, which is reached within a few rounds.
    pub fn refresh_content_length(&mut self) -> usize {
        let mut length = self.response_metadata.content_length().unwrap_or(0);
        loop {
            self.response_metadata.set_content_length(length);
            let actual = self.serialized_len();
            if actual == length {
                return length;
            }
            length = actual;
        }
    }
}

/// Acknowledgement of a delete
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteMessageOutput {
    #[serde(default)]
    pub response_metadata: ResponseMetadata,
}
