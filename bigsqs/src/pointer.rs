//! S3 pointer records
//!
//! An oversize payload travels through the queue as a two-element JSON array:
//!
//! ```text
//! ["com.amazon.sqs.javamessaging.MessageS3Pointer", {"s3BucketName": "<bucket>", "s3Key": "<key>"}]
//! ```
//!
//! This is the layout the Amazon SQS Extended Client Library writes, so
//! consumers built on that library can resolve messages sent from here and
//! vice versa.

use bigsqs_core::ReceivedMessage;
use serde::Serialize;
use serde_json::{Map, Value};

/// Type tag identifying a pointer record
pub const POINTER_TYPE_TAG: &str = "com.amazon.sqs.javamessaging.MessageS3Pointer";

const BUCKET_FIELD: &str = "s3BucketName";
const KEY_FIELD: &str = "s3Key";

/// Location of an externalized payload
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct S3Pointer {
    pub bucket_name: String,
    pub key: String,
}

/// What a message body turned out to be
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PointerBody {
    /// Not a pointer record; deliver as is
    Plain,
    /// A well-formed pointer record
    Pointer(S3Pointer),
    /// Shaped like a pointer record, but a location field is not a string
    Malformed(String),
}

impl S3Pointer {
    pub fn new(bucket_name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket_name: bucket_name.into(),
            key: key.into(),
        }
    }

    /// Render as a queue message body
    pub fn to_body(&self) -> String {
        format!(
            "[{}, {{\"{}\": {}, \"{}\": {}}}]",
            Value::from(POINTER_TYPE_TAG),
            BUCKET_FIELD,
            Value::from(self.bucket_name.as_str()),
            KEY_FIELD,
            Value::from(self.key.as_str()),
        )
    }

    /// Parse a well-formed pointer record out of a message body
    pub fn parse(body: &str) -> Option<Self> {
        match PointerBody::inspect(body) {
            PointerBody::Pointer(pointer) => Some(pointer),
            PointerBody::Plain | PointerBody::Malformed(_) => None,
        }
    }
}

impl PointerBody {
    /// Classify a message body. Never fails: anything that does not parse,
    /// or parses to a different shape, is [`PointerBody::Plain`].
    pub fn inspect(body: &str) -> Self {
        let Ok(value) = serde_json::from_str::<Value>(body) else {
            return Self::Plain;
        };
        let Some(location) = pointer_location(&value) else {
            return Self::Plain;
        };

        let bucket = location.get(BUCKET_FIELD).and_then(Value::as_str);
        let key = location.get(KEY_FIELD).and_then(Value::as_str);
        match (bucket, key) {
            (Some(bucket), Some(key)) => Self::Pointer(S3Pointer::new(bucket, key)),
            _ => Self::Malformed(format!(
                "{} and {} must be strings",
                BUCKET_FIELD, KEY_FIELD
            )),
        }
    }
}

/// The location object of a pointer-shaped value: a two-element array whose
/// first element is the type tag and whose second is an object carrying
/// both location fields.
fn pointer_location(value: &Value) -> Option<&Map<String, Value>> {
    match value.as_array()?.as_slice() {
        [Value::String(tag), Value::Object(location)]
            if tag == POINTER_TYPE_TAG
                && location.contains_key(BUCKET_FIELD)
                && location.contains_key(KEY_FIELD) =>
        {
            Some(location)
        }
        _ => None,
    }
}

/// Whether a message body is a pointer record
pub fn is_pointer_body(body: &str) -> bool {
    serde_json::from_str::<Value>(body)
        .ok()
        .as_ref()
        .and_then(pointer_location)
        .is_some()
}

/// Whether a received message carries a pointer record instead of its payload
pub fn is_s3_pointer(message: &ReceivedMessage) -> bool {
    is_pointer_body(&message.body)
}
