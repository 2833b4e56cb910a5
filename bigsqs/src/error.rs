//! Adapter error type

use bigsqs_core::{BlobError, DeleteMessageOutput, QueueError, SendMessageOutput};
use thiserror::Error;

use crate::pointer::S3Pointer;

/// Errors from [`BigSqsClient`](crate::BigSqsClient) operations
///
/// Queue and blob failures are carried transparently: their `Display` and
/// `source()` are those of the collaborator error.
#[derive(Debug, Error)]
pub enum BigSqsError {
    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Blob(#[from] BlobError),

    #[error("Malformed S3 pointer in message {message_id}: {reason}")]
    MalformedPointer { message_id: String, reason: String },

    #[error("Payload at s3://{bucket}/{key} is not valid UTF-8")]
    InvalidUtf8 {
        bucket: String,
        key: String,
        #[source]
        source: std::string::FromUtf8Error,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A batch send stopped at message `index`; `sent` holds the results of
    /// the messages before it, which are already on the queue.
    #[error("Batch send failed at message {index} after {} sent: {source}", .sent.len())]
    Batch {
        index: usize,
        sent: Vec<SendMessageOutput>,
        #[source]
        source: Box<BigSqsError>,
    },

    /// The queue delete succeeded but the payload delete did not. The
    /// message is gone; the object it pointed to is not.
    #[error(
        "Message deleted but payload s3://{}/{} was not: {source}",
        .pointer.bucket_name,
        .pointer.key
    )]
    OrphanedBlob {
        pointer: S3Pointer,
        queue_output: DeleteMessageOutput,
        #[source]
        source: BlobError,
    },
}

pub type Result<T> = std::result::Result<T, BigSqsError>;

impl BigSqsError {
    /// Collaborator error code, for queue and blob failures
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Queue(e) => Some(e.code()),
            Self::Blob(e) | Self::OrphanedBlob { source: e, .. } => Some(e.code()),
            Self::Batch { source, .. } => source.code(),
            _ => None,
        }
    }
}
