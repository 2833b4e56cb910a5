//! Collaborator error types
//!
//! These are what the queue and blob clients raise. The adapter passes them
//! through untouched, so a caller can always match on the collaborator's own
//! variant and code.

use thiserror::Error;

/// Boxed source error from an underlying SDK or transport
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by a [`QueueClient`](crate::QueueClient)
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Queue does not exist: {0}")]
    QueueNotFound(String),

    #[error("Receipt handle is invalid: {0}")]
    ReceiptHandleIsInvalid(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("{code}: {message}")]
    Service { code: String, message: String },

    #[error("Queue transport error: {0}")]
    Transport(#[source] BoxError),
}

impl QueueError {
    pub fn service(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Service {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn transport(err: impl Into<BoxError>) -> Self {
        Self::Transport(err.into())
    }

    /// SQS-style error code
    pub fn code(&self) -> &str {
        match self {
            Self::QueueNotFound(_) => "AWS.SimpleQueueService.NonExistentQueue",
            Self::ReceiptHandleIsInvalid(_) => "ReceiptHandleIsInvalid",
            Self::InvalidParameter(_) => "InvalidParameterValue",
            Self::Service { code, .. } => code,
            Self::Transport(_) => "TransportError",
        }
    }
}

/// Errors raised by a [`BlobClient`](crate::BlobClient)
#[derive(Debug, Error)]
pub enum BlobError {
    #[error("Bucket not found: {0}")]
    BucketNotFound(String),

    #[error("Object not found: {bucket}/{key}")]
    ObjectNotFound { bucket: String, key: String },

    #[error("{code}: {message}")]
    Service { code: String, message: String },

    #[error("Blob transport error: {0}")]
    Transport(#[source] BoxError),
}

impl BlobError {
    pub fn service(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Service {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn transport(err: impl Into<BoxError>) -> Self {
        Self::Transport(err.into())
    }

    /// S3-style error code
    pub fn code(&self) -> &str {
        match self {
            Self::BucketNotFound(_) => "NoSuchBucket",
            Self::ObjectNotFound { .. } => "NoSuchKey",
            Self::Service { code, .. } => code,
            Self::Transport(_) => "TransportError",
        }
    }
}
