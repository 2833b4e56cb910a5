//! BigSQS: an SQS client for payloads larger than SQS allows
//!
//! Message bodies over a size threshold (256 KiB by default) are stored in
//! an S3 bucket and the queue carries a small pointer record instead. On
//! receive the pointer is resolved back into the payload; on delete the
//! payload object is removed along with the message.
//!
//! The pointer record uses the same layout as the Amazon SQS Extended Client
//! Library, so either side of a queue can be a Java consumer.
//!
//! ```rust,no_run
//! use bigsqs::{AdapterConfig, BigSqsClient};
//!
//! # async fn run() -> bigsqs::Result<()> {
//! let config = AdapterConfig::new(
//!     "https://sqs.eu-west-1.amazonaws.com/123456789012/reports.fifo",
//!     "report-payloads",
//! );
//! let client = BigSqsClient::from_default_aws_creds(config).await?;
//!
//! client.send_message("x".repeat(1_000_000)).await?;
//! let received = client.receive_messages(1, None).await?;
//! for message in &received.messages {
//!     client.delete_message(&message.receipt_handle).await?;
//! }
//! # Ok(())
//! # }
//! ```

mod adapter;
mod aws;
pub mod config;
mod error;
pub mod pointer;

pub use adapter::{utf8_len, BigSqsClient, OutgoingMessage, PAYLOAD_CONTENT_TYPE};
pub use aws::{AwsCredentials, AwsEndpoint};
pub use config::{AdapterConfig, OrphanPolicy, DEFAULT_WAIT_TIME_SECONDS, MAX_SQS_MESSAGE_SIZE};
pub use error::{BigSqsError, Result};
pub use pointer::{is_pointer_body, is_s3_pointer, PointerBody, S3Pointer, POINTER_TYPE_TAG};

pub use bigsqs_core::{
    BlobClient, BlobError, DeleteMessageOutput, MessageAttributeValue, QueueClient, QueueError,
    ReceiveMessageOutput, ReceivedMessage, ResponseMetadata, SendMessageOutput,
};
