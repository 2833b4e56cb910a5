//! Core types and traits for BigSQS
//!
//! This crate provides the narrow collaborator surface the adapter talks to:
//! a queue client, a blob client, the message types flowing through them and
//! the errors they raise.

pub mod client;
pub mod error;
pub mod types;

pub use client::{BlobClient, QueueClient};
pub use error::{BlobError, QueueError};
pub use types::{
    DeleteMessageOutput, MessageAttributeValue, ReceiveMessageOutput, ReceiveMessageRequest,
    ReceivedMessage, ResponseMetadata, SendMessageOutput, SendMessageRequest,
};
