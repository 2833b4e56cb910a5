//! SQS queue clients for BigSQS
//!
//! Provides two implementations of [`bigsqs_core::QueueClient`]:
//! - [`SqsQueueClient`] talks to Amazon SQS through the AWS SDK
//! - [`MemoryQueue`] is an in-process emulation with visibility timeouts,
//!   deduplication and the 256 KiB message size cap

mod aws;
mod memory;

pub use aws::SqsQueueClient;
pub use memory::{md5_hex, queue_name_from_url, MemoryQueue, Queue, DEFAULT_MAXIMUM_MESSAGE_SIZE};
