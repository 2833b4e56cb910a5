//! S3 blob clients for BigSQS
//!
//! [`S3BlobClient`] stores externalized payloads on Amazon S3 (or any
//! S3-compatible endpoint); [`MemoryBlobStore`] keeps them in process.

mod aws;
mod memory;

pub use aws::S3BlobClient;
pub use memory::{MemoryBlobStore, StoredObject};
