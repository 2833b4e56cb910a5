//! Adapter configuration

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{BigSqsError, Result};

/// Largest message SQS accepts, in bytes
pub const MAX_SQS_MESSAGE_SIZE: usize = 262_144;

/// Long-poll window used by receives, in seconds
pub const DEFAULT_WAIT_TIME_SECONDS: i32 = 20;

/// What an acknowledgement does when the queue delete succeeds but the
/// payload delete fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrphanPolicy {
    /// Return [`BigSqsError::OrphanedBlob`]
    #[default]
    Fail,
    /// Log a warning and report the queue delete as the result
    Warn,
}

impl FromStr for OrphanPolicy {
    type Err = BigSqsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "fail" => Ok(Self::Fail),
            "warn" => Ok(Self::Warn),
            other => Err(BigSqsError::InvalidArgument(format!(
                "unknown orphan policy '{other}', expected 'fail' or 'warn'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterConfig {
    pub queue_url: String,

    /// Bucket receiving oversize payloads
    pub bucket_name: String,

    /// Payloads whose UTF-8 length exceeds this many bytes go to S3
    #[serde(default = "default_size_threshold")]
    pub size_threshold: usize,

    #[serde(default = "default_wait_time_seconds")]
    pub wait_time_seconds: i32,

    #[serde(default)]
    pub orphan_policy: OrphanPolicy,
}

fn default_size_threshold() -> usize {
    MAX_SQS_MESSAGE_SIZE
}

fn default_wait_time_seconds() -> i32 {
    DEFAULT_WAIT_TIME_SECONDS
}

impl AdapterConfig {
    pub fn new(queue_url: impl Into<String>, bucket_name: impl Into<String>) -> Self {
        Self {
            queue_url: queue_url.into(),
            bucket_name: bucket_name.into(),
            size_threshold: default_size_threshold(),
            wait_time_seconds: default_wait_time_seconds(),
            orphan_policy: OrphanPolicy::default(),
        }
    }

    pub fn with_size_threshold(mut self, size_threshold: usize) -> Self {
        self.size_threshold = size_threshold;
        self
    }

    pub fn with_wait_time_seconds(mut self, wait_time_seconds: i32) -> Self {
        self.wait_time_seconds = wait_time_seconds;
        self
    }

    pub fn with_orphan_policy(mut self, orphan_policy: OrphanPolicy) -> Self {
        self.orphan_policy = orphan_policy;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.queue_url.trim().is_empty() {
            return Err(BigSqsError::InvalidArgument(
                "queue_url must not be empty".to_string(),
            ));
        }
        if self.bucket_name.trim().is_empty() {
            return Err(BigSqsError::InvalidArgument(
                "bucket_name must not be empty".to_string(),
            ));
        }
        if !(0..=20).contains(&self.wait_time_seconds) {
            return Err(BigSqsError::InvalidArgument(format!(
                "wait_time_seconds must be between 0 and 20, got {}",
                self.wait_time_seconds
            )));
        }
        Ok(())
    }
}
