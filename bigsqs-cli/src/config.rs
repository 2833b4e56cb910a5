//! Configuration management

use bigsqs::{AdapterConfig, AwsCredentials, AwsEndpoint, OrphanPolicy, DEFAULT_WAIT_TIME_SECONDS};
use serde::Deserialize;

/// Settings read from `bigsqs.toml` and `BIGSQS_*` variables
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub queue_url: Option<String>,

    #[serde(default)]
    pub bucket: Option<String>,

    #[serde(default)]
    pub threshold: Option<usize>,

    #[serde(default)]
    pub wait_time_seconds: Option<i32>,

    #[serde(default)]
    pub orphan_policy: Option<OrphanPolicy>,

    #[serde(default)]
    pub aws: AwsConfig,
}

#[derive(Debug, Deserialize, Default)]
pub struct AwsConfig {
    pub region: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
    pub endpoint_url: Option<String>,
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("bigsqs").required(false))
            .add_source(
                config::Environment::with_prefix("BIGSQS")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        Ok(config.try_deserialize::<Config>()?)
    }

    pub fn adapter_config(&self) -> anyhow::Result<AdapterConfig> {
        let queue_url = self
            .queue_url
            .clone()
            .ok_or_else(|| anyhow::anyhow!("no queue URL given, pass --queue-url"))?;
        let bucket = self
            .bucket
            .clone()
            .ok_or_else(|| anyhow::anyhow!("no bucket given, pass --bucket"))?;

        let mut adapter = AdapterConfig::new(queue_url, bucket)
            .with_wait_time_seconds(self.wait_time_seconds.unwrap_or(DEFAULT_WAIT_TIME_SECONDS))
            .with_orphan_policy(self.orphan_policy.unwrap_or_default());
        if let Some(threshold) = self.threshold {
            adapter = adapter.with_size_threshold(threshold);
        }
        Ok(adapter)
    }

    /// Explicit credentials, when both keys are known
    pub fn credentials(&self) -> Option<AwsCredentials> {
        let (Some(access_key_id), Some(secret_access_key)) =
            (&self.aws.access_key_id, &self.aws.secret_access_key)
        else {
            return None;
        };

        let region = self.aws.region.as_deref().unwrap_or("us-east-1");
        let mut credentials = AwsCredentials::new(region, access_key_id, secret_access_key);
        credentials.session_token = self.aws.session_token.clone();
        credentials.endpoint_url = self.aws.endpoint_url.clone();
        Some(credentials)
    }

    /// Region and endpoint for the default credential chain
    pub fn endpoint(&self) -> AwsEndpoint {
        AwsEndpoint {
            region: self.aws.region.clone(),
            endpoint_url: self.aws.endpoint_url.clone(),
        }
    }
}
