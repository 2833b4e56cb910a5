//! Constructors building AWS SDK clients

use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_sqs::config::Credentials;
use bigsqs_s3::S3BlobClient;
use bigsqs_sqs::SqsQueueClient;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use tracing::info;

use crate::adapter::BigSqsClient;
use crate::config::AdapterConfig;
use crate::error::Result;

/// Explicit AWS credentials
#[derive(Clone, Deserialize)]
pub struct AwsCredentials {
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    #[serde(default)]
    pub session_token: Option<String>,
    /// Custom endpoint for S3/SQS-compatible services
    #[serde(default)]
    pub endpoint_url: Option<String>,
}

impl fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("region", &self.region)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"** redacted **")
            .field("endpoint_url", &self.endpoint_url)
            .finish_non_exhaustive()
    }
}

impl AwsCredentials {
    pub fn new(
        region: impl Into<String>,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        Self {
            region: region.into(),
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
            endpoint_url: None,
        }
    }

    pub fn with_endpoint_url(mut self, endpoint_url: impl Into<String>) -> Self {
        self.endpoint_url = Some(endpoint_url.into());
        self
    }
}

/// Where to reach AWS, independent of how credentials are found
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AwsEndpoint {
    /// Falls back to the default region chain when unset
    #[serde(default)]
    pub region: Option<String>,
    /// Custom endpoint for S3/SQS-compatible services
    #[serde(default)]
    pub endpoint_url: Option<String>,
}

async fn load_sdk_config(endpoint: AwsEndpoint, credentials: Option<Credentials>) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(region) = endpoint.region {
        loader = loader.region(Region::new(region));
    }
    if let Some(credentials) = credentials {
        loader = loader.credentials_provider(credentials);
    }
    if let Some(endpoint_url) = endpoint.endpoint_url {
        loader = loader.endpoint_url(endpoint_url);
    }
    loader.load().await
}

impl BigSqsClient {
    /// Build a client from explicit credentials
    pub async fn from_aws_creds(credentials: AwsCredentials, config: AdapterConfig) -> Result<Self> {
        let provider = Credentials::new(
            credentials.access_key_id,
            credentials.secret_access_key,
            credentials.session_token,
            None,
            "bigsqs",
        );
        let endpoint = AwsEndpoint {
            region: Some(credentials.region),
            endpoint_url: credentials.endpoint_url,
        };

        let sdk_config = load_sdk_config(endpoint, Some(provider)).await;
        Self::from_sdk_config(&sdk_config, config)
    }

    /// Build a client from the default credential chain (environment,
    /// profile, instance metadata)
    pub async fn from_default_aws_creds(config: AdapterConfig) -> Result<Self> {
        Self::from_default_aws_creds_at(AwsEndpoint::default(), config).await
    }

    /// Like [`from_default_aws_creds`](Self::from_default_aws_creds), with an
    /// explicit region and endpoint
    pub async fn from_default_aws_creds_at(
        endpoint: AwsEndpoint,
        config: AdapterConfig,
    ) -> Result<Self> {
        let sdk_config = load_sdk_config(endpoint, None).await;
        Self::from_sdk_config(&sdk_config, config)
    }

    /// Build a client from an already loaded SDK configuration
    pub fn from_sdk_config(sdk_config: &SdkConfig, config: AdapterConfig) -> Result<Self> {
        let sqs = aws_sdk_sqs::Client::new(sdk_config);
        // Custom endpoints are usually S3-compatible stores that need path-style addressing
        let s3 = aws_sdk_s3::Client::from_conf(
            aws_sdk_s3::config::Builder::from(sdk_config)
                .force_path_style(sdk_config.endpoint_url().is_some())
                .build(),
        );

        info!(
            queue = %config.queue_url,
            bucket = %config.bucket_name,
            region = ?sdk_config.region(),
            "Created AWS-backed BigSQS client"
        );
        Self::new(
            Arc::new(SqsQueueClient::new(sqs)),
            Arc::new(S3BlobClient::new(s3)),
            config,
        )
    }
}
