//! CloudFront edge cache: invalidations through the CloudFront API, reads
//! through the distribution's public URL.

use crate::{CachedObject, EdgeCache, Result, StoreError};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_cloudfront::error::DisplayErrorContext;
use aws_sdk_cloudfront::types::{InvalidationBatch, Paths};
use aws_sdk_cloudfront::Client;
use futures::{StreamExt, TryStreamExt};
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tracing::{debug, instrument};

/// Configuration for the CloudFront edge cache
#[derive(Clone, Debug)]
pub struct CloudFrontConfig {
    /// Distribution ID used for invalidations
    pub distribution_id: String,
    /// Public base URL of the distribution (e.g. "https://d111111abcdef8.cloudfront.net")
    pub distribution_url: String,
    /// Region override; the SDK default chain is used when unset
    pub region: Option<String>,
    /// Connect timeout for edge fetches. There is no overall timeout since
    /// bodies are streamed for as long as the client keeps reading.
    pub connect_timeout: Duration,
}

impl CloudFrontConfig {
    /// Create a config for the given distribution
    pub fn new(distribution_id: impl Into<String>, distribution_url: impl Into<String>) -> Self {
        Self {
            distribution_id: distribution_id.into(),
            distribution_url: distribution_url.into(),
            region: None,
            connect_timeout: Duration::from_secs(10),
        }
    }

    /// Set the region
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Set the connect timeout for edge fetches
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

/// Edge cache backed by a CloudFront distribution
#[derive(Clone)]
pub struct CloudFrontEdgeCache {
    client: Client,
    http: reqwest::Client,
    distribution_id: String,
    distribution_url: String,
}

impl CloudFrontEdgeCache {
    /// Create an edge cache, loading credentials from the AWS default chain
    pub async fn new(config: CloudFrontConfig) -> Result<Self> {
        if config.distribution_id.is_empty() || config.distribution_url.is_empty() {
            return Err(StoreError::Configuration(
                "distribution id or url cannot be empty".to_string(),
            ));
        }

        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = config.region {
            loader = loader.region(Region::new(region));
        }
        let sdk_config = loader.load().await;

        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        Ok(Self::from_parts(
            Client::new(&sdk_config),
            http,
            config.distribution_id,
            config.distribution_url,
        ))
    }

    /// Assemble from existing clients
    pub fn from_parts(
        client: Client,
        http: reqwest::Client,
        distribution_id: impl Into<String>,
        distribution_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            http,
            distribution_id: distribution_id.into(),
            distribution_url: distribution_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Distribution ID
    pub fn distribution_id(&self) -> &str {
        &self.distribution_id
    }

    /// URL the edge serves `key` from
    pub fn object_url(&self, key: &str) -> String {
        format!("{}{}", self.distribution_url, Self::encoded_path(key))
    }

    /// Percent-encoded `/{key}`, the form both fetches and invalidations use
    /// so that an invalidation matches the cached object.
    pub fn encoded_path(key: &str) -> String {
        format!("/{}", urlencoding::encode(key))
    }
}

#[async_trait]
impl EdgeCache for CloudFrontEdgeCache {
    #[instrument(skip(self))]
    async fn fetch(&self, key: &str) -> Result<CachedObject> {
        let response = self.http.get(self.object_url(key)).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::UnexpectedStatus {
                key: key.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let content_length = response.content_length();

        debug!(?content_length, content_type = %content_type, "Edge fetch started");

        let body = response
            .bytes_stream()
            .map_err(std::io::Error::other)
            .boxed();

        Ok(CachedObject {
            body,
            content_length,
            content_type,
        })
    }

    #[instrument(skip(self), fields(distribution_id = %self.distribution_id))]
    async fn invalidate(&self, path: &str, caller_reference: &str) -> Result<()> {
        let key = path.strip_prefix('/').unwrap_or(path);
        let paths = Paths::builder()
            .quantity(1)
            .items(Self::encoded_path(key))
            .build()
            .map_err(|e| StoreError::backend("CreateInvalidation", e))?;
        let batch = InvalidationBatch::builder()
            .paths(paths)
            .caller_reference(caller_reference)
            .build()
            .map_err(|e| StoreError::backend("CreateInvalidation", e))?;

        let output = self
            .client
            .create_invalidation()
            .distribution_id(&self.distribution_id)
            .invalidation_batch(batch)
            .send()
            .await
            .map_err(|e| StoreError::backend("CreateInvalidation", DisplayErrorContext(&e)))?;

        debug!(
            invalidation_id = output.invalidation().map(|i| i.id()).unwrap_or_default(),
            "Invalidation created"
        );
        Ok(())
    }
}
