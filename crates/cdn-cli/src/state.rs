//! Application state

use crate::config::GatewayConfig;
use anyhow::Context;
use cdn_core::FileGateway;
use cdn_store::{
    CloudFrontConfig, CloudFrontEdgeCache, FlexibleEdgeCache, FlexibleObjectStore,
    MemoryEdgeCache, MemoryObjectStore, S3Config, S3ObjectStore,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Gateway over the backends selected at startup
pub type Gateway = FileGateway<FlexibleObjectStore, FlexibleEdgeCache>;

/// Application state shared across handlers
pub struct AppState {
    /// Gateway configuration
    pub config: GatewayConfig,
    /// File gateway (S3 and CloudFront, or memory)
    pub gateway: Arc<Gateway>,
}

impl AppState {
    /// Create a new application state, connecting to AWS unless memory
    /// backends were requested
    pub async fn new(config: GatewayConfig) -> anyhow::Result<Self> {
        config.validate()?;

        let gateway = if config.use_memory_store {
            info!("Using in-memory backends (data will not persist)");
            Self::memory_gateway()
        } else {
            Self::aws_gateway(&config).await?
        };

        // Log storage mode
        if gateway.store().is_persistent() {
            info!("✓ Storage mode: S3 (persistent)");
        } else {
            warn!("⚠ Storage mode: In-memory (NOT persistent - for development only)");
        }

        Ok(Self::from_gateway(config, gateway))
    }

    /// Wrap an already built gateway
    pub fn from_gateway(config: GatewayConfig, gateway: Gateway) -> Self {
        Self {
            config,
            gateway: Arc::new(gateway),
        }
    }

    /// Gateway over a memory store and a memory edge reading through it
    pub fn memory_gateway() -> Gateway {
        let store = MemoryObjectStore::new();
        let edge = MemoryEdgeCache::new(store.clone());
        FileGateway::new(
            FlexibleObjectStore::Memory(store),
            FlexibleEdgeCache::Memory(edge),
        )
    }

    async fn aws_gateway(config: &GatewayConfig) -> anyhow::Result<Gateway> {
        let bucket = config.bucket.clone().unwrap_or_default();
        let distribution_id = config.distribution_id.clone().unwrap_or_default();
        let distribution_url = config.distribution_url.clone().unwrap_or_default();

        let mut s3_config = S3Config::new(&bucket);
        let mut edge_config = CloudFrontConfig::new(distribution_id, distribution_url)
            .with_connect_timeout(Duration::from_secs(config.edge_connect_timeout_secs));
        if let Some(region) = &config.region {
            s3_config = s3_config.with_region(region);
            edge_config = edge_config.with_region(region);
        }

        let store = S3ObjectStore::new(s3_config)
            .await
            .with_context(|| format!("failed to open bucket {}", bucket))?;
        info!(bucket = %bucket, "Connected to S3");

        let edge = CloudFrontEdgeCache::new(edge_config)
            .await
            .context("failed to configure CloudFront")?;
        info!(distribution_id = %edge.distribution_id(), "CloudFront configured");

        Ok(FileGateway::new(
            FlexibleObjectStore::S3(store),
            FlexibleEdgeCache::CloudFront(edge),
        ))
    }
}
