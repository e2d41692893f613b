//! Gateway configuration

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default request body cap (5 GiB), clamped to the address space
pub const DEFAULT_MAX_BODY_SIZE: usize = {
    const LIMIT: u64 = 5 << 30;
    if LIMIT > usize::MAX as u64 {
        usize::MAX
    } else {
        LIMIT as usize
    }
};

/// Configuration rejected at startup
#[derive(Error, Debug, PartialEq, Eq)]
#[error("missing required setting: {0}")]
pub struct ConfigError(pub &'static str);

/// Gateway server configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// S3 bucket holding the files
    pub bucket: Option<String>,
    /// CloudFront distribution ID
    pub distribution_id: Option<String>,
    /// Public base URL of the CloudFront distribution
    pub distribution_url: Option<String>,
    /// AWS region override
    pub region: Option<String>,
    /// Use in-memory backends (for testing/development)
    pub use_memory_store: bool,
    /// Maximum request body size (bytes)
    pub max_body_size: usize,
    /// Connect timeout for edge fetches (seconds)
    pub edge_connect_timeout_secs: u64,
    /// Enable CORS
    pub cors_enabled: bool,
    /// CORS allowed origins
    pub cors_origins: Vec<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            bucket: None,
            distribution_id: None,
            distribution_url: None,
            region: None,
            use_memory_store: false,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            edge_connect_timeout_secs: 10,
            cors_enabled: true,
            cors_origins: vec!["*".to_string()],
        }
    }
}

impl GatewayConfig {
    /// Get the bind address
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check that the AWS settings are present unless running on memory
    /// backends
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.use_memory_store {
            return Ok(());
        }

        let required = [
            ("BUCKET", &self.bucket),
            ("DISTRIBUTION_ID", &self.distribution_id),
            ("DISTRIBUTION_URL", &self.distribution_url),
        ];
        for (name, value) in required {
            if value.as_deref().map_or(true, str::is_empty) {
                return Err(ConfigError(name));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aws_config() -> GatewayConfig {
        GatewayConfig {
            bucket: Some("assets".to_string()),
            distribution_id: Some("E2QWRUHEXAMPLE".to_string()),
            distribution_url: Some("https://d111111abcdef8.cloudfront.net".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.bind_addr(), "0.0.0.0:8080");
        assert!(config.cors_enabled);
        assert!(!config.use_memory_store);
    }

    #[test]
    fn test_default_body_limit_fits_usize() {
        let expected = u64::min(5 << 30, usize::MAX as u64);
        assert_eq!(GatewayConfig::default().max_body_size as u64, expected);
    }

    #[test]
    fn test_validate_aws_settings() {
        assert_eq!(aws_config().validate(), Ok(()));

        let config = GatewayConfig {
            bucket: Some(String::new()),
            ..aws_config()
        };
        assert_eq!(config.validate(), Err(ConfigError("BUCKET")));

        let config = GatewayConfig {
            distribution_url: None,
            ..aws_config()
        };
        assert_eq!(config.validate(), Err(ConfigError("DISTRIBUTION_URL")));
    }

    #[test]
    fn test_memory_mode_needs_no_aws_settings() {
        let config = GatewayConfig {
            use_memory_store: true,
            ..Default::default()
        };
        assert_eq!(config.validate(), Ok(()));
    }
}
