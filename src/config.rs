//! Configuration for the offline core
//!
//! One aggregate document wires the whole layer: API endpoint, tenant scope,
//! TTL overrides, extra cache exemptions, and the edge cache block. The
//! default value is fully usable without a file.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cache::TtlPolicy;
use crate::edge::EdgeConfig;
use crate::error::{ConfigError, Result};

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OfflineConfig {
    /// Billing API base URL
    pub api_base_url: String,

    /// Per-attempt request timeout in seconds
    pub request_timeout_secs: u64,

    /// Tenant all cached entries are scoped to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seller_id: Option<String>,

    /// TTL table overrides
    pub ttl: TtlPolicy,

    /// Extra cache-exempt path substrings, on top of the built-ins
    pub exempt_endpoints: Vec<String>,

    /// Edge cache settings
    pub edge: EdgeConfig,
}

impl Default for OfflineConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.tillsync.app".to_string(),
            request_timeout_secs: 30,
            seller_id: None,
            ttl: TtlPolicy::default(),
            exempt_endpoints: Vec::new(),
            edge: EdgeConfig::default(),
        }
    }
}

impl OfflineConfig {
    /// Load configuration from a YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;
        Self::from_yaml(&text)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(text).map_err(ConfigError::from)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_default_is_usable() {
        let config = OfflineConfig::default();
        assert!(config.api_base_url.starts_with("https://"));
        assert_eq!(config.request_timeout_secs, 30);
        assert!(config.exempt_endpoints.is_empty());
        assert_eq!(config.edge.api_prefix, "/api/");
    }

    #[test]
    fn test_partial_yaml_overrides() {
        let config = OfflineConfig::from_yaml(
            r#"
api_base_url: "https://staging.tillsync.app"
seller_id: "seller-42"
ttl:
  products: 45
exempt_endpoints:
  - "live-stock"
edge:
  version: "2.7.0"
"#,
        )
        .unwrap();

        assert_eq!(config.api_base_url, "https://staging.tillsync.app");
        assert_eq!(config.seller_id.as_deref(), Some("seller-42"));
        assert_eq!(config.ttl.products, Duration::from_secs(45));
        // Untouched TTLs keep their defaults.
        assert_eq!(config.ttl.orders, Duration::from_secs(120));
        assert_eq!(config.exempt_endpoints, vec!["live-stock".to_string()]);
        assert_eq!(config.edge.version, "2.7.0");
        // Nested defaults survive a partial edge block.
        assert_eq!(config.edge.offline_page, "/offline.html");
    }

    #[test]
    fn test_yaml_round_trip() {
        let config = OfflineConfig::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed = OfflineConfig::from_yaml(&yaml).unwrap();
        assert_eq!(parsed.api_base_url, config.api_base_url);
        assert_eq!(parsed.ttl, config.ttl);
    }

    #[test]
    fn test_malformed_yaml_maps_to_parse_error() {
        let err = OfflineConfig::from_yaml("api_base_url: [nope").unwrap_err();
        match err {
            crate::error::Error::Config(ConfigError::ParseError(_)) => (),
            other => panic!("Expected ConfigError::ParseError, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_file_maps_to_not_found() {
        let err = OfflineConfig::from_file(Path::new("/nonexistent/tillsync.yml")).unwrap_err();
        match err {
            crate::error::Error::Config(ConfigError::NotFound) => (),
            other => panic!("Expected ConfigError::NotFound, got {:?}", other),
        }
    }
}
