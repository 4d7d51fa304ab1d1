//! Configuration for the registry and the WebSocket server
//!
//! Values come from defaults, an optional TOML file, and CLI flags, in
//! increasing order of precedence. Every field has a default so a partial
//! file is valid.

use crate::error::{PubSubError, Result};
use crate::subscriber::DEFAULT_SUBSCRIBER_CAPACITY;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings applied to topics created by a [`Registry`](crate::Registry)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RegistryConfig {
    /// Let every publisher send (`false` enables single-publisher arbitration)
    pub multi_publisher: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            multi_publisher: true,
        }
    }
}

/// Settings for the HTTP/WebSocket front end
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerConfig {
    /// Address to bind
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Per-connection subscriber buffer, in events
    pub subscriber_capacity: usize,

    /// Publisher mode for auto-created topics
    pub multi_publisher: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            subscriber_capacity: DEFAULT_SUBSCRIBER_CAPACITY,
            multi_publisher: true,
        }
    }
}

impl ServerConfig {
    /// Parse a TOML document
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: ServerConfig = toml::from_str(content)
            .map_err(|e| PubSubError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            PubSubError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        let config = Self::from_toml(&content)?;
        tracing::debug!(path = %path.display(), "Config loaded");
        Ok(config)
    }

    /// Reject values the server cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(PubSubError::Config("port must be non-zero".to_string()));
        }
        if self.subscriber_capacity == 0 {
            return Err(PubSubError::Config(
                "subscriberCapacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// `host:port` string for binding
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Registry settings derived from this config
    pub fn registry(&self) -> RegistryConfig {
        RegistryConfig {
            multi_publisher: self.multi_publisher,
        }
    }
}
