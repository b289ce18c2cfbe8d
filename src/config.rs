//! Configuration file parsing
//!
//! Parses TOML configuration for storage nodes and for the content backend
//! a front-end embeds.

use crate::client::ClientOptions;
use crate::node::NodeServerConfig;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Process settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Storage node daemon settings
    #[serde(default)]
    pub node: Option<NodeConfig>,

    /// Content backend for the Write/Read façade
    #[serde(default)]
    pub content: Option<ContentConfig>,

    /// Node-facing RPC client settings
    #[serde(default)]
    pub client: ClientConfig,
}

/// Process settings
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage node settings
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    /// Listen address (host:port)
    #[serde(default = "default_node_bind")]
    pub bind: String,

    /// Directory holding this node's files
    pub storage_root: PathBuf,
}

fn default_node_bind() -> String {
    "localhost:8090".to_string()
}

impl NodeConfig {
    pub fn server_config(&self) -> NodeServerConfig {
        NodeServerConfig {
            bind_addr: self.bind.clone(),
            storage_root: self.storage_root.clone(),
        }
    }
}

/// Backend type
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    Local,
    Network,
}

/// Content backend settings
#[derive(Debug, Clone, Deserialize)]
pub struct ContentConfig {
    pub backend: BackendType,

    #[serde(default)]
    pub local: Option<LocalBackendConfig>,

    #[serde(default)]
    pub network: Option<NetworkBackendConfig>,
}

/// Single-directory backend
#[derive(Debug, Clone, Deserialize)]
pub struct LocalBackendConfig {
    pub path: PathBuf,
}

/// Consistent-hash backend over storage nodes
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkBackendConfig {
    /// Where the admin protocol listens
    pub admin_bind: String,

    /// Storage node endpoints present at startup
    #[serde(default)]
    pub nodes: Vec<String>,
}

/// RPC client settings
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Per-call read/write deadline, 0 disables it
    #[serde(default = "default_io_timeout_ms")]
    pub io_timeout_ms: u64,

    #[serde(default = "default_max_idle")]
    pub max_idle_connections: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            io_timeout_ms: default_io_timeout_ms(),
            max_idle_connections: default_max_idle(),
        }
    }
}

fn default_connect_timeout_ms() -> u64 {
    2000
}

fn default_io_timeout_ms() -> u64 {
    30_000
}

fn default_max_idle() -> usize {
    4
}

impl ClientConfig {
    pub fn options(&self) -> ClientOptions {
        ClientOptions {
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            io_timeout: (self.io_timeout_ms > 0).then(|| Duration::from_millis(self.io_timeout_ms)),
            max_idle: self.max_idle_connections,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a string
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    fn validate(&self) -> Result<(), ConfigError> {
        if self.client.connect_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "client.connect_timeout_ms must be positive".to_string(),
            ));
        }

        let Some(content) = &self.content else {
            return Ok(());
        };

        match content.backend {
            BackendType::Local => {
                if content.local.is_none() {
                    return Err(ConfigError::Invalid(
                        "local backend requires a [content.local] section".to_string(),
                    ));
                }
            }
            BackendType::Network => {
                let network = content.network.as_ref().ok_or_else(|| {
                    ConfigError::Invalid(
                        "network backend requires a [content.network] section".to_string(),
                    )
                })?;

                let mut seen = HashSet::new();
                for node in &network.nodes {
                    if node.trim().is_empty() {
                        return Err(ConfigError::Invalid("empty node endpoint".to_string()));
                    }
                    if !seen.insert(node.as_str()) {
                        return Err(ConfigError::Invalid(format!(
                            "duplicate node endpoint: {}",
                            node
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_node_config() {
        let config_str = r#"
[node]
bind = "0.0.0.0:8090"
storage_root = "/data/node1"
"#;

        let config = Config::parse(config_str).unwrap();
        assert_eq!(config.server.log_level, "info");
        let node = config.node.unwrap();
        assert_eq!(node.bind, "0.0.0.0:8090");
        assert_eq!(node.server_config().storage_root, PathBuf::from("/data/node1"));
        assert!(config.content.is_none());
    }

    #[test]
    fn test_parse_network_backend() {
        let config_str = r#"
[server]
log_level = "debug"

[content]
backend = "network"

[content.network]
admin_bind = "127.0.0.1:8081"
nodes = ["127.0.0.1:8090", "127.0.0.1:8091"]

[client]
connect_timeout_ms = 500
io_timeout_ms = 0
"#;

        let config = Config::parse(config_str).unwrap();
        assert_eq!(config.server.log_level, "debug");
        let content = config.content.unwrap();
        assert_eq!(content.backend, BackendType::Network);
        assert_eq!(content.network.unwrap().nodes.len(), 2);

        let options = config.client.options();
        assert_eq!(options.connect_timeout, Duration::from_millis(500));
        assert_eq!(options.io_timeout, None);
        assert_eq!(options.max_idle, 4);
    }

    #[test]
    fn test_duplicate_node_error() {
        let config_str = r#"
[content]
backend = "network"

[content.network]
admin_bind = "127.0.0.1:8081"
nodes = ["127.0.0.1:8090", "127.0.0.1:8090"]
"#;

        let result = Config::parse(config_str);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_missing_backend_section_error() {
        let config_str = r#"
[content]
backend = "local"
"#;

        let result = Config::parse(config_str);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_unknown_backend_is_parse_error() {
        let config_str = r#"
[content]
backend = "etcd"
"#;

        let result = Config::parse(config_str);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
