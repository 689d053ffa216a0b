//! Configuration module
//!
//! Handles loading and saving ProtoMUD configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::protocol::{DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_PORT};

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Client settings
    #[serde(default)]
    pub client: ClientConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// Interface to bind to
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Directory holding one JSON record per player
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Connections served at once; further clients wait to be accepted
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Idle time allowed between movements before a connection is dropped (ms)
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_ms: u64,
    /// Largest accepted movement payload in bytes
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
}

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Server host to connect to
    #[serde(default = "default_server_host")]
    pub server_host: String,
    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory for the local player record, kept apart from the server's
    #[serde(default = "default_client_data_dir")]
    pub data_dir: PathBuf,
    /// Connection timeout in ms
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
    /// Fixed client id (generated at startup if not set)
    pub client_id: Option<String>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("userdata")
}

fn default_client_data_dir() -> PathBuf {
    PathBuf::from("userdata/client")
}

fn default_max_connections() -> usize {
    1024
}

fn default_idle_timeout() -> u64 {
    300_000
}

fn default_max_message_size() -> usize {
    DEFAULT_MAX_MESSAGE_SIZE
}

fn default_server_host() -> String {
    "localhost".to_string()
}

fn default_connect_timeout() -> u64 {
    5000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_bind_address(),
            data_dir: default_data_dir(),
            max_connections: default_max_connections(),
            idle_timeout_ms: default_idle_timeout(),
            max_message_size: default_max_message_size(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_host: default_server_host(),
            port: default_port(),
            data_dir: default_client_data_dir(),
            connect_timeout_ms: default_connect_timeout(),
            client_id: None,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the default location
    pub fn load_default() -> ConfigResult<Self> {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("protomud/config.toml")),
            Some(PathBuf::from("./protomud.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                tracing::debug!("Loading configuration from {}", path.display());
                return Self::load(path);
            }
        }

        Ok(Self::default())
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let contents = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, contents)?;
        Ok(())
    }
}

/// Configuration used as a starting point for new setups
pub fn sample_config() -> Config {
    Config {
        client: ClientConfig {
            server_host: "game.example.net".to_string(),
            client_id: Some("0042".to_string()),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Generate a sample configuration file
pub fn generate_sample_config() -> ConfigResult<String> {
    Ok(toml::to_string_pretty(&sample_config())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.client.port, DEFAULT_PORT);
        assert_eq!(config.server.max_message_size, DEFAULT_MAX_MESSAGE_SIZE);
        assert!(config.client.client_id.is_none());
    }

    #[test]
    fn test_client_and_server_data_dirs_differ() {
        let config = Config::default();
        assert_ne!(config.client.data_dir, config.server.data_dir);

        let parsed: Config = toml::from_str("").unwrap();
        assert_ne!(parsed.client.data_dir, parsed.server.data_dir);
        assert_eq!(parsed.client.data_dir, PathBuf::from("userdata/client"));
    }

    #[test]
    fn test_save_and_load() {
        let mut config = Config::default();
        config.server.port = 9000;
        let file = NamedTempFile::new().unwrap();

        config.save(file.path()).unwrap();

        let loaded = Config::load(file.path()).unwrap();
        assert_eq!(loaded.server.port, 9000);
        assert_eq!(loaded.server.data_dir, config.server.data_dir);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str("[server]\nport = 7000\n").unwrap();
        assert_eq!(config.server.port, 7000);
        assert_eq!(config.server.bind_address, "0.0.0.0");
        assert_eq!(config.client.server_host, "localhost");
    }

    #[test]
    fn test_missing_file() {
        let result = Config::load(Path::new("/nonexistent/protomud.toml"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_sample_config() {
        let sample = generate_sample_config().unwrap();
        let parsed: Config = toml::from_str(&sample).unwrap();
        assert_eq!(parsed.client.server_host, "game.example.net");
        assert_eq!(parsed.client.client_id.as_deref(), Some("0042"));
    }

    #[test]
    fn test_sample_config_saved_to_nested_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/protomud.toml");

        sample_config().save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.client.server_host, "game.example.net");
        assert_eq!(loaded.client.data_dir, PathBuf::from("userdata/client"));
    }
}
