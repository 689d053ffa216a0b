//! Network module - Handles TCP communication between client and server
//!
//! Provides:
//! - Server for accepting incoming connections
//! - Per-connection movement handler
//! - Client for streaming movements to a server
//! - Framed connections

mod client;
mod connection;
mod handler;
mod server;

pub use client::*;
pub use connection::*;
pub use server::*;

use std::net::SocketAddr;

use crate::config::Config;

/// Configuration for network operations
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Port to listen on or connect to
    pub port: u16,
    /// Interface to bind to
    pub bind_address: String,
    /// Maximum concurrently served connections
    pub max_connections: usize,
    /// How long a connection may sit idle between movements, in milliseconds
    pub idle_timeout_ms: u64,
    /// Connection timeout in milliseconds
    pub connect_timeout_ms: u64,
    /// Maximum frame payload size
    pub max_message_size: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            port: crate::protocol::DEFAULT_PORT,
            bind_address: "0.0.0.0".to_string(),
            max_connections: 1024,
            idle_timeout_ms: 300_000,
            connect_timeout_ms: 5000,
            max_message_size: crate::protocol::DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

impl NetworkConfig {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            ..Default::default()
        }
    }

    /// Server-side settings from the configuration file
    pub fn for_server(config: &Config) -> Self {
        Self {
            max_connections: config.server.max_connections,
            idle_timeout_ms: config.server.idle_timeout_ms,
            max_message_size: config.server.max_message_size,
            ..Self::new(config.server.port).with_bind_address(config.server.bind_address.as_str())
        }
    }

    /// Client-side settings from the configuration file
    pub fn for_client(config: &Config) -> Self {
        Self {
            connect_timeout_ms: config.client.connect_timeout_ms,
            ..Self::new(config.client.port)
        }
    }

    pub fn with_bind_address(mut self, bind_address: impl Into<String>) -> Self {
        self.bind_address = bind_address.into();
        self
    }
}

/// Resolve a hostname to a socket address
pub async fn resolve_host(host: &str, port: u16) -> std::io::Result<SocketAddr> {
    use tokio::net::lookup_host;

    let addr_string = format!("{}:{}", host, port);
    let mut addrs = lookup_host(&addr_string).await?;

    addrs.next().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Could not resolve host: {}", host),
        )
    })
}
