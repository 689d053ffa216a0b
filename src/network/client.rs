//! ProtoMUD Client
//!
//! Connects to a server and streams the operator's movements over a single
//! long-lived connection.

use std::io::Write;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use super::connection::{Connection, ConnectionError};
use super::NetworkConfig;
use crate::protocol::{ClientId, Movement};
use crate::state::{Player, PlayerStore, StoreError};

/// Client errors
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Connection timeout")]
    Timeout,
}

pub type ClientResult<T> = Result<T, ClientError>;

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The operator asked to stop
    Cancelled,
    /// No more input
    InputClosed,
    /// A movement could not be sent
    Disconnected,
}

/// ProtoMUD Client
pub struct Client {
    /// Client configuration
    config: NetworkConfig,
    /// Identifier sent with every movement
    client_id: ClientId,
    /// Whether to print the interactive prompt
    prompt: bool,
}

impl Client {
    /// Create a new client
    pub fn new(config: NetworkConfig, client_id: ClientId) -> Self {
        Self {
            config,
            client_id,
            prompt: false,
        }
    }

    /// Print a prompt before each direction is read
    pub fn interactive(mut self) -> Self {
        self.prompt = true;
        self
    }

    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    /// Write this client's local player record at the origin
    pub async fn initialize_local_player(&self, store: &PlayerStore) -> ClientResult<()> {
        store.put(&self.client_id, &Player::default()).await?;
        tracing::debug!(
            "Local player record written to {}",
            store.path_for(&self.client_id).display()
        );
        Ok(())
    }

    /// Connect to a server by address
    pub async fn connect(&self, server_addr: SocketAddr) -> ClientResult<Connection> {
        tracing::info!("Connecting to {}", server_addr);

        let stream = match tokio::time::timeout(
            Duration::from_millis(self.config.connect_timeout_ms),
            TcpStream::connect(server_addr),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(ClientError::Io(e)),
            Err(_) => return Err(ClientError::Timeout),
        };

        Ok(Connection::new(stream, server_addr))
    }

    /// Connect to a server by hostname
    pub async fn connect_hostname(&self, hostname: &str, port: u16) -> ClientResult<Connection> {
        let addr = super::resolve_host(hostname, port).await?;
        self.connect(addr).await
    }

    /// Send one movement per input line until input ends, sending fails or
    /// `shutdown` fires.
    ///
    /// Lines are trimmed and uppercased; blank lines are skipped. On every
    /// exit path the write half of `conn` is shut down.
    pub async fn run_session<S>(
        &self,
        conn: &mut Connection<S>,
        input: &mut mpsc::Receiver<String>,
        shutdown: &mut mpsc::Receiver<()>,
    ) -> ClientResult<SessionEnd>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let end = loop {
            self.print_prompt();

            let line = tokio::select! {
                line = input.recv() => line,
                Some(()) = shutdown.recv() => {
                    break SessionEnd::Cancelled;
                }
            };

            let Some(line) = line else {
                break SessionEnd::InputClosed;
            };

            let token = line.trim();
            if token.is_empty() {
                continue;
            }

            let movement = Movement::new(self.client_id.clone(), token);
            if let Err(e) = conn.send(&movement).await {
                tracing::error!("Error sending: {}", e);
                println!("Disconnected from server.");
                break SessionEnd::Disconnected;
            }
            tracing::info!(
                "Sent movement data to server: [{}] {}",
                movement.client_id,
                movement.direction
            );
        };

        if end == SessionEnd::Cancelled {
            println!("\nClosing connection...");
        }
        if let Err(e) = conn.close().await {
            tracing::debug!("Error closing connection: {}", e);
        }

        Ok(end)
    }

    fn print_prompt(&self) {
        if self.prompt {
            print!("Enter direction (W/A/S/D): ");
            let _ = std::io::stdout().flush();
        }
    }
}
