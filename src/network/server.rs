//! ProtoMUD Server
//!
//! The server accepts connections from clients and hands each one to a
//! [`ConnectionHandler`] running on its own task.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, RwLock, Semaphore};

use super::connection::Connection;
use super::handler::{ConnectionHandler, HandlerError};
use super::NetworkConfig;
use crate::protocol::ClientId;
use crate::state::{ClientRegistry, Player, PlayerStore};

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Server already running")]
    AlreadyRunning,

    #[error("Server not running")]
    NotRunning,

    #[error("Bind failed: {0}")]
    BindFailed(String),
}

pub type ServerResult<T> = Result<T, ServerError>;

/// Events emitted by the server
#[derive(Debug, Clone)]
pub enum ServerEvent {
    /// Server started
    Started { bind_addr: SocketAddr },
    /// A movement arrived and its sender was recorded
    ClientSeen {
        client_id: ClientId,
        host: IpAddr,
        registered: usize,
    },
    /// A player's stored position changed
    PlayerMoved { client_id: ClientId, player: Player },
    /// A connection was dropped because of an error
    HandlerFailed { peer: SocketAddr, error: String },
    /// The accept loop ended
    Stopped,
}

/// ProtoMUD Server
pub struct Server {
    /// Server configuration
    config: NetworkConfig,
    /// Shared per-connection handler state
    handler: ConnectionHandler,
    /// Event sender
    event_tx: mpsc::Sender<ServerEvent>,
    /// Event receiver (for consumers)
    event_rx: Option<mpsc::Receiver<ServerEvent>>,
    /// Shutdown signal
    shutdown_tx: Option<mpsc::Sender<()>>,
    /// Whether the accept loop is running
    running: Arc<RwLock<bool>>,
}

impl Server {
    /// Create a new server backed by `store`
    pub fn new(config: NetworkConfig, store: PlayerStore) -> Self {
        let (event_tx, event_rx) = mpsc::channel(256);
        let handler = ConnectionHandler::new(
            Arc::new(ClientRegistry::new()),
            Arc::new(store),
            event_tx.clone(),
            Duration::from_millis(config.idle_timeout_ms),
        );

        Self {
            config,
            handler,
            event_tx,
            event_rx: Some(event_rx),
            shutdown_tx: None,
            running: Arc::new(RwLock::new(false)),
        }
    }

    /// Take the event receiver (can only be called once)
    pub fn take_event_receiver(&mut self) -> Option<mpsc::Receiver<ServerEvent>> {
        self.event_rx.take()
    }

    /// Bind the listener and start accepting connections.
    ///
    /// Returns the bound address. A bind failure is fatal.
    pub async fn start(&mut self) -> ServerResult<SocketAddr> {
        if *self.running.read().await {
            return Err(ServerError::AlreadyRunning);
        }

        let bind_addr = format!("{}:{}", self.config.bind_address, self.config.port);
        let listener = TcpListener::bind(&bind_addr).await.map_err(|e| {
            ServerError::BindFailed(format!("Failed to bind to {}: {}", bind_addr, e))
        })?;

        let local_addr = listener.local_addr()?;
        tracing::info!("Server listening on {}", local_addr);

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        self.shutdown_tx = Some(shutdown_tx);

        *self.running.write().await = true;

        let _ = self.event_tx.try_send(ServerEvent::Started {
            bind_addr: local_addr,
        });

        let handler = self.handler.clone();
        let event_tx = self.event_tx.clone();
        let running = self.running.clone();
        let limit = Arc::new(Semaphore::new(self.config.max_connections.max(1)));
        let max_message_size = self.config.max_message_size;

        // Spawn the accept loop
        tokio::spawn(async move {
            loop {
                // Wait for a free slot before accepting more work
                let permit = tokio::select! {
                    permit = limit.clone().acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => break,
                    },
                    _ = shutdown_rx.recv() => {
                        tracing::info!("Server shutdown requested");
                        break;
                    }
                };

                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, addr)) => {
                                tracing::debug!("New connection from {}", addr);

                                let handler = handler.clone();
                                let event_tx = event_tx.clone();

                                tokio::spawn(async move {
                                    let _permit = permit;
                                    let mut conn = Connection::new(stream, addr)
                                        .with_max_message_size(max_message_size);

                                    let result = handler.handle(&mut conn).await;
                                    let stats = conn.stats();
                                    match result {
                                        Ok(applied) => {
                                            tracing::debug!(
                                                "{} closed after {} movements, {} bytes",
                                                addr,
                                                applied,
                                                stats.bytes_received
                                            );
                                        }
                                        Err(e) => {
                                            tracing::debug!(
                                                "{} failed after {} frames",
                                                addr,
                                                stats.messages_received
                                            );
                                            report_failure(&e, addr);
                                            let _ = event_tx.try_send(ServerEvent::HandlerFailed {
                                                peer: addr,
                                                error: e.to_string(),
                                            });
                                        }
                                    }

                                    let _ = conn.close().await;
                                });
                            }
                            Err(e) => {
                                tracing::error!("Error accepting connection: {}", e);
                                break;
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        tracing::info!("Server shutdown requested");
                        break;
                    }
                }
            }

            *running.write().await = false;

            let _ = event_tx.send(ServerEvent::Stopped).await;
        });

        Ok(local_addr)
    }

    /// Stop accepting connections. Handlers already running finish on their own.
    pub async fn stop(&mut self) -> ServerResult<()> {
        if !*self.running.read().await {
            return Err(ServerError::NotRunning);
        }

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }

        Ok(())
    }

    /// Check if the server is running
    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Every client id seen since the server was created
    pub fn registry(&self) -> &Arc<ClientRegistry> {
        self.handler.registry()
    }

    #[cfg(test)]
    pub fn store(&self) -> &Arc<PlayerStore> {
        self.handler.store()
    }
}

fn report_failure(error: &HandlerError, addr: SocketAddr) {
    match error {
        HandlerError::Decode(e) => {
            tracing::warn!("Error decoding movement from {}: {}", addr, e)
        }
        HandlerError::Storage(e) => {
            tracing::error!("Error updating player data for {}: {}", addr, e)
        }
        HandlerError::Connection(e) => {
            tracing::warn!("Error reading from {}: {}", addr, e)
        }
    }
}
