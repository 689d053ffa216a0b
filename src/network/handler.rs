//! Per-connection movement handling
//!
//! Each accepted connection is read frame by frame until the client goes
//! away. Every movement updates the client registry and the player's stored
//! position. Nothing is ever written back to the client.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;

use super::connection::{Connection, ConnectionError};
use super::server::ServerEvent;
use crate::protocol::{CodecError, Movement};
use crate::state::{ClientRegistry, Player, PlayerStore, StoreError};

/// Errors that end a single connection
#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("Connection error: {0}")]
    Connection(ConnectionError),

    #[error("Decode error: {0}")]
    Decode(#[from] CodecError),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl From<ConnectionError> for HandlerError {
    fn from(e: ConnectionError) -> Self {
        match e {
            ConnectionError::Protocol(e) => HandlerError::Decode(e),
            other => HandlerError::Connection(other),
        }
    }
}

/// Shared state every connection handler works against
#[derive(Clone)]
pub struct ConnectionHandler {
    registry: Arc<ClientRegistry>,
    store: Arc<PlayerStore>,
    event_tx: mpsc::Sender<ServerEvent>,
    idle_timeout: Duration,
}

impl ConnectionHandler {
    pub fn new(
        registry: Arc<ClientRegistry>,
        store: Arc<PlayerStore>,
        event_tx: mpsc::Sender<ServerEvent>,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            store,
            event_tx,
            idle_timeout,
        }
    }

    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    #[cfg(test)]
    pub fn store(&self) -> &Arc<PlayerStore> {
        &self.store
    }

    /// Serve one connection until the peer closes it.
    ///
    /// Returns the number of movements applied. Any error aborts this
    /// connection only; state changes from earlier movements are kept.
    pub async fn handle<S>(&self, conn: &mut Connection<S>) -> Result<u64, HandlerError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let host = conn.peer_host();
        let mut applied = 0;

        while let Some(movement) = conn.recv_timeout(self.idle_timeout).await? {
            self.apply(movement, host).await?;
            applied += 1;
        }

        Ok(applied)
    }

    /// Record who sent `movement` and move their player
    pub async fn apply(&self, movement: Movement, host: IpAddr) -> Result<Player, HandlerError> {
        let Movement {
            client_id,
            direction,
        } = movement;

        let registered = self.registry.upsert(client_id.clone(), host).await;
        tracing::info!(
            "Client connected [{}]: {} | Amount of users connected: [{}]",
            client_id,
            host,
            registered
        );
        let _ = self.event_tx.try_send(ServerEvent::ClientSeen {
            client_id: client_id.clone(),
            host,
            registered,
        });

        let mut moved = false;
        let player = self
            .store
            .update(&client_id, |p| moved = p.apply(&direction))
            .await?;

        if !moved {
            tracing::debug!("[{}] ignored direction {:?}", client_id, direction);
        }
        tracing::info!(
            "[{}] X: {}, Y: {}, Z: {}",
            client_id,
            player.x,
            player.y,
            player.z
        );
        let _ = self
            .event_tx
            .try_send(ServerEvent::PlayerMoved { client_id, player });

        Ok(player)
    }
}
