//! Connection handling for ProtoMUD
//!
//! Wraps a byte stream with movement framing, buffering and statistics.

use bytes::BytesMut;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::protocol::{CodecError, Decoder, Encoder, Movement, DEFAULT_MAX_MESSAGE_SIZE};

/// Connection errors
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(#[from] CodecError),

    #[error("Connection closed mid-frame")]
    Closed,

    #[error("Connection timeout")]
    Timeout,
}

pub type ConnectionResult<T> = Result<T, ConnectionError>;

/// State of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Ready for communication
    Connected,
    /// Write half has been shut down
    Closed,
}

/// Connection statistics
#[derive(Debug, Default, Clone)]
pub struct ConnectionStats {
    /// Messages sent
    pub messages_sent: u64,
    /// Messages received
    pub messages_received: u64,
    /// Bytes sent
    pub bytes_sent: u64,
    /// Bytes received
    pub bytes_received: u64,
}

/// A framed connection to a remote peer
pub struct Connection<S = TcpStream> {
    /// Remote peer address
    remote_addr: SocketAddr,
    /// The underlying stream
    stream: S,
    /// Protocol encoder
    encoder: Encoder,
    /// Protocol decoder
    decoder: Decoder,
    /// Read buffer
    read_buf: BytesMut,
    /// Write buffer
    write_buf: BytesMut,
    /// Connection state
    state: ConnectionState,
    /// Statistics
    stats: ConnectionStats,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Create a new connection from an established stream
    pub fn new(stream: S, remote_addr: SocketAddr) -> Self {
        Self {
            remote_addr,
            stream,
            encoder: Encoder::new(),
            decoder: Decoder::new(),
            read_buf: BytesMut::with_capacity(DEFAULT_MAX_MESSAGE_SIZE),
            write_buf: BytesMut::with_capacity(DEFAULT_MAX_MESSAGE_SIZE),
            state: ConnectionState::Connected,
            stats: ConnectionStats::default(),
        }
    }

    /// Limit the payload size accepted and produced on this connection
    pub fn with_max_message_size(mut self, max_message_size: usize) -> Self {
        self.encoder = Encoder::with_max_size(max_message_size);
        self.decoder = Decoder::with_max_size(max_message_size);
        self
    }

    /// Remote host with the port stripped
    pub fn peer_host(&self) -> IpAddr {
        self.remote_addr.ip().to_canonical()
    }

    /// Get the current connection state
    #[cfg(test)]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Get connection statistics
    pub fn stats(&self) -> &ConnectionStats {
        &self.stats
    }

    /// Send a movement
    pub async fn send(&mut self, movement: &Movement) -> ConnectionResult<()> {
        self.write_buf.clear();
        self.encoder.encode(movement, &mut self.write_buf)?;

        self.stream.write_all(&self.write_buf).await?;
        self.stream.flush().await?;

        self.stats.messages_sent += 1;
        self.stats.bytes_sent += self.write_buf.len() as u64;

        Ok(())
    }

    /// Receive the next movement, `None` once the peer has closed cleanly
    pub async fn recv(&mut self) -> ConnectionResult<Option<Movement>> {
        loop {
            if let Some(movement) = self.decoder.decode(&mut self.read_buf)? {
                self.stats.messages_received += 1;
                return Ok(Some(movement));
            }

            let mut buf = [0u8; 1024];
            let n = self.stream.read(&mut buf).await?;

            if n == 0 {
                if self.decoder.is_mid_frame(&self.read_buf) {
                    return Err(ConnectionError::Closed);
                } else {
                    return Ok(None);
                }
            }

            self.read_buf.extend_from_slice(&buf[..n]);
            self.stats.bytes_received += n as u64;
        }
    }

    /// Receive with a timeout
    pub async fn recv_timeout(&mut self, timeout: Duration) -> ConnectionResult<Option<Movement>> {
        match tokio::time::timeout(timeout, self.recv()).await {
            Ok(result) => result,
            Err(_) => Err(ConnectionError::Timeout),
        }
    }

    /// Shut down the write half
    pub async fn close(&mut self) -> ConnectionResult<()> {
        if self.state == ConnectionState::Closed {
            return Ok(());
        }
        self.state = ConnectionState::Closed;
        self.stream.shutdown().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ClientId;

    fn addr() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    fn movement(direction: &str) -> Movement {
        Movement::new(ClientId::new("1234").unwrap(), direction)
    }

    #[tokio::test]
    async fn test_send_recv_over_duplex() {
        let (a, b) = tokio::io::duplex(1024);
        let mut tx = Connection::new(a, addr());
        let mut rx = Connection::new(b, addr());

        tx.send(&movement("w")).await.unwrap();
        tx.send(&movement("a")).await.unwrap();
        tx.close().await.unwrap();

        assert_eq!(rx.recv().await.unwrap(), Some(movement("W")));
        assert_eq!(rx.recv().await.unwrap(), Some(movement("A")));
        assert_eq!(rx.recv().await.unwrap(), None);
        assert_eq!(rx.stats().messages_received, 2);
        assert_eq!(tx.stats().messages_sent, 2);
    }

    #[tokio::test]
    async fn test_eof_mid_frame() {
        let mut wire = BytesMut::new();
        Encoder::new().encode(&movement("s"), &mut wire).unwrap();

        let (mut a, b) = tokio::io::duplex(256);
        a.write_all(&wire[..wire.len() - 3]).await.unwrap();
        drop(a);

        let mut rx = Connection::new(b, addr());
        assert!(matches!(rx.recv().await, Err(ConnectionError::Closed)));
    }

    #[tokio::test]
    async fn test_recv_timeout() {
        let (_a, b) = tokio::io::duplex(64);
        let mut rx = Connection::new(b, addr());
        let result = rx.recv_timeout(Duration::from_millis(20)).await;
        assert!(matches!(result, Err(ConnectionError::Timeout)));
    }

    #[test]
    fn test_peer_host_strips_port_and_mapping() {
        let (a, _b) = tokio::io::duplex(8);
        let conn = Connection::new(a, "[::ffff:10.1.2.3]:5555".parse().unwrap());
        assert_eq!(conn.peer_host(), "10.1.2.3".parse::<IpAddr>().unwrap());
    }
}
