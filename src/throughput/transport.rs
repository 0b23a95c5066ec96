//! Single-peer raw TCP transport.
//!
//! A [`TransportListener`] accepts exactly one connection and is consumed in
//! the process, so the listening socket is closed before any data flows.
//! [`TransportSession`] wraps the connected stream with complete-or-fail
//! sends and plain reads.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{info, warn};

/// Network-layer faults. None of these are retried.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to bind {addr}: {source}")]
    BindFailure {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to connect to {addr}: {source}")]
    ConnectFailure {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("timed out after {waited_ms} ms waiting to {operation}")]
    Timeout {
        operation: &'static str,
        waited_ms: u64,
    },

    #[error("socket error during {operation}: {source}")]
    Io {
        operation: &'static str,
        #[source]
        source: io::Error,
    },
}

// ---------------------------------------------------------------------------
// TransportListener
// ---------------------------------------------------------------------------

/// A bound, not yet accepted, listening socket.
#[derive(Debug)]
pub struct TransportListener {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl TransportListener {
    /// Bind `bind_address:port`. Port 0 lets the OS choose.
    pub async fn bind(bind_address: &str, port: u16) -> Result<Self, TransportError> {
        let addr = format!("{}:{}", bind_address, port);
        let listener = TcpListener::bind(addr.as_str())
            .await
            .map_err(|source| TransportError::BindFailure {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| TransportError::BindFailure { addr, source })?;

        info!(%local_addr, "listening for one connection");
        Ok(Self {
            listener,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wait for one peer, then close the listening socket.
    ///
    /// `timeout` of `None` waits forever.
    pub async fn accept(self, timeout: Option<Duration>) -> Result<TransportSession, TransportError> {
        let accepted = match timeout {
            Some(limit) => tokio::time::timeout(limit, self.listener.accept())
                .await
                .map_err(|_| TransportError::Timeout {
                    operation: "accept",
                    waited_ms: limit.as_millis() as u64,
                })?,
            None => self.listener.accept().await,
        };
        let (stream, peer) = accepted.map_err(|source| TransportError::Io {
            operation: "accept",
            source,
        })?;

        info!(%peer, local_addr = %self.local_addr, "accepted connection");
        // `self.listener` drops here; later connection attempts are refused.
        Ok(TransportSession::new(stream, peer))
    }
}

/// Connect to `host:port`.
pub async fn dial(
    host: &str,
    port: u16,
    timeout: Option<Duration>,
) -> Result<TransportSession, TransportError> {
    let addr = format!("{}:{}", host, port);
    let connect = TcpStream::connect((host, port));

    let connected = match timeout {
        Some(limit) => tokio::time::timeout(limit, connect)
            .await
            .map_err(|_| TransportError::Timeout {
                operation: "connect",
                waited_ms: limit.as_millis() as u64,
            })?,
        None => connect.await,
    };
    let stream = connected.map_err(|source| TransportError::ConnectFailure {
        addr: addr.clone(),
        source,
    })?;
    let peer = stream.peer_addr().map_err(|source| TransportError::ConnectFailure {
        addr,
        source,
    })?;

    info!(%peer, "connected to server");
    Ok(TransportSession::new(stream, peer))
}

// ---------------------------------------------------------------------------
// TransportSession
// ---------------------------------------------------------------------------

/// One connected TCP stream. Dropping it closes the socket.
#[derive(Debug)]
pub struct TransportSession {
    stream: TcpStream,
    peer: SocketAddr,
}

impl TransportSession {
    fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        Self { stream, peer }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Write all of `bytes` or fail.
    pub async fn send(&mut self, bytes: &[u8]) -> Result<usize, TransportError> {
        self.stream
            .write_all(bytes)
            .await
            .map_err(|source| TransportError::Io {
                operation: "send",
                source,
            })?;
        Ok(bytes.len())
    }

    /// Read up to `buf.len()` bytes. `Ok(0)` means the peer closed its side.
    pub async fn receive(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        self.stream
            .read(buf)
            .await
            .map_err(|source| TransportError::Io {
                operation: "receive",
                source,
            })
    }

    /// Half-close the write side so the peer reads EOF, then drop the socket.
    pub async fn close(mut self) {
        if let Err(e) = self.stream.shutdown().await {
            warn!(peer = %self.peer, error = %e, "shutdown after transfer failed");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
