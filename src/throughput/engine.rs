//! Transfer loops over a [`TransportSession`].
//!
//! The receive loop counts bytes until the peer closes; the send loop streams
//! filler until exactly the requested payload has been written. Both time the
//! loop with a monotonic clock and report progress through a
//! [`TransferObserver`].

use std::net::SocketAddr;
use std::time::Instant;

use tracing::info;

use super::transport::{TransportError, TransportSession};
use super::{Direction, TransferProgress, TransferResult};

/// Constant byte used for outbound payloads.
pub const FILLER_BYTE: u8 = b'X';

/// Side channel for progress. Every hook defaults to a no-op.
pub trait TransferObserver: Send {
    /// Server is waiting for a peer; `addr` is the address to hand to clients.
    fn on_listening(&mut self, _addr: SocketAddr) {}

    fn on_connected(&mut self, _peer: SocketAddr) {}

    /// Called after each chunk.
    fn on_progress(&mut self, _progress: &TransferProgress) {}

    fn on_finished(&mut self, _result: &TransferResult) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl TransferObserver for NullObserver {}

/// Receive until the peer closes its side, counting bytes.
pub async fn receive_all(
    session: &mut TransportSession,
    chunk_size: usize,
    observer: &mut dyn TransferObserver,
) -> Result<TransferResult, TransportError> {
    let mut buf = vec![0u8; chunk_size.max(1)];
    let mut total_bytes: u64 = 0;

    info!(peer = %session.peer_addr(), chunk_size = buf.len(), "receiving data");
    let start = Instant::now();

    loop {
        let n = session.receive(&mut buf).await?;
        if n == 0 {
            break;
        }
        total_bytes += n as u64;
        observer.on_progress(&TransferProgress {
            direction: Direction::Inbound,
            bytes_transferred: total_bytes,
            expected_bytes: None,
            elapsed_secs: start.elapsed().as_secs_f64(),
        });
    }

    let elapsed_secs = start.elapsed().as_secs_f64();
    info!(
        peer = %session.peer_addr(),
        total_bytes = total_bytes,
        elapsed_secs = elapsed_secs,
        "peer closed connection, receive complete"
    );

    let result = TransferResult::new(Direction::Inbound, total_bytes, elapsed_secs);
    observer.on_finished(&result);
    Ok(result)
}

/// Send exactly `payload_bytes` of filler in chunks of at most `chunk_size`.
pub async fn send_payload(
    session: &mut TransportSession,
    payload_bytes: u64,
    chunk_size: usize,
    observer: &mut dyn TransferObserver,
) -> Result<TransferResult, TransportError> {
    let chunk_size = chunk_size.max(1);
    // Never allocate more than the payload itself.
    let buf_len = (chunk_size as u64).min(payload_bytes) as usize;
    let chunk = vec![FILLER_BYTE; buf_len];
    let mut sent_bytes: u64 = 0;

    info!(
        peer = %session.peer_addr(),
        payload_bytes = payload_bytes,
        chunk_size = chunk_size,
        "sending data"
    );
    let start = Instant::now();

    while sent_bytes < payload_bytes {
        let remaining = (payload_bytes - sent_bytes).min(chunk.len() as u64) as usize;
        let written = session.send(&chunk[..remaining]).await?;
        sent_bytes += written as u64;
        observer.on_progress(&TransferProgress {
            direction: Direction::Outbound,
            bytes_transferred: sent_bytes,
            expected_bytes: Some(payload_bytes),
            elapsed_secs: start.elapsed().as_secs_f64(),
        });
    }

    let elapsed_secs = start.elapsed().as_secs_f64();
    info!(
        peer = %session.peer_addr(),
        total_bytes = sent_bytes,
        elapsed_secs = elapsed_secs,
        "send complete"
    );

    let result = TransferResult::new(Direction::Outbound, sent_bytes, elapsed_secs);
    observer.on_finished(&result);
    Ok(result)
}
