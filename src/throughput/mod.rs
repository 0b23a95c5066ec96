//! Throughput measurement: raw TCP transport, transfer loops, rate evaluation.

pub mod engine;
pub mod report;
pub mod transport;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Bytes in one MB as reported by this tool (binary megabyte).
pub const BYTES_PER_MIB: u64 = 1_048_576;

/// Bytes per send/receive call unless configured otherwise.
pub const DEFAULT_CHUNK_SIZE: usize = 1_048_576;

/// Which side of the link the measurement was taken on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Server role: bytes received from the peer.
    Inbound,
    /// Client role: bytes sent to the peer.
    Outbound,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
        }
    }

    /// Past-tense verb used in report lines.
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Inbound => "received",
            Self::Outbound => "sent",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one completed transfer loop.
#[derive(Debug, Clone, Serialize)]
pub struct TransferResult {
    direction: Direction,
    total_bytes: u64,
    elapsed_secs: f64,
    finished_at: DateTime<Utc>,
}

impl TransferResult {
    pub fn new(direction: Direction, total_bytes: u64, elapsed_secs: f64) -> Self {
        Self {
            direction,
            total_bytes,
            elapsed_secs,
            finished_at: Utc::now(),
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed_secs
    }

    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }
}

/// Snapshot handed to observers after every chunk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransferProgress {
    pub direction: Direction,
    pub bytes_transferred: u64,
    /// Known only on the sending side.
    pub expected_bytes: Option<u64>,
    pub elapsed_secs: f64,
}

impl TransferProgress {
    /// Completion percentage, when the total is known.
    pub fn percentage(&self) -> Option<f64> {
        match self.expected_bytes {
            Some(total) if total > 0 => Some(self.bytes_transferred as f64 / total as f64 * 100.0),
            _ => None,
        }
    }

    /// Average speed so far in MB/s.
    pub fn current_speed_mbps(&self) -> f64 {
        if self.elapsed_secs > 0.0 {
            self.bytes_transferred as f64 / BYTES_PER_MIB as f64 / self.elapsed_secs
        } else {
            0.0
        }
    }
}
