//! lanspeed -- raw TCP throughput probe for local networks.
//!
//! One side accepts a single connection and measures the inbound byte rate;
//! the other connects and streams a fixed volume of filler, measuring the
//! outbound rate. Results are rated against a Gigabit Ethernet reference.

pub mod config;
pub mod console;
pub mod menu;
pub mod network;
pub mod session;
pub mod throughput;

pub use config::{ConfigError, ProbeConfig};
pub use session::{Orchestrator, Role, SessionConfig, SessionError, SessionState};
pub use throughput::report::{evaluate, Evaluation, RatingTier, ThroughputReport};
pub use throughput::transport::TransportError;
pub use throughput::TransferResult;
