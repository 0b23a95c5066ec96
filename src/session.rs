//! Session orchestration: one measurement run at a time, server or client.
//!
//! The [`Orchestrator`] owns the Idle / Running / Terminated state and drives
//! a single run to completion on the calling task. Sockets are scoped to the
//! run, so they are closed before control returns on every path.

use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{parse_host, validate_chunk_size, ConfigError, ProbeConfig};
use crate::network;
use crate::throughput::engine::{self, TransferObserver};
use crate::throughput::report::{self, Evaluation};
use crate::throughput::transport::{self, TransportError, TransportListener};
use crate::throughput::TransferResult;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Server,
    Client,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Server => "server",
            Self::Client => "client",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything one run needs. Built up front and borrowed for the run.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    role: Role,
    bind_address: String,
    port: u16,
    payload_bytes: u64,
    peer_address: Option<String>,
    chunk_size: usize,
    accept_timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
}

impl SessionConfig {
    /// Server role from the loaded configuration.
    pub fn server(config: &ProbeConfig) -> Result<Self, ConfigError> {
        let chunk_size = validate_chunk_size(config.transfer.chunk_bytes)?;
        Ok(Self {
            role: Role::Server,
            bind_address: config.network.bind_address.clone(),
            port: config.network.port,
            payload_bytes: 0,
            peer_address: None,
            chunk_size,
            accept_timeout: None,
            connect_timeout: None,
        })
    }

    /// Client role sending `payload_bytes` to `host`.
    pub fn client(config: &ProbeConfig, host: &str, payload_bytes: u64) -> Result<Self, ConfigError> {
        let host = parse_host(host)?;
        if payload_bytes == 0 {
            return Err(ConfigError::EmptyPayload);
        }
        let chunk_size = validate_chunk_size(config.transfer.chunk_bytes)?;
        Ok(Self {
            role: Role::Client,
            bind_address: config.network.bind_address.clone(),
            port: config.network.port,
            payload_bytes,
            peer_address: Some(host),
            chunk_size,
            accept_timeout: None,
            connect_timeout: config.network.connect_timeout(),
        })
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_bind_address(mut self, bind_address: impl Into<String>) -> Self {
        self.bind_address = bind_address.into();
        self
    }

    /// Bound the server's wait for a peer. Production runs wait forever.
    pub fn with_accept_timeout(mut self, timeout: Duration) -> Self {
        self.accept_timeout = Some(timeout);
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn payload_bytes(&self) -> u64 {
        self.payload_bytes
    }

    pub fn peer_address(&self) -> Option<&str> {
        self.peer_address.as_deref()
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("session orchestrator has been terminated")]
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    RunningServer,
    RunningClient,
    Terminated,
}

/// Runs measurement sessions one after another.
#[derive(Debug)]
pub struct Orchestrator {
    state: SessionState,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl Orchestrator {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Run one session to completion and evaluate it.
    ///
    /// The state returns to `Idle` whether the run succeeds or fails. A
    /// transport failure yields no evaluation.
    pub async fn run(
        &mut self,
        config: &SessionConfig,
        observer: &mut dyn TransferObserver,
    ) -> Result<Evaluation, SessionError> {
        if self.state == SessionState::Terminated {
            return Err(SessionError::Terminated);
        }

        let run_id = Uuid::new_v4().to_string();
        info!(
            run_id = run_id.as_str(),
            role = config.role.as_str(),
            port = config.port,
            "starting session"
        );

        self.state = match config.role {
            Role::Server => SessionState::RunningServer,
            Role::Client => SessionState::RunningClient,
        };
        let outcome = match config.role {
            Role::Server => run_server(config, observer).await,
            Role::Client => run_client(config, observer).await,
        };
        self.state = SessionState::Idle;

        match outcome {
            Ok(result) => {
                let evaluation = report::evaluate(result);
                info!(
                    run_id = run_id.as_str(),
                    total_bytes = evaluation.total_bytes(),
                    speed_mbps = ?evaluation.report().map(|r| r.speed_mbps),
                    "session finished"
                );
                Ok(evaluation)
            }
            Err(e) => {
                warn!(run_id = run_id.as_str(), error = %e, "session aborted");
                Err(e.into())
            }
        }
    }

    /// Stop accepting runs.
    pub fn terminate(&mut self) {
        info!("orchestrator terminated");
        self.state = SessionState::Terminated;
    }
}

async fn run_server(
    config: &SessionConfig,
    observer: &mut dyn TransferObserver,
) -> Result<TransferResult, TransportError> {
    let listener = TransportListener::bind(&config.bind_address, config.port).await?;
    observer.on_listening(network::advertised_address(listener.local_addr()));

    let mut session = listener.accept(config.accept_timeout).await?;
    observer.on_connected(session.peer_addr());

    engine::receive_all(&mut session, config.chunk_size, observer).await
}

async fn run_client(
    config: &SessionConfig,
    observer: &mut dyn TransferObserver,
) -> Result<TransferResult, TransportError> {
    let host = config.peer_address.as_deref().unwrap_or_default();
    let mut session = transport::dial(host, config.port, config.connect_timeout).await?;
    observer.on_connected(session.peer_addr());

    let result =
        engine::send_payload(&mut session, config.payload_bytes, config.chunk_size, observer)
            .await?;
    session.close().await;
    Ok(result)
}
