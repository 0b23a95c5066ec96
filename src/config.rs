//! TOML configuration for lanspeed.
//!
//! A layered model: explicit path, then the `LANSPEED_CONFIG` environment
//! variable, then `/etc/lanspeed/lanspeed.toml`, then compiled-in defaults.
//! Also holds the parsers for values typed at the interactive prompt.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::throughput::{BYTES_PER_MIB, DEFAULT_CHUNK_SIZE};

/// Default TCP port shared by both roles.
pub const DEFAULT_PORT: u16 = 65432;

/// Default client payload in MB.
pub const DEFAULT_PAYLOAD_MB: u64 = 100;

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "LANSPEED_CONFIG";

const SYSTEM_CONFIG_PATH: &str = "/etc/lanspeed/lanspeed.toml";

/// Largest accepted `transfer.chunk_bytes`; one buffer this size is allocated per run.
pub const MAX_CHUNK_BYTES: usize = 64 * 1_048_576;

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Invalid configuration or user input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("'{input}' is not a valid number")]
    NotANumber { input: String },

    #[error("size must be a positive number of MB (got {value})")]
    NonPositiveSize { value: i64 },

    #[error("{mb} MB does not fit in a 64-bit byte count")]
    SizeTooLarge { mb: u64 },

    #[error("'{input}' is not a valid port (1-65535)")]
    InvalidPort { input: String },

    #[error("server address cannot be empty")]
    EmptyHost,

    #[error("payload must be at least one byte")]
    EmptyPayload,

    #[error("chunk size must be at least one byte")]
    ZeroChunkSize,

    #[error("chunk size of {bytes} bytes exceeds the {max} byte limit")]
    ChunkTooLarge { bytes: usize, max: usize },
}

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration for a lanspeed process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProbeConfig {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub transfer: TransferConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ProbeConfig {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        info!(path = %path.display(), "loaded lanspeed configuration");
        Ok(config)
    }

    /// Try `LANSPEED_CONFIG`, then the system location, then defaults.
    pub fn load_or_default() -> Self {
        if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            let path = Path::new(&env_path);
            match Self::load(path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "LANSPEED_CONFIG set but file could not be loaded, trying fallback"
                    );
                }
            }
        }

        let system_path = Path::new(SYSTEM_CONFIG_PATH);
        if system_path.exists() {
            match Self::load(system_path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %system_path.display(),
                        error = %e,
                        "system config file exists but could not be loaded, using defaults"
                    );
                }
            }
        }

        debug!("no config file found, using compiled-in defaults");
        Self::default()
    }

    /// Default client payload converted to bytes.
    pub fn default_payload_bytes(&self) -> Result<u64, ConfigError> {
        mb_to_bytes(self.transfer.payload_mb)
    }
}

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

/// Listener, dialer and connectivity-check settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address the server role binds to.
    pub bind_address: String,
    /// TCP port used by both roles.
    pub port: u16,
    /// Client connect timeout in milliseconds. `0` waits for the OS.
    pub connect_timeout_ms: u64,
    /// Timeout for `lanspeed check`.
    pub check_timeout_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            connect_timeout_ms: 0,
            check_timeout_ms: 3000,
        }
    }
}

impl NetworkConfig {
    pub fn connect_timeout(&self) -> Option<Duration> {
        (self.connect_timeout_ms > 0).then(|| Duration::from_millis(self.connect_timeout_ms))
    }

    pub fn check_timeout(&self) -> Duration {
        Duration::from_millis(self.check_timeout_ms)
    }
}

// ---------------------------------------------------------------------------
// Transfer
// ---------------------------------------------------------------------------

/// Payload and chunking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Client payload in MB (1 MB = 1,048,576 bytes).
    pub payload_mb: u64,
    /// Bytes per send/receive call.
    pub chunk_bytes: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            payload_mb: DEFAULT_PAYLOAD_MB,
            chunk_bytes: DEFAULT_CHUNK_SIZE,
        }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum tracing level (`trace`, `debug`, `info`, `warn`, `error`).
    /// `RUST_LOG` takes precedence when set.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Input parsing
// ---------------------------------------------------------------------------

/// Convert a size in MB to bytes.
pub fn mb_to_bytes(mb: u64) -> Result<u64, ConfigError> {
    if mb == 0 {
        return Err(ConfigError::NonPositiveSize { value: 0 });
    }
    mb.checked_mul(BYTES_PER_MIB)
        .ok_or(ConfigError::SizeTooLarge { mb })
}

/// Parse a payload size typed in MB. Blank input selects `default_mb`.
pub fn parse_payload_mb(input: &str, default_mb: u64) -> Result<u64, ConfigError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return mb_to_bytes(default_mb);
    }
    let value: i64 = trimmed.parse().map_err(|_| ConfigError::NotANumber {
        input: trimmed.to_string(),
    })?;
    if value <= 0 {
        return Err(ConfigError::NonPositiveSize { value });
    }
    mb_to_bytes(value as u64)
}

/// Parse a TCP port typed by the user. Blank input selects `default_port`;
/// port 0 is rejected.
pub fn parse_port(input: &str, default_port: u16) -> Result<u16, ConfigError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(default_port);
    }
    match trimmed.parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(ConfigError::InvalidPort {
            input: trimmed.to_string(),
        }),
    }
}

/// Check a configured chunk size against `1..=MAX_CHUNK_BYTES`.
pub fn validate_chunk_size(bytes: usize) -> Result<usize, ConfigError> {
    match bytes {
        0 => Err(ConfigError::ZeroChunkSize),
        b if b > MAX_CHUNK_BYTES => Err(ConfigError::ChunkTooLarge {
            bytes: b,
            max: MAX_CHUNK_BYTES,
        }),
        b => Ok(b),
    }
}

/// Validate a server address typed by the user.
pub fn parse_host(input: &str) -> Result<String, ConfigError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::EmptyHost);
    }
    Ok(trimmed.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
