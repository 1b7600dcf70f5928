//! Server configuration.

use std::time::Duration;

use thiserror::Error;

use crate::signaling::DEFAULT_SIGNALING_PORT;

const BIND_ADDR_VAR: &str = "PARLEY_BIND_ADDR";
const PING_INTERVAL_VAR: &str = "PARLEY_PING_INTERVAL_SECS";
const PONG_TIMEOUT_VAR: &str = "PARLEY_PONG_TIMEOUT_SECS";
const OUTBOUND_BUFFER_VAR: &str = "PARLEY_OUTBOUND_BUFFER";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// How often each connection is pinged
    pub ping_interval: Duration,
    /// How long a ping may go unanswered before the connection is dropped
    pub pong_timeout: Duration,
    /// Capacity of the room manager's command queue
    pub command_buffer: usize,
    /// Frames that may queue for one connection before it is dropped
    pub outbound_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("0.0.0.0:{}", DEFAULT_SIGNALING_PORT),
            ping_interval: Duration::from_secs(30),
            pong_timeout: Duration::from_secs(10),
            command_buffer: 1024,
            outbound_buffer: 256,
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by `PARLEY_BIND_ADDR`, `PARLEY_PING_INTERVAL_SECS`,
    /// `PARLEY_PONG_TIMEOUT_SECS` and `PARLEY_OUTBOUND_BUFFER`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(addr) = lookup(BIND_ADDR_VAR) {
            if addr.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    var: BIND_ADDR_VAR,
                    value: addr,
                });
            }
            config.bind_addr = addr;
        }
        if let Some(value) = lookup(PING_INTERVAL_VAR) {
            config.ping_interval = parse_secs(PING_INTERVAL_VAR, value)?;
        }
        if let Some(value) = lookup(PONG_TIMEOUT_VAR) {
            config.pong_timeout = parse_secs(PONG_TIMEOUT_VAR, value)?;
        }
        if let Some(value) = lookup(OUTBOUND_BUFFER_VAR) {
            config.outbound_buffer = parse_capacity(OUTBOUND_BUFFER_VAR, value)?;
        }

        Ok(config)
    }
}

fn parse_secs(var: &'static str, value: String) -> Result<Duration, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::Invalid { var, value }),
    }
}

fn parse_capacity(var: &'static str, value: String) -> Result<usize, ConfigError> {
    match value.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::Invalid { var, value }),
    }
}
