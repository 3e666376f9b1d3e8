//! Environment-driven configuration.

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::ConfigError;

/// Default bind address for the HTTP boundary.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
/// Default primary message channel name.
pub const DEFAULT_CHANNEL: &str = "autogpt";
/// Default wait for collaborator responses after a publish.
pub const DEFAULT_RESPONSE_TIMEOUT_MS: u64 = 2_000;

/// Runtime configuration, loaded from environment variables with defaults
/// for every field.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server binds to (`AGENTBUS_BIND_ADDR`).
    pub bind_addr: SocketAddr,
    /// Name of the primary message channel (`AGENTBUS_CHANNEL`).
    pub channel: String,
    /// How long service operations wait for mailbox responses
    /// (`AGENTBUS_RESPONSE_TIMEOUT_MS`).
    pub response_timeout: Duration,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind_addr = match std::env::var("AGENTBUS_BIND_ADDR") {
            Ok(raw) => raw
                .parse::<SocketAddr>()
                .map_err(|e| ConfigError::InvalidValue {
                    key: "AGENTBUS_BIND_ADDR".to_string(),
                    message: e.to_string(),
                })?,
            Err(_) => DEFAULT_BIND_ADDR
                .parse()
                .expect("default bind address parses"),
        };

        let channel =
            std::env::var("AGENTBUS_CHANNEL").unwrap_or_else(|_| DEFAULT_CHANNEL.to_string());

        let response_timeout = match std::env::var("AGENTBUS_RESPONSE_TIMEOUT_MS") {
            Ok(raw) => {
                let ms = raw.parse::<u64>().map_err(|e| ConfigError::InvalidValue {
                    key: "AGENTBUS_RESPONSE_TIMEOUT_MS".to_string(),
                    message: e.to_string(),
                })?;
                Duration::from_millis(ms)
            }
            Err(_) => Duration::from_millis(DEFAULT_RESPONSE_TIMEOUT_MS),
        };

        Ok(Self {
            bind_addr,
            channel,
            response_timeout,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR
                .parse()
                .expect("default bind address parses"),
            channel: DEFAULT_CHANNEL.to_string(),
            response_timeout: Duration::from_millis(DEFAULT_RESPONSE_TIMEOUT_MS),
        }
    }
}
