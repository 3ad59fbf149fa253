//! Client configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use netlib::{ConnectionConfig, NETLIB_VERSION, ProtocolVariant};
use std::{
    net::{Ipv4Addr, SocketAddr},
    time::Duration,
};

/// Default server address
pub const DEFAULT_SERVER: SocketAddr =
    SocketAddr::new(std::net::IpAddr::V4(Ipv4Addr::LOCALHOST), 6460);

/// Default readiness wait in milliseconds
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10;

/// Complete client configuration loaded from environment variables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Server address
    pub server: SocketAddr,
    /// Wire variant and transport
    pub variant: ProtocolVariant,
    /// Longest readiness wait per loop cycle, in milliseconds
    pub poll_interval_ms: u64,
    /// Handshake timeout in seconds, `None` to wait forever
    pub handshake_timeout_secs: Option<u64>,
    /// Version stamped on user-authored packets
    pub version: u8,
}

/// Values given on the command line, taking precedence over the environment
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub server: Option<SocketAddr>,
    pub variant: Option<ProtocolVariant>,
    pub poll_interval_ms: Option<u64>,
    pub handshake_timeout_secs: Option<u64>,
    pub version: Option<u8>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER,
            variant: ProtocolVariant::default(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            handshake_timeout_secs: None,
            version: NETLIB_VERSION,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `overrides` - Values from CLI args, used in place of the environment
    ///
    /// # Errors
    ///
    /// Returns error if a variable is set but cannot be parsed
    pub fn from_env(overrides: Overrides) -> Result<Self, ConfigError> {
        Self::from_lookup(overrides, |key| std::env::var(key).ok())
    }

    /// Load configuration reading variables through `lookup`
    ///
    /// A variable named by an override is never looked up.
    pub fn from_lookup<F>(overrides: Overrides, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let server = match overrides.server {
            Some(server) => server,
            None => parse_env(&lookup, "NETLIB_SERVER")?.unwrap_or(DEFAULT_SERVER),
        };

        let variant = match overrides.variant {
            Some(variant) => variant,
            None => parse_env(&lookup, "NETLIB_TRANSPORT")?.unwrap_or_default(),
        };

        let poll_interval_ms = match overrides.poll_interval_ms {
            Some(ms) => ms,
            None => parse_env(&lookup, "NETLIB_POLL_INTERVAL_MS")?
                .unwrap_or(DEFAULT_POLL_INTERVAL_MS),
        };

        let handshake_timeout_secs = match overrides.handshake_timeout_secs {
            Some(secs) => Some(secs),
            None => parse_env(&lookup, "NETLIB_HANDSHAKE_TIMEOUT_SECS")?,
        };

        let version = match overrides.version {
            Some(version) => version,
            None => parse_env(&lookup, "NETLIB_VERSION")?.unwrap_or(NETLIB_VERSION),
        };

        Ok(ClientConfig {
            server,
            variant,
            poll_interval_ms,
            handshake_timeout_secs,
            version,
        })
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                var: "NETLIB_POLL_INTERVAL_MS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.handshake_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid {
                var: "NETLIB_HANDSHAKE_TIMEOUT_SECS".to_string(),
                reason: "Must be greater than 0 (leave unset to wait forever)".to_string(),
            });
        }

        if self.version > NETLIB_VERSION {
            return Err(ConfigError::Invalid {
                var: "NETLIB_VERSION".to_string(),
                reason: format!("Must be at most {NETLIB_VERSION}"),
            });
        }

        Ok(())
    }

    /// Connection settings for the protocol engine
    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            server: self.server,
            variant: self.variant,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            handshake_timeout: self.handshake_timeout_secs.map(Duration::from_secs),
            version: self.version,
        }
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// Helper to parse an optional variable, rejecting bad values
fn parse_env<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| parse_value(key, &value))
        .transpose()
}

fn parse_value<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        var: key.to_string(),
        reason: format!("'{value}': {e}"),
    })
}
