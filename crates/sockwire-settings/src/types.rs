//! Settings types with compiled defaults.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings object.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SockwireSettings {
    /// HTTP / WebSocket listener settings.
    pub server: ServerSettings,
    /// Per-connection channel settings.
    pub channel: ChannelSettings,
    /// Logging settings.
    pub logging: LoggingSettings,
}

impl SockwireSettings {
    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.channel.queue_capacity == 0 {
            return Err(SettingsError::InvalidValue(
                "channel.queueCapacity must be greater than 0".into(),
            ));
        }
        if self.channel.ping_interval_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "channel.pingIntervalMs must be greater than 0".into(),
            ));
        }
        if self.channel.ping_timeout_ms < self.channel.ping_interval_ms {
            return Err(SettingsError::InvalidValue(format!(
                "channel.pingTimeoutMs ({}) must not be shorter than channel.pingIntervalMs ({})",
                self.channel.ping_timeout_ms, self.channel.ping_interval_ms
            )));
        }
        if !self.server.path.starts_with('/') {
            return Err(SettingsError::InvalidValue(format!(
                "server.path must start with '/', got {:?}",
                self.server.path
            )));
        }
        Ok(())
    }
}

/// Listener settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port (`0` picks a free port).
    pub port: u16,
    /// HTTP path that accepts the WebSocket upgrade.
    pub path: String,
    /// Maximum inbound WebSocket message size in bytes.
    pub max_message_size: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            path: "/socket.io/".to_string(),
            max_message_size: 1024 * 1024,
        }
    }
}

/// Per-connection settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChannelSettings {
    /// Outbound frames a connection may hold before pushes are rejected.
    pub queue_capacity: usize,
    /// Default wait for an ack response, in milliseconds.
    pub ack_timeout_ms: u64,
    /// Ping interval advertised in the open handshake, in milliseconds.
    pub ping_interval_ms: u64,
    /// Idle time after which a silent connection is dropped, in milliseconds.
    pub ping_timeout_ms: u64,
}

impl ChannelSettings {
    /// [`Self::ack_timeout_ms`] as a [`Duration`].
    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }

    /// [`Self::ping_interval_ms`] as a [`Duration`].
    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    /// [`Self::ping_timeout_ms`] as a [`Duration`].
    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout_ms)
    }
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            queue_capacity: 500,
            ack_timeout_ms: 30_000,
            ping_interval_ms: 30_000,
            ping_timeout_ms: 60_000,
        }
    }
}

/// Logging settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
