use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RelayError, Result};

/// Default TCP port of the DCC relay.
pub const DEFAULT_PORT: u16 = 3532;

/// Bytes allocated per packet read from a client.
pub const DEFAULT_FRAME_SIZE: usize = 127;

/// Clients served at once. Further connections are closed on accept.
pub const DEFAULT_MAX_CONNECTIONS: usize = 1;

/// Line sent to every client on connect.
pub const GREETING: &str = "Hello\r\n";

/// Relay server settings.
///
/// Every field has a default, so a config file only needs the keys it
/// changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RelayConfig {
    /// Address to bind the listener on.
    pub bind_address: String,
    /// TCP port. Zero picks an ephemeral port.
    pub port: u16,
    /// Packet buffer size per client read.
    pub frame_size: usize,
    /// Greeting written to each new client.
    pub greeting: String,
    /// Live sessions allowed at once.
    pub max_connections: usize,
    /// Whether the relay starts out enabled.
    pub enabled: bool,
    /// Link pump idle poll period, milliseconds.
    pub poll_interval_ms: u64,
    /// How long a packet may wait for the target to take a byte, milliseconds.
    /// Zero waits forever.
    pub write_timeout_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            frame_size: DEFAULT_FRAME_SIZE,
            greeting: GREETING.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            enabled: true,
            poll_interval_ms: 1,
            write_timeout_ms: 2_000,
        }
    }
}

impl RelayConfig {
    /// Load from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|err| RelayError::Config(format!("{}: {err}", path.display())))?;
        Self::from_json_str(&raw)
    }

    /// Parse from JSON text.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the relay cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.frame_size == 0 {
            return Err(RelayError::Config("frame_size must be non-zero".into()));
        }
        if self.frame_size > dcclink_frame::MAX_FRAME_PAYLOAD {
            return Err(RelayError::Config(format!(
                "frame_size {} exceeds the {} byte packet limit",
                self.frame_size,
                dcclink_frame::MAX_FRAME_PAYLOAD
            )));
        }
        if self.max_connections == 0 {
            return Err(RelayError::Config("max_connections must be at least 1".into()));
        }
        Ok(())
    }

    /// `bind_address:port`.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        (self.write_timeout_ms > 0).then(|| Duration::from_millis(self.write_timeout_ms))
    }
}
