//! Client configuration, loadable from JSON.

use std::path::Path;
use std::time::Duration;

use blokwire_protocol::GameMode;
use blokwire_transport::{DEFAULT_PORT, LocalConnector, TcpConnector};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Where and how to connect.
///
/// Every field has a default, so a config file only needs the keys it
/// changes:
///
/// ```json
/// { "server": "192.168.1.20", "player_name": "Ada" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Host to connect to. `None` means loopback.
    pub server: Option<String>,

    pub port: u16,

    pub connect_timeout_ms: u64,

    /// Abstract socket name of a server on the same device. Takes
    /// precedence over `server` when set.
    pub local_endpoint: Option<String>,

    /// Name announced with seat requests.
    pub player_name: Option<String>,

    /// Mode to request when hosting.
    pub game_mode: GameMode,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: None,
            port: DEFAULT_PORT,
            connect_timeout_ms: 5000,
            local_endpoint: None,
            player_name: None,
            game_mode: GameMode::default(),
        }
    }
}

impl ClientConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json(&json)?;
        tracing::debug!(path = %path.display(), "loaded client config");
        Ok(config)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn tcp_connector(&self) -> TcpConnector {
        TcpConnector::new(self.server.clone(), self.port)
            .with_timeout(self.connect_timeout())
    }

    pub fn local_connector(&self) -> Option<LocalConnector> {
        self.local_endpoint.as_deref().map(LocalConnector::new)
    }
}
