//! Client configuration
//!
//! Settings can be built in code or loaded from a JSON file:
//!
//! ```json
//! {
//!   "client_info": { "name": "weather-client", "version": "0.1.0" },
//!   "request_timeout_ms": 10000,
//!   "server": { "command": "python", "args": ["weather_server.py"] }
//! }
//! ```
//!
//! Every field is optional; missing fields take the defaults below.

use crate::transport::ServerParameters;
use crate::transport::stdio::DEFAULT_SHUTDOWN_GRACE;
use crate::types::{ClientCapabilities, Implementation};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default per-request deadline
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings for one client connection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Name and version announced to the peer
    pub client_info: Implementation,
    /// Capabilities announced to the peer
    pub capabilities: ClientCapabilities,
    /// Deadline for each request, in milliseconds; 0 disables it
    pub request_timeout_ms: u64,
    /// Time the peer gets to exit after its stdin closes, in milliseconds
    pub shutdown_grace_ms: u64,
    /// Peer to launch, when the configuration names one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerParameters>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_info: Implementation::default(),
            capabilities: ClientCapabilities::default(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT.as_millis() as u64,
            shutdown_grace_ms: DEFAULT_SHUTDOWN_GRACE.as_millis() as u64,
            server: None,
        }
    }
}

impl ClientConfig {
    /// Load a configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&text).map_err(|e| match e {
            Error::Configuration(reason) => {
                Error::configuration(format!("{}: {reason}", path.display()))
            }
            other => other,
        })
    }

    /// Parse a configuration from JSON text
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| Error::configuration(format!("invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Check field constraints serde cannot express
    pub fn validate(&self) -> Result<()> {
        if let Some(server) = &self.server {
            if server.command.trim().is_empty() {
                return Err(Error::configuration("server command must not be empty"));
            }
        }
        if self.client_info.name.is_empty() {
            return Err(Error::configuration("client name must not be empty"));
        }
        Ok(())
    }

    /// Per-request deadline, `None` when disabled
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_ms > 0).then(|| Duration::from_millis(self.request_timeout_ms))
    }

    /// Grace period for the peer to exit on close
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}
