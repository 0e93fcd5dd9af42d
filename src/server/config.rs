//! Server configuration

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::capture::CaptureConfig;
use crate::hub::HubConfig;

/// Default HTTP/WebSocket port
pub const DEFAULT_PORT: u16 = 3001;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Allow cross-origin requests from any origin
    pub cors: bool,

    /// JSON file for rooms and chat history (None = in memory)
    pub data_file: Option<PathBuf>,

    /// Capture subprocess settings
    pub capture: CaptureConfig,

    /// Broadcast hub settings
    pub hub: HubConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            cors: true,
            data_file: None,
            capture: CaptureConfig::default(),
            hub: HubConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set maximum concurrent socket connections (0 = unlimited)
    pub fn max_connections(mut self, max: usize) -> Self {
        self.hub.max_subscribers = max;
        self
    }

    /// Enable or disable permissive CORS
    pub fn cors(mut self, enabled: bool) -> Self {
        self.cors = enabled;
        self
    }

    /// Persist rooms and history to a JSON file
    pub fn data_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_file = Some(path.into());
        self
    }

    /// Set the capture configuration
    pub fn capture(mut self, capture: CaptureConfig) -> Self {
        self.capture = capture;
        self
    }

    /// Set the hub configuration
    pub fn hub(mut self, hub: HubConfig) -> Self {
        self.hub = hub;
        self
    }
}
