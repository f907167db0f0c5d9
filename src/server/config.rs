//! Server configuration

use std::net::SocketAddr;

use crate::engine::EngineConfig;

/// Default listen port
pub const DEFAULT_PORT: u16 = 8000;

/// Default route for the WebSocket upgrade
pub const DEFAULT_PATH: &str = "/ws";

/// Relay server configuration options
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Route that accepts WebSocket upgrades
    pub path: String,

    /// Channel and queue capacities
    pub engine: EngineConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            path: DEFAULT_PATH.to_string(),
            engine: EngineConfig::default(),
        }
    }
}

impl RelayConfig {
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

    /// Set the upgrade route; a leading `/` is added if missing
    pub fn path(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        self.path = if path.starts_with('/') {
            path
        } else {
            format!("/{}", path)
        };
        self
    }

    /// Set the broadcast channel capacity
    pub fn broadcast_capacity(mut self, capacity: usize) -> Self {
        self.engine = self.engine.broadcast_capacity(capacity);
        self
    }

    /// Set the per-subscriber queue capacity
    pub fn subscriber_capacity(mut self, capacity: usize) -> Self {
        self.engine = self.engine.subscriber_capacity(capacity);
        self
    }
}
