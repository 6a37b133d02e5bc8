//! Server configuration

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::client::DEFAULT_UPSTREAM_ADDRESS;

/// Port the game's status socket listens on
pub const STATUS_PORT: u16 = 48998;

/// Port the relay falls back to when the upstream is on this machine
pub const FALLBACK_RELAY_PORT: u16 = 48999;

/// Identity reported in the handshake payload
pub const RELAY_GAME_VERSION: &str = "proxy";

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// `gameVersion` sent in the handshake, or `None` to send no handshake
    pub handshake: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), STATUS_PORT),
            handshake: Some(RELAY_GAME_VERSION.to_string()),
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

    /// Set the handshake identity
    pub fn handshake(mut self, game_version: impl Into<String>) -> Self {
        self.handshake = Some(game_version.into());
        self
    }

    /// Accept subscribers without sending a handshake
    pub fn without_handshake(mut self) -> Self {
        self.handshake = None;
        self
    }
}

/// Pick the relay's listen port for an upstream address
///
/// The game listens on [`STATUS_PORT`]; when the relay reads from the default
/// local socket it has to move aside to [`FALLBACK_RELAY_PORT`]. Returns the
/// port and whether it was moved.
pub fn relay_port_for(upstream_address: &str) -> (u16, bool) {
    if upstream_address.trim() == DEFAULT_UPSTREAM_ADDRESS {
        (FALLBACK_RELAY_PORT, true)
    } else {
        (STATUS_PORT, false)
    }
}
