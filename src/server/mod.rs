//! Downstream server implementation
//!
//! Accepts subscriber WebSockets on any path, greets each with a handshake,
//! and registers it with the broadcast registry until it disconnects.

pub mod config;
pub mod connection;
pub mod handshake;
pub mod listener;

pub use config::{relay_port_for, ServerConfig, FALLBACK_RELAY_PORT, STATUS_PORT};
pub use handshake::Handshake;
pub use listener::RelayServer;
