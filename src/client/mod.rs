//! Upstream client implementation
//!
//! Provides the relay's side of the upstream link:
//! - Connecting to the game's status socket over WebSocket
//! - Forwarding every payload to the broadcast registry
//! - Reconnecting after a fixed delay until shutdown is requested

pub mod config;
pub mod connector;
pub mod state;
pub mod upstream;

pub use config::{UpstreamConfig, DEFAULT_UPSTREAM_ADDRESS, UPSTREAM_ADDRESS_ENV};
pub use connector::{Connector, UpstreamConnection, WsConnection, WsConnector};
pub use state::{ClientState, ConnectionId};
pub use upstream::{ClientSummary, ShutdownProgress, UpstreamClient, UpstreamHandle};
