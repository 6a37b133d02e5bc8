//! Game status relay
//!
//! Keeps one reconnecting WebSocket connection to a game's status socket and
//! fans every payload out, unchanged, to any number of WebSocket subscribers.
//!
//! ```text
//!   game ──ws──► UpstreamClient ──► BroadcastRegistry ──► RelayServer ──ws──► subscribers
//! ```
//!
//! The [`simulator`] module provides a stand-in game socket and a recorder for
//! exercising the relay without the game.

pub mod client;
pub mod error;
pub mod logging;
pub mod registry;
pub mod server;
pub mod shutdown;
pub mod simulator;
pub mod stats;

pub use client::{UpstreamClient, UpstreamConfig, UpstreamHandle, WsConnector};
pub use error::{Error, Result};
pub use registry::{BroadcastRegistry, RegistryConfig, RelayMessage, Subscriber};
pub use server::{RelayServer, ServerConfig};
