//! Subscriber registry for fan-out
//!
//! The registry holds every live downstream subscriber and delivers each
//! upstream message to all of them.
//!
//! # Architecture
//!
//! ```text
//!      [Upstream client]
//!            │ on message
//!            ▼
//!   registry.broadcast() ──► deliver() ──► [ChannelSubscriber] ──► writer task ──► WS
//!            │               deliver() ──► [ChannelSubscriber] ──► writer task ──► WS
//!            │               deliver() ──► [FnSubscriber]      ──► handler
//!            ▼
//!   failed entries removed
//! ```
//!
//! Delivery is non-blocking and per-subscriber FIFO, so one slow or broken
//! subscriber never holds up the others.

pub mod config;
pub mod error;
pub mod frame;
pub mod store;
pub mod subscriber;

pub use config::{DuplicatePolicy, RegistryConfig};
pub use error::{RegistryError, SendError};
pub use frame::RelayMessage;
pub use store::{BroadcastOutcome, BroadcastRegistry, Registration};
pub use subscriber::{ChannelSubscriber, FnSubscriber, Subscriber, SubscriberId};
