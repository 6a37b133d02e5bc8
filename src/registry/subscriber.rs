//! Subscriber sinks
//!
//! A subscriber is anything that can accept a relayed message without
//! blocking. Downstream WebSocket connections use [`ChannelSubscriber`], which
//! hands messages to the connection's writer task; in-process consumers use
//! [`FnSubscriber`].

use std::fmt;

use tokio::sync::mpsc;

use super::error::SendError;
use super::frame::RelayMessage;

/// Ordinal identity assigned at registration
///
/// Ids grow monotonically per registry and start at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriberId(pub u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An outbound message sink
///
/// `deliver` must not block. An `Err` return removes the subscriber from the
/// registry that called it.
pub trait Subscriber: Send + Sync + 'static {
    /// Hand a message to the sink
    fn deliver(&self, message: &RelayMessage) -> Result<(), SendError>;
}

/// Subscriber backed by an unbounded channel
///
/// The receiving half is drained by a writer task, so messages reach the
/// socket in the order they were broadcast.
pub struct ChannelSubscriber {
    tx: mpsc::UnboundedSender<RelayMessage>,
}

impl ChannelSubscriber {
    /// Create a subscriber and the receiver its writer task should drain
    pub fn new() -> (Self, mpsc::UnboundedReceiver<RelayMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Subscriber for ChannelSubscriber {
    fn deliver(&self, message: &RelayMessage) -> Result<(), SendError> {
        self.tx.send(message.clone()).map_err(|_| SendError::Closed)
    }
}

/// Subscriber that runs a handler for each message
pub struct FnSubscriber<F> {
    handler: F,
}

impl<F> FnSubscriber<F>
where
    F: Fn(&RelayMessage) -> Result<(), SendError> + Send + Sync + 'static,
{
    /// Wrap a message handler
    pub fn new(handler: F) -> Self {
        Self { handler }
    }
}

impl<F> Subscriber for FnSubscriber<F>
where
    F: Fn(&RelayMessage) -> Result<(), SendError> + Send + Sync + 'static,
{
    fn deliver(&self, message: &RelayMessage) -> Result<(), SendError> {
        (self.handler)(message)
    }
}
