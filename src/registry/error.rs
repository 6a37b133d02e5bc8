//! Registry error types

use super::subscriber::SubscriberId;

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// The subscriber is already present and the registry rejects duplicates
    #[error("subscriber already registered as {0}")]
    AlreadyRegistered(SubscriberId),

    /// The greeting could not be delivered, so the subscriber was not added
    #[error("greeting for {id} failed: {source}")]
    GreetingFailed {
        id: SubscriberId,
        #[source]
        source: SendError,
    },
}

/// Delivery failure reported by a subscriber sink
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    /// The receiving side of the sink has gone away
    #[error("subscriber sink closed")]
    Closed,

    /// The sink or the handler behind it failed
    #[error("delivery failed: {0}")]
    Failed(String),
}
