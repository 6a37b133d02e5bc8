//! Error types
//!
//! Failures inside the relay loop are logged and turned into state changes;
//! this type only surfaces from startup paths and transport seams.

use tokio_tungstenite::tungstenite;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Socket or listener I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// WebSocket protocol or transport failure
    #[error("WebSocket error: {0}")]
    WebSocket(Box<tungstenite::Error>),

    /// Registry refused an operation
    #[error("registry error: {0}")]
    Registry(#[from] crate::registry::RegistryError),

    /// Invalid configuration value
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The upstream went away while an operation was in flight
    #[error("upstream connection closed")]
    UpstreamClosed,
}

impl From<tungstenite::Error> for Error {
    fn from(e: tungstenite::Error) -> Self {
        Error::WebSocket(Box::new(e))
    }
}
