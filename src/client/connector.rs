//! Upstream transport
//!
//! [`Connector`] opens connections and [`UpstreamConnection`] reads from them.
//! The client only sees relayed payloads; control frames stay inside the
//! transport.

use std::future::Future;

use futures::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::error::Result;
use crate::registry::RelayMessage;

/// Opens upstream connections
pub trait Connector: Send + Sync + 'static {
    /// Connection type produced by this connector
    type Connection: UpstreamConnection;

    /// Open a connection to `url`
    fn connect(&self, url: &str) -> impl Future<Output = Result<Self::Connection>> + Send;
}

/// An open upstream connection
pub trait UpstreamConnection: Send + 'static {
    /// Next payload from upstream
    ///
    /// `None` means the connection ended normally; `Some(Err)` means it failed.
    /// Must be cancel-safe.
    fn recv(&mut self) -> impl Future<Output = Option<Result<RelayMessage>>> + Send;

    /// Start a graceful close
    ///
    /// The connection keeps yielding from `recv` until the peer completes the
    /// close.
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// WebSocket connector
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl Connector for WsConnector {
    type Connection = WsConnection;

    async fn connect(&self, url: &str) -> Result<WsConnection> {
        let (stream, response) = tokio_tungstenite::connect_async(url).await?;
        tracing::debug!(url = url, status = %response.status(), "Upstream handshake complete");
        Ok(WsConnection { stream })
    }
}

/// WebSocket upstream connection
pub struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl UpstreamConnection for WsConnection {
    async fn recv(&mut self) -> Option<Result<RelayMessage>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(RelayMessage::text(text.as_str()))),
                Ok(Message::Binary(data)) => return Some(Ok(RelayMessage::Binary(data))),
                Ok(Message::Close(frame)) => {
                    tracing::debug!(frame = ?frame, "Upstream sent close");
                }
                // Pings are answered by tungstenite itself
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => {}
                Err(tungstenite::Error::ConnectionClosed) | Err(tungstenite::Error::AlreadyClosed) => {
                    return None
                }
                Err(e) => return Some(Err(e.into())),
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self.stream.close(None).await {
            Ok(()) | Err(tungstenite::Error::ConnectionClosed) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
