//! Relay server listener
//!
//! Accepts subscriber WebSockets and hands each one to the connection handler.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{ConnectInfo, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;

use crate::error::Result;
use crate::registry::BroadcastRegistry;
use crate::server::config::ServerConfig;
use crate::server::connection::serve_subscriber;

#[derive(Clone)]
struct AppState {
    registry: Arc<BroadcastRegistry>,
    handshake: Option<Arc<str>>,
}

/// Downstream WebSocket server
pub struct RelayServer {
    config: ServerConfig,
    registry: Arc<BroadcastRegistry>,
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl RelayServer {
    /// Bind the listening socket
    ///
    /// Binding happens up front so callers can learn the real port when
    /// binding to port 0.
    pub async fn bind(config: ServerConfig, registry: Arc<BroadcastRegistry>) -> Result<Self> {
        let listener = TcpListener::bind(config.bind_addr).await?;
        let local_addr = listener.local_addr()?;

        Ok(Self {
            config,
            registry,
            listener,
            local_addr,
        })
    }

    /// Address the server is listening on
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Get a reference to the broadcast registry
    pub fn registry(&self) -> &Arc<BroadcastRegistry> {
        &self.registry
    }

    /// Run the server
    ///
    /// This method blocks until the listener fails.
    pub async fn run(self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server until `shutdown` resolves
    ///
    /// Subscriber connections already upgraded keep running; they end when
    /// their peers disconnect or the process exits.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let state = AppState {
            registry: Arc::clone(&self.registry),
            handshake: self.config.handshake.as_deref().map(Arc::from),
        };

        let router = Router::new()
            .route("/", get(ws_handler))
            .route("/{*path}", get(ws_handler))
            .with_state(state);

        tracing::info!(
            addr = %self.local_addr,
            duplicates = ?self.registry.config().duplicates,
            "Relay server listening"
        );

        axum::serve(
            self.listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await?;

        tracing::info!(addr = %self.local_addr, "Relay server stopped");
        Ok(())
    }
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(peer_addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    tracing::debug!(peer = %peer_addr, "New subscriber connection");

    ws.on_upgrade(move |socket| serve_subscriber(socket, peer_addr, state.registry, state.handshake))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bind_reports_real_port() {
        let config = ServerConfig::default().bind("127.0.0.1:0".parse().unwrap());
        let server = RelayServer::bind(config, Arc::new(BroadcastRegistry::new()))
            .await
            .unwrap();

        assert_ne!(server.local_addr().port(), 0);
        assert!(server.registry().is_empty().await);
    }

    #[tokio::test]
    async fn test_bind_conflict_is_an_error() {
        let first = RelayServer::bind(
            ServerConfig::default().bind("127.0.0.1:0".parse().unwrap()),
            Arc::new(BroadcastRegistry::new()),
        )
        .await
        .unwrap();

        let taken = ServerConfig::default().bind(first.local_addr());
        assert!(RelayServer::bind(taken, Arc::new(BroadcastRegistry::new()))
            .await
            .is_err());
    }
}
