//! Per-subscriber connection handling
//!
//! Each accepted WebSocket becomes a [`ChannelSubscriber`] in the registry.
//! A writer task drains the subscriber's channel into the socket; the reader
//! side only watches for close and error. Either side failing removes the
//! subscriber.

use std::fmt::Display;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{Sink, SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::registry::{BroadcastRegistry, ChannelSubscriber, RelayMessage, SubscriberId};

use super::handshake::Handshake;

/// Convert a relayed message into an outbound WebSocket frame
pub fn to_ws_message(message: RelayMessage) -> Message {
    match message {
        RelayMessage::Text(text) => Message::Text(text.as_ref().into()),
        RelayMessage::Binary(data) => Message::Binary(data),
    }
}

/// Drain a subscriber's channel into its socket
///
/// A failed write removes the subscriber from the registry. The loop also ends
/// once the registry drops the subscriber, since it holds the only sender.
pub async fn forward_outbound<S>(
    mut sink: S,
    mut outbound: mpsc::UnboundedReceiver<RelayMessage>,
    registry: Arc<BroadcastRegistry>,
    id: SubscriberId,
) where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    while let Some(message) = outbound.recv().await {
        if let Err(e) = sink.send(to_ws_message(message)).await {
            tracing::warn!(subscriber_id = %id, error = %e, "Error sending");
            registry.deregister_id(id).await;
            break;
        }
    }
}

/// Run one subscriber connection until it closes
pub async fn serve_subscriber(
    socket: WebSocket,
    peer_addr: SocketAddr,
    registry: Arc<BroadcastRegistry>,
    handshake: Option<Arc<str>>,
) {
    let (ws_tx, mut ws_rx) = socket.split();
    let (subscriber, outbound) = ChannelSubscriber::new();

    let registration = match registry
        .register_with(Arc::new(subscriber), |id| {
            handshake
                .as_deref()
                .and_then(|version| Handshake::new(version, id).to_message())
        })
        .await
    {
        Ok(registration) => registration,
        Err(e) => {
            tracing::warn!(peer = %peer_addr, error = %e, "Subscriber registration refused");
            return;
        }
    };
    let id = registration.id();

    tracing::debug!(subscriber_id = %id, peer = %peer_addr, "Subscriber connected");

    let writer = tokio::spawn(forward_outbound(ws_tx, outbound, Arc::clone(&registry), id));

    while let Some(frame) = ws_rx.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                tracing::debug!(subscriber_id = %id, text = text.as_str(), "Subscriber message");
            }
            Ok(Message::Binary(data)) => {
                tracing::debug!(subscriber_id = %id, len = data.len(), "Subscriber binary message");
            }
            Ok(Message::Close(frame)) => {
                tracing::debug!(subscriber_id = %id, frame = ?frame, "Subscriber sent close");
                break;
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Err(e) => {
                tracing::warn!(subscriber_id = %id, error = %e, "Subscriber error");
                break;
            }
        }
    }

    registration.deregister().await;
    writer.abort();

    tracing::info!(subscriber_id = %id, peer = %peer_addr, "Subscriber closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Subscriber;
    use bytes::Bytes;
    use std::time::Duration;

    async fn wait_for_count(registry: &BroadcastRegistry, expected: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while registry.subscriber_count().await != expected {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
    }

    #[test]
    fn test_text_stays_text() {
        let message = to_ws_message(RelayMessage::text(r#"{"score":5}"#));

        match message {
            Message::Text(text) => assert_eq!(text.as_str(), r#"{"score":5}"#),
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    #[test]
    fn test_binary_stays_binary() {
        let message = to_ws_message(RelayMessage::binary(Bytes::from_static(b"\x00\x01")));

        assert_eq!(message, Message::Binary(Bytes::from_static(b"\x00\x01")));
    }

    #[tokio::test]
    async fn test_write_failure_removes_only_that_subscriber() {
        let registry = Arc::new(BroadcastRegistry::new());

        let (broken, broken_rx) = ChannelSubscriber::new();
        let broken_id = registry
            .register(Arc::new(broken) as Arc<dyn Subscriber>)
            .await
            .unwrap()
            .id();
        let (socket, peer) = futures::channel::mpsc::unbounded::<Message>();
        drop(peer);
        let writer = tokio::spawn(forward_outbound(
            socket,
            broken_rx,
            Arc::clone(&registry),
            broken_id,
        ));

        let (healthy, mut healthy_rx) = ChannelSubscriber::new();
        registry
            .register(Arc::new(healthy) as Arc<dyn Subscriber>)
            .await
            .unwrap();

        // The channel accepts the message; the socket write fails afterwards
        let outcome = registry.broadcast(&RelayMessage::text("m1")).await;
        assert_eq!(outcome.delivered, 2);
        assert_eq!(healthy_rx.recv().await, Some(RelayMessage::text("m1")));

        wait_for_count(&registry, 1).await;
        writer.await.unwrap();

        let outcome = registry.broadcast(&RelayMessage::text("m2")).await;
        assert_eq!(outcome.delivered, 1);
        assert_eq!(healthy_rx.recv().await, Some(RelayMessage::text("m2")));
    }

    #[tokio::test]
    async fn test_writer_forwards_in_order_until_removed() {
        let registry = Arc::new(BroadcastRegistry::new());
        let (subscriber, rx) = ChannelSubscriber::new();
        let registration = registry
            .register(Arc::new(subscriber) as Arc<dyn Subscriber>)
            .await
            .unwrap();
        let id = registration.id();
        let (socket, mut peer) = futures::channel::mpsc::unbounded::<Message>();
        let writer = tokio::spawn(forward_outbound(socket, rx, Arc::clone(&registry), id));

        registry.broadcast(&RelayMessage::text("a")).await;
        registry.broadcast(&RelayMessage::text("b")).await;
        assert_eq!(peer.next().await, Some(Message::Text("a".into())));
        assert_eq!(peer.next().await, Some(Message::Text("b".into())));

        assert!(registration.deregister().await);
        writer.await.unwrap();
    }
}
