//! End-to-end relay tests over real sockets
//!
//! A fake game socket stands in for the upstream; subscribers are plain
//! WebSocket clients.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use status_relay::client::ShutdownProgress;
use status_relay::{
    BroadcastRegistry, RelayServer, ServerConfig, UpstreamClient, UpstreamConfig, UpstreamHandle,
    WsConnector,
};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

enum Command {
    Send(Message),
    Close,
}

/// Fake game socket accepting one upstream connection at a time
struct FakeUpstream {
    addr: SocketAddr,
    commands: mpsc::UnboundedSender<Command>,
    connected: mpsc::UnboundedReceiver<()>,
}

impl FakeUpstream {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (commands, mut command_rx) = mpsc::unbounded_channel();
        let (connected_tx, connected) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            loop {
                let Ok((tcp, _)) = listener.accept().await else {
                    return;
                };
                let Ok(mut ws) = accept_async(tcp).await else {
                    continue;
                };
                let _ = connected_tx.send(());

                loop {
                    tokio::select! {
                        command = command_rx.recv() => match command {
                            Some(Command::Send(message)) => {
                                if ws.send(message).await.is_err() {
                                    break;
                                }
                            }
                            Some(Command::Close) => {
                                let _ = ws.close(None).await;
                            }
                            None => return,
                        },
                        frame = ws.next() => match frame {
                            Some(Ok(_)) => {}
                            _ => break,
                        },
                    }
                }
            }
        });

        Self {
            addr,
            commands,
            connected,
        }
    }

    fn url(&self) -> String {
        format!("ws://{}/websocket", self.addr)
    }

    fn send_text(&self, text: &str) {
        let _ = self
            .commands
            .send(Command::Send(Message::Text(text.to_string().into())));
    }

    fn close(&self) {
        let _ = self.commands.send(Command::Close);
    }

    async fn wait_connected(&mut self) {
        tokio::time::timeout(WAIT, self.connected.recv())
            .await
            .expect("upstream never connected")
            .expect("fake upstream stopped");
    }
}

struct Relay {
    addr: SocketAddr,
    registry: Arc<BroadcastRegistry>,
    handle: UpstreamHandle,
    stop: CancellationToken,
}

async fn start_relay(upstream: &FakeUpstream) -> Relay {
    let registry = Arc::new(BroadcastRegistry::new());
    let server = RelayServer::bind(
        ServerConfig::default().bind("127.0.0.1:0".parse().unwrap()),
        Arc::clone(&registry),
    )
    .await
    .unwrap();
    let addr = server.local_addr();

    let stop = CancellationToken::new();
    tokio::spawn(server.run_until(stop.clone().cancelled_owned()));

    let config = UpstreamConfig::with_url(upstream.url()).reconnect_delay(Duration::from_millis(50));
    let handle = UpstreamClient::new(config, WsConnector, Arc::clone(&registry)).spawn();

    Relay {
        addr,
        registry,
        handle,
        stop,
    }
}

async fn subscribe(relay: &Relay, path: &str) -> Socket {
    let (ws, _) = connect_async(format!("ws://{}{}", relay.addr, path))
        .await
        .unwrap();
    ws
}

async fn next_frame(ws: &mut Socket) -> Message {
    loop {
        let frame = tokio::time::timeout(WAIT, ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("subscriber stream ended")
            .unwrap();
        match frame {
            Message::Ping(_) | Message::Pong(_) => continue,
            other => return other,
        }
    }
}

async fn next_text(ws: &mut Socket) -> String {
    next_frame(ws).await.to_text().unwrap().to_string()
}

async fn read_handshake(ws: &mut Socket) -> u64 {
    let handshake: serde_json::Value = serde_json::from_str(&next_text(ws).await).unwrap();
    assert_eq!(handshake["gameVersion"], "proxy");
    assert_eq!(handshake["inSong"], false);
    handshake["proxyClientId"].as_u64().unwrap()
}

async fn wait_for_count(registry: &BroadcastRegistry, expected: usize) {
    tokio::time::timeout(WAIT, async {
        while registry.subscriber_count().await != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("subscriber count never settled");
}

#[tokio::test]
async fn test_fan_out_across_reconnect_and_departure() {
    let mut upstream = FakeUpstream::start().await;
    let relay = start_relay(&upstream).await;
    upstream.wait_connected().await;

    let mut a = subscribe(&relay, "/").await;
    let mut b = subscribe(&relay, "/websocket").await;
    let id_a = read_handshake(&mut a).await;
    let id_b = read_handshake(&mut b).await;
    assert_ne!(id_a, id_b);

    upstream.send_text(r#"{"inSong":true,"score":5}"#);
    assert_eq!(next_text(&mut a).await, r#"{"inSong":true,"score":5}"#);
    assert_eq!(next_text(&mut b).await, r#"{"inSong":true,"score":5}"#);

    upstream.close();
    upstream.wait_connected().await;

    a.close(None).await.unwrap();
    wait_for_count(&relay.registry, 1).await;

    upstream.send_text(r#"{"inSong":false}"#);
    assert_eq!(next_text(&mut b).await, r#"{"inSong":false}"#);
    assert_eq!(relay.registry.subscriber_count().await, 1);

    relay.stop.cancel();
}

#[tokio::test]
async fn test_subscribers_survive_upstream_reconnect() {
    let mut upstream = FakeUpstream::start().await;
    let relay = start_relay(&upstream).await;
    upstream.wait_connected().await;

    let mut sub = subscribe(&relay, "/").await;
    read_handshake(&mut sub).await;

    upstream.close();
    upstream.wait_connected().await;

    upstream.send_text("after reconnect");
    assert_eq!(next_text(&mut sub).await, "after reconnect");
    assert_eq!(relay.registry.subscriber_count().await, 1);

    relay.stop.cancel();
}

#[tokio::test]
async fn test_binary_payloads_pass_through() {
    let mut upstream = FakeUpstream::start().await;
    let relay = start_relay(&upstream).await;
    upstream.wait_connected().await;

    let mut sub = subscribe(&relay, "/").await;
    read_handshake(&mut sub).await;

    let _ = upstream
        .commands
        .send(Command::Send(Message::Binary(vec![0u8, 159, 146, 150].into())));

    match next_frame(&mut sub).await {
        Message::Binary(data) => assert_eq!(data.as_ref(), &[0u8, 159, 146, 150]),
        other => panic!("expected binary frame, got {:?}", other),
    }

    relay.stop.cancel();
}

#[tokio::test]
async fn test_graceful_shutdown_closes_upstream() {
    let mut upstream = FakeUpstream::start().await;
    let relay = start_relay(&upstream).await;
    upstream.wait_connected().await;

    let mut sub = subscribe(&relay, "/").await;
    read_handshake(&mut sub).await;

    upstream.send_text("one");
    assert_eq!(next_text(&mut sub).await, "one");

    assert_eq!(
        relay.handle.request_shutdown().await,
        ShutdownProgress::Closing
    );

    let summary = tokio::time::timeout(WAIT, relay.handle.stopped())
        .await
        .expect("client never stopped");
    assert_eq!(summary.attempts, 1);
    assert_eq!(summary.messages, 1);

    // No reconnect after a requested close
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(upstream.connected.try_recv().is_err());

    relay.stop.cancel();
}
