//! Reconnecting upstream client
//!
//! The client is a single actor task that owns all upstream state: the tracked
//! connection, the pending reconnect timer, the shutdown flags and the message
//! counters. Connection reader tasks and the reconnect timer talk to it only
//! through tagged events, so no state is shared and no locks are taken.
//!
//! ```text
//!   [reader task #n] ──Opened/Message/Closed/Errored(n)──┐
//!   [reconnect timer(n)] ──────ReconnectDue(n)───────────┤
//!   [UpstreamHandle] ─────────Shutdown──────────────────►│ actor ──► registry.broadcast()
//! ```
//!
//! Events tagged with an id other than the tracked connection's are logged and
//! ignored, which keeps at most one reconnect pending at any time.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::error::Error;
use crate::registry::{BroadcastRegistry, RelayMessage};
use crate::stats::MessageCounters;

use super::config::UpstreamConfig;
use super::connector::{Connector, UpstreamConnection};
use super::state::{ClientState, ConnectionId};

/// Result of a shutdown request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownProgress {
    /// A graceful close of the open connection has started
    Closing,
    /// A close is already pending; one more request forces the stop
    AwaitingForce,
    /// The client has stopped
    Stopped,
}

/// Totals reported when the client stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientSummary {
    /// Connection attempts issued, including the first
    pub attempts: u64,
    /// Messages received from upstream
    pub messages: u64,
}

enum Event {
    Opened {
        id: ConnectionId,
    },
    Message {
        id: ConnectionId,
        message: RelayMessage,
    },
    Closed {
        id: ConnectionId,
    },
    Errored {
        id: ConnectionId,
        error: Error,
    },
    ReconnectDue {
        after: ConnectionId,
    },
    Shutdown {
        reply: oneshot::Sender<ShutdownProgress>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

struct ActiveConnection {
    id: ConnectionId,
    opened: bool,
    close_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl ActiveConnection {
    fn request_close(&mut self) {
        if let Some(tx) = self.close_tx.take() {
            let _ = tx.send(());
        }
    }

    /// Release the connection unconditionally
    fn terminate(self) {
        self.task.abort();
    }
}

struct PendingReconnect {
    after: ConnectionId,
    timer: JoinHandle<()>,
}

/// Handle to a running upstream client
pub struct UpstreamHandle {
    events: mpsc::UnboundedSender<Event>,
    state: watch::Receiver<ClientState>,
    task: JoinHandle<ClientSummary>,
}

impl UpstreamHandle {
    /// Ask the client to stop
    ///
    /// The first request closes an open connection gracefully; with no open
    /// connection the client stops at once. A request while a close is pending
    /// only arms the force stop, and the request after that stops immediately.
    pub async fn request_shutdown(&self) -> ShutdownProgress {
        let (reply, rx) = oneshot::channel();
        if self.events.send(Event::Shutdown { reply }).is_err() {
            return ShutdownProgress::Stopped;
        }
        rx.await.unwrap_or(ShutdownProgress::Stopped)
    }

    /// Current client state
    pub fn state(&self) -> ClientState {
        *self.state.borrow()
    }

    /// Subscribe to state changes
    pub fn watch_state(&self) -> watch::Receiver<ClientState> {
        self.state.clone()
    }

    /// Whether the actor task has finished
    pub fn is_stopped(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the client to stop
    pub async fn stopped(self) -> ClientSummary {
        match self.task.await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::error!(error = %e, "Upstream client task failed");
                ClientSummary::default()
            }
        }
    }
}

/// Reconnecting upstream client
///
/// Maintains at most one upstream connection and pushes every message it
/// receives through the registry unchanged.
pub struct UpstreamClient<C: Connector> {
    config: UpstreamConfig,
    connector: Arc<C>,
    registry: Arc<BroadcastRegistry>,
    counters: MessageCounters,

    state: watch::Sender<ClientState>,
    active: Option<ActiveConnection>,
    reconnect: Option<PendingReconnect>,
    next_connection_id: u64,

    stop_requested: bool,
    force_armed: bool,

    events_tx: mpsc::UnboundedSender<Event>,
    events_rx: mpsc::UnboundedReceiver<Event>,
}

impl<C: Connector> UpstreamClient<C> {
    /// Create a client; nothing happens until [`spawn`](Self::spawn)
    pub fn new(config: UpstreamConfig, connector: C, registry: Arc<BroadcastRegistry>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(ClientState::Disconnected);
        let counters = MessageCounters::new(config.report_interval);

        Self {
            config,
            connector: Arc::new(connector),
            registry,
            counters,
            state,
            active: None,
            reconnect: None,
            next_connection_id: 1,
            stop_requested: false,
            force_armed: false,
            events_tx,
            events_rx,
        }
    }

    /// Start the actor and make the first connection attempt
    pub fn spawn(self) -> UpstreamHandle {
        let events = self.events_tx.clone();
        let state = self.state.subscribe();
        let task = tokio::spawn(self.run());

        UpstreamHandle {
            events,
            state,
            task,
        }
    }

    async fn run(mut self) -> ClientSummary {
        self.connect();

        while let Some(event) = self.events_rx.recv().await {
            if self.handle(event).await == Flow::Stop {
                break;
            }
        }

        self.stop();

        ClientSummary {
            attempts: self.next_connection_id - 1,
            messages: self.counters.received,
        }
    }

    fn set_state(&self, next: ClientState) {
        let current = *self.state.borrow();
        if current == next {
            return;
        }
        if !current.can_transition_to(next) {
            tracing::debug!(from = %current, to = %next, "Unexpected state transition");
        }
        self.state.send_replace(next);
    }

    fn is_active(&self, id: ConnectionId) -> bool {
        self.active.as_ref().is_some_and(|a| a.id == id)
    }

    /// Open a new connection attempt and track it
    fn connect(&mut self) {
        let id = ConnectionId(self.next_connection_id);
        self.next_connection_id += 1;

        tracing::info!(url = %self.config.url, connection_id = %id, "Connecting to upstream");
        self.set_state(ClientState::Connecting);

        let (close_tx, close_rx) = oneshot::channel();
        let task = tokio::spawn(drive_connection(
            id,
            Arc::clone(&self.connector),
            self.config.url.clone(),
            close_rx,
            self.events_tx.clone(),
        ));

        if let Some(previous) = self.active.replace(ActiveConnection {
            id,
            opened: false,
            close_tx: Some(close_tx),
            task,
        }) {
            previous.terminate();
        }
    }

    fn schedule_reconnect(&mut self, after: ConnectionId) {
        let delay = self.config.reconnect_delay;
        let events = self.events_tx.clone();

        tracing::info!(
            delay_ms = delay.as_millis() as u64,
            connection_id = %after,
            "Reconnect scheduled"
        );

        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(Event::ReconnectDue { after });
        });

        if let Some(previous) = self.reconnect.replace(PendingReconnect { after, timer }) {
            previous.timer.abort();
        }
    }

    fn stop(&mut self) {
        if let Some(pending) = self.reconnect.take() {
            pending.timer.abort();
        }
        if let Some(active) = self.active.take() {
            active.terminate();
        }
        self.set_state(ClientState::Stopped);
    }

    async fn handle(&mut self, event: Event) -> Flow {
        match event {
            Event::Opened { id } => {
                if let Some(active) = self.active.as_mut().filter(|a| a.id == id) {
                    active.opened = true;
                    tracing::info!(connection_id = %id, "Upstream connected");
                    self.set_state(ClientState::Connected);
                } else {
                    tracing::debug!(connection_id = %id, "Ignoring open from superseded connection");
                }
                Flow::Continue
            }

            Event::Message { id, message } => {
                if !self.is_active(id) {
                    tracing::debug!(connection_id = %id, "Ignoring message from superseded connection");
                    return Flow::Continue;
                }
                self.on_message(message).await;
                Flow::Continue
            }

            Event::Closed { id } => {
                tracing::info!(connection_id = %id, "Upstream closed");
                self.on_connection_lost(id, ClientState::Closed)
            }

            Event::Errored { id, error } => {
                tracing::warn!(connection_id = %id, error = %error, "Upstream error");
                self.on_connection_lost(id, ClientState::Errored)
            }

            Event::ReconnectDue { after } => {
                match self.reconnect.as_ref() {
                    Some(pending) if pending.after == after && !self.stop_requested => {
                        self.reconnect = None;
                        self.connect();
                    }
                    _ => {
                        tracing::debug!(connection_id = %after, "Ignoring stale reconnect timer");
                    }
                }
                Flow::Continue
            }

            Event::Shutdown { reply } => {
                let (progress, flow) = self.on_shutdown();
                let _ = reply.send(progress);
                flow
            }
        }
    }

    async fn on_message(&mut self, message: RelayMessage) {
        if let Some(count) = self.counters.record(Instant::now()) {
            tracing::info!(messages = count, "Messages received");
        }

        let outcome = self.registry.broadcast(&message).await;
        tracing::trace!(
            bytes = message.len(),
            delivered = outcome.delivered,
            dropped = outcome.dropped,
            "Relayed upstream message"
        );
    }

    fn on_connection_lost(&mut self, id: ConnectionId, state: ClientState) -> Flow {
        if !self.is_active(id) {
            tracing::debug!(connection_id = %id, "Ignoring close from superseded connection");
            return Flow::Continue;
        }

        if let Some(active) = self.active.take() {
            active.terminate();
        }
        self.set_state(state);

        if self.stop_requested {
            tracing::info!("Upstream closed during shutdown, stopping");
            return Flow::Stop;
        }

        self.set_state(ClientState::Disconnected);
        self.schedule_reconnect(id);
        Flow::Continue
    }

    fn on_shutdown(&mut self) -> (ShutdownProgress, Flow) {
        let open = self.active.as_ref().is_some_and(|a| a.opened);

        if !self.stop_requested && open {
            self.stop_requested = true;
            if let Some(pending) = self.reconnect.take() {
                pending.timer.abort();
            }
            if let Some(active) = self.active.as_mut() {
                tracing::info!(connection_id = %active.id, "Shutdown requested, closing upstream");
                active.request_close();
            }
            (ShutdownProgress::Closing, Flow::Continue)
        } else if self.stop_requested && !self.force_armed {
            tracing::warn!("Press Ctrl-C one more time to force stop");
            self.force_armed = true;
            (ShutdownProgress::AwaitingForce, Flow::Continue)
        } else {
            tracing::info!(forced = self.stop_requested, "Stopping upstream client");
            self.stop_requested = true;
            (ShutdownProgress::Stopped, Flow::Stop)
        }
    }
}

/// Reader task for one connection attempt
async fn drive_connection<C: Connector>(
    id: ConnectionId,
    connector: Arc<C>,
    url: String,
    mut close_rx: oneshot::Receiver<()>,
    events: mpsc::UnboundedSender<Event>,
) {
    let mut conn = match connector.connect(&url).await {
        Ok(conn) => conn,
        Err(error) => {
            let _ = events.send(Event::Errored { id, error });
            return;
        }
    };

    if events.send(Event::Opened { id }).is_err() {
        return;
    }

    let mut closing = false;
    loop {
        tokio::select! {
            _ = &mut close_rx, if !closing => {
                closing = true;
                if let Err(error) = conn.close().await {
                    let _ = events.send(Event::Errored { id, error });
                    return;
                }
            }
            frame = conn.recv() => {
                match frame {
                    Some(Ok(message)) => {
                        if events.send(Event::Message { id, message }).is_err() {
                            return;
                        }
                    }
                    Some(Err(error)) => {
                        let _ = events.send(Event::Errored { id, error });
                        return;
                    }
                    None => {
                        let _ = events.send(Event::Closed { id });
                        return;
                    }
                }
            }
        }
    }
}
