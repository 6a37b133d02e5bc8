//! Upstream client state machine
//!
//! ```text
//! Disconnected ──► Connecting ──► Connected ──► Closed | Errored ──► Disconnected
//!       ▲                                                              │
//!       └─────────────────── after reconnect delay ────────────────────┘
//!
//! any state ──(shutdown)──► Stopped
//! ```

use std::fmt;

/// Connection attempt identity
///
/// Every attempt gets a fresh id so events from a superseded connection can
/// be told apart from the tracked one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Upstream client lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// No connection, reconnect pending
    Disconnected,
    /// Connection attempt in flight
    Connecting,
    /// Connection open, relaying messages
    Connected,
    /// Connection ended by the peer
    Closed,
    /// Connection failed
    Errored,
    /// Shutdown complete; no further attempts
    Stopped,
}

impl ClientState {
    /// Whether the client has stopped for good
    pub fn is_terminal(self) -> bool {
        self == ClientState::Stopped
    }

    /// Whether this state may move to `next`
    pub fn can_transition_to(self, next: ClientState) -> bool {
        use ClientState::*;

        match (self, next) {
            (Stopped, _) => false,
            (_, Stopped) => true,
            (Disconnected, Connecting) => true,
            (Connecting, Connected) | (Connecting, Errored) | (Connecting, Closed) => true,
            (Connected, Closed) | (Connected, Errored) => true,
            (Closed, Disconnected) | (Errored, Disconnected) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClientState::Disconnected => "disconnected",
            ClientState::Connecting => "connecting",
            ClientState::Connected => "connected",
            ClientState::Closed => "closed",
            ClientState::Errored => "errored",
            ClientState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconnect_cycle() {
        use ClientState::*;

        let cycle = [Disconnected, Connecting, Connected, Closed, Disconnected, Connecting];
        for pair in cycle.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_failed_attempt_cycle() {
        use ClientState::*;

        assert!(Connecting.can_transition_to(Errored));
        assert!(Errored.can_transition_to(Disconnected));
    }

    #[test]
    fn test_stopped_is_terminal() {
        use ClientState::*;

        assert!(Stopped.is_terminal());
        for next in [Disconnected, Connecting, Connected, Closed, Errored, Stopped] {
            assert!(!Stopped.can_transition_to(next));
        }
        assert!(Connected.can_transition_to(Stopped));
        assert!(Disconnected.can_transition_to(Stopped));
    }

    #[test]
    fn test_invalid_transitions() {
        use ClientState::*;

        assert!(!Disconnected.can_transition_to(Connected));
        assert!(!Connected.can_transition_to(Connecting));
        assert!(!Closed.can_transition_to(Connected));
    }
}
