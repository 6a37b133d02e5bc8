//! Subscriber handshake payload
//!
//! Sent once to every new subscriber, ahead of any relayed message:
//!
//! ```text
//! {"gameVersion":"proxy","inSong":false,"proxyClientId":3}
//! ```

use serde::{Deserialize, Serialize};

use crate::registry::{RelayMessage, SubscriberId};

/// Identity message for a newly registered subscriber
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    /// Relay identity, in the field clients read the game version from
    pub game_version: String,
    /// Always `false`; the relay itself is never in a song
    pub in_song: bool,
    /// Ordinal assigned at registration
    pub proxy_client_id: u64,
}

impl Handshake {
    /// Create the handshake for a subscriber
    pub fn new(game_version: impl Into<String>, id: SubscriberId) -> Self {
        Self {
            game_version: game_version.into(),
            in_song: false,
            proxy_client_id: id.0,
        }
    }

    /// Encode as a text message
    pub fn to_message(&self) -> Option<RelayMessage> {
        match serde_json::to_string(self) {
            Ok(json) => Some(RelayMessage::from(json)),
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize handshake");
                None
            }
        }
    }
}
