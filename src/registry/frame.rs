//! Relayed message type
//!
//! Upstream payloads are forwarded verbatim. The relay only remembers whether
//! a payload arrived as a text or a binary frame so it can be re-sent the same
//! way.

use std::sync::Arc;

use bytes::Bytes;

/// A message to be broadcast to subscribers
///
/// Cheap to clone: text is shared through an `Arc<str>` and binary payloads
/// through `Bytes` reference counting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayMessage {
    /// UTF-8 text frame
    Text(Arc<str>),
    /// Binary frame
    Binary(Bytes),
}

impl RelayMessage {
    /// Create a text message
    pub fn text(text: impl AsRef<str>) -> Self {
        RelayMessage::Text(Arc::from(text.as_ref()))
    }

    /// Create a binary message
    pub fn binary(data: impl Into<Bytes>) -> Self {
        RelayMessage::Binary(data.into())
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        match self {
            RelayMessage::Text(text) => text.len(),
            RelayMessage::Binary(data) => data.len(),
        }
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Text content, if this is a text frame
    pub fn as_text(&self) -> Option<&str> {
        match self {
            RelayMessage::Text(text) => Some(text),
            RelayMessage::Binary(_) => None,
        }
    }
}

impl From<String> for RelayMessage {
    fn from(text: String) -> Self {
        RelayMessage::Text(Arc::from(text))
    }
}

impl From<&str> for RelayMessage {
    fn from(text: &str) -> Self {
        RelayMessage::text(text)
    }
}

impl From<Bytes> for RelayMessage {
    fn from(data: Bytes) -> Self {
        RelayMessage::Binary(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_message() {
        let msg = RelayMessage::text(r#"{"inSong":true}"#);
        assert_eq!(msg.as_text(), Some(r#"{"inSong":true}"#));
        assert_eq!(msg.len(), 15);
        assert!(!msg.is_empty());
    }

    #[test]
    fn test_binary_message() {
        let msg = RelayMessage::binary(Bytes::from_static(&[0x01, 0x02]));
        assert_eq!(msg.as_text(), None);
        assert_eq!(msg.len(), 2);
    }

    #[test]
    fn test_clone_shares_payload() {
        let msg = RelayMessage::from(String::from("payload"));
        let copy = msg.clone();

        match (&msg, &copy) {
            (RelayMessage::Text(a), RelayMessage::Text(b)) => assert!(Arc::ptr_eq(a, b)),
            _ => panic!("expected text"),
        }
    }
}
