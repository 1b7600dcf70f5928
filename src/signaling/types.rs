use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Utf8Bytes;
use uuid::{Uuid, Variant, Version};

/// Signaling errors
#[derive(Debug, Error)]
pub enum SignalingError {
    /// The transport handed out an id that is already registered
    #[error("duplicate connection: {0}")]
    DuplicateConnection(ConnectionId),

    #[error("internal error: {0}")]
    Internal(String),
}

const CONNECTION_ID_CHARS: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";
const CONNECTION_ID_LEN: usize = 20;
const HYPHENATED_UUID_LEN: usize = 36;

/// Connection id assigned by the transport, 20 url-safe characters
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        let id = (0..CONNECTION_ID_LEN)
            .map(|_| CONNECTION_ID_CHARS[rng.random_range(0..CONNECTION_ID_CHARS.len())] as char)
            .collect();
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConnectionId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for ConnectionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Room id as sent by clients. Any string is accepted as a membership key;
/// only UUID v4 ids are ever listed back to clients.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_valid(&self) -> bool {
        is_uuid_v4(&self.0)
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for RoomId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// True for the hyphenated textual form of a version 4, RFC 4122 variant UUID.
/// Simple, braced and urn forms are rejected.
pub fn is_uuid_v4(s: &str) -> bool {
    if s.len() != HYPHENATED_UUID_LEN {
        return false;
    }
    match Uuid::parse_str(s) {
        Ok(uuid) => {
            uuid.get_version() == Some(Version::Random) && uuid.get_variant() == Variant::RFC4122
        }
        Err(_) => false,
    }
}

/// Wrapper for outbound WebSocket messages using tungstenite's Utf8Bytes.
#[derive(Debug, Clone)]
pub struct OutboundMessage(Utf8Bytes);

impl OutboundMessage {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Get the inner Utf8Bytes for tungstenite Message::Text
    pub fn into_inner(self) -> Utf8Bytes {
        self.0
    }
}

impl From<String> for OutboundMessage {
    fn from(s: String) -> Self {
        Self(Utf8Bytes::from(s))
    }
}

/// Address of a live connection's writer task. The queue is bounded; a
/// connection whose queue fills up is dropped by the coordinator.
/// Cloning an OutboundMessage is O(1), so broadcasts serialize once.
pub type ConnectionHandle = mpsc::Sender<OutboundMessage>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_id_generate_has_correct_format() {
        let id = ConnectionId::generate();
        assert_eq!(id.as_str().len(), 20);
        for b in id.as_str().bytes() {
            assert!(CONNECTION_ID_CHARS.contains(&b), "Invalid char: {}", b as char);
        }
    }

    #[test]
    fn connection_ids_differ() {
        assert_ne!(ConnectionId::generate(), ConnectionId::generate());
    }

    #[test]
    fn connection_id_keeps_long_client_input() {
        let id = ConnectionId::from("a-peer-id-that-is-much-longer-than-twenty");
        assert_eq!(id.as_str(), "a-peer-id-that-is-much-longer-than-twenty");
    }

    #[test]
    fn accepts_v4_uuid() {
        assert!(is_uuid_v4("0f8fad5b-d9cb-469f-a165-70867728950e"));
        assert!(is_uuid_v4("0F8FAD5B-D9CB-469F-A165-70867728950E"));
    }

    #[test]
    fn rejects_other_versions() {
        // v1
        assert!(!is_uuid_v4("c232ab00-9414-11ec-b3c8-9f6bdeced846"));
        // nil
        assert!(!is_uuid_v4("00000000-0000-0000-0000-000000000000"));
    }

    #[test]
    fn rejects_wrong_variant() {
        assert!(!is_uuid_v4("0f8fad5b-d9cb-469f-c165-70867728950e"));
    }

    #[test]
    fn rejects_non_hyphenated_forms() {
        assert!(!is_uuid_v4("0f8fad5bd9cb469fa16570867728950e"));
        assert!(!is_uuid_v4("{0f8fad5b-d9cb-469f-a165-70867728950e}"));
        assert!(!is_uuid_v4("urn:uuid:0f8fad5b-d9cb-469f-a165-70867728950e"));
    }

    #[test]
    fn rejects_garbage() {
        assert!(!is_uuid_v4(""));
        assert!(!is_uuid_v4("lobby"));
        assert!(!is_uuid_v4("0f8fad5b-d9cb-469f-a165-70867728950z"));
    }

    #[test]
    fn room_id_validity_delegates_to_predicate() {
        assert!(RoomId::from("0f8fad5b-d9cb-469f-a165-70867728950e").is_valid());
        assert!(!RoomId::from("lobby").is_valid());
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let json = serde_json::to_string(&ConnectionId::from("abc")).unwrap();
        assert_eq!(json, "\"abc\"");
        let room: RoomId = serde_json::from_str("\"lobby\"").unwrap();
        assert_eq!(room.as_str(), "lobby");
    }

    #[test]
    fn outbound_message_from_string() {
        let msg = OutboundMessage::from("{\"type\":\"leave\"}".to_string());
        assert_eq!(msg.as_str(), "{\"type\":\"leave\"}");
    }
}
