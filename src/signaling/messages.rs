use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::{ConnectionId, OutboundMessage, RoomId};

/// Messages sent from client to server
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Join a room, introducing this connection to everyone already in it
    #[serde(rename = "join")]
    Join { room: RoomId },

    /// Leave every room this connection is in
    #[serde(rename = "leave")]
    Leave,

    /// Forward a session description to another connection
    #[serde(rename = "relay-sdp")]
    RelaySdp {
        #[serde(rename = "peerID")]
        peer_id: ConnectionId,
        #[serde(rename = "sessionDescription")]
        session_description: Value,
    },

    /// Forward an ICE candidate to another connection
    #[serde(rename = "relay-ice")]
    RelayIce {
        #[serde(rename = "peerID")]
        peer_id: ConnectionId,
        #[serde(rename = "iceCandidate")]
        ice_candidate: Value,
    },
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Open a peer link; the side with `create_offer` sends the first offer
    #[serde(rename = "add-peer")]
    AddPeer {
        #[serde(rename = "peerId")]
        peer_id: ConnectionId,
        #[serde(rename = "createOffer")]
        create_offer: bool,
    },

    /// Close the peer link with this connection
    #[serde(rename = "remove-peer")]
    RemovePeer {
        #[serde(rename = "peerID")]
        peer_id: ConnectionId,
    },

    #[serde(rename = "session-description")]
    SessionDescription {
        #[serde(rename = "peerID")]
        peer_id: ConnectionId,
        #[serde(rename = "sessionDescription")]
        session_description: Value,
    },

    #[serde(rename = "ice-candidate")]
    IceCandidate {
        #[serde(rename = "peerID")]
        peer_id: ConnectionId,
        #[serde(rename = "iceCandidate")]
        ice_candidate: Value,
    },

    /// Directory of every non-empty room, sent to all connections
    #[serde(rename = "share-rooms")]
    ShareRooms { rooms: Vec<RoomId> },
}

impl ServerMessage {
    pub fn encode(&self) -> Result<OutboundMessage, serde_json::Error> {
        serde_json::to_string(self).map(OutboundMessage::from)
    }
}
