//! WebSocket signaling relay: room membership and peer handshake routing

mod actor;
mod coordinator;
mod messages;
mod registry;
mod server;
mod types;

pub use actor::RoomManagerHandle;
pub use coordinator::Coordinator;
pub use messages::{ClientMessage, ServerMessage};
pub use registry::Registry;
pub use server::{DEFAULT_SIGNALING_PORT, SignalingServer};
pub use types::{
    ConnectionHandle, ConnectionId, OutboundMessage, RoomId, SignalingError, is_uuid_v4,
};
