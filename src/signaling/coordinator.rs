//! Join/leave/relay protocol over the connection registry.
//!
//! Every method runs to completion against the registry before the next event
//! is handled (see the room manager actor), so reading a room's members,
//! introducing the newcomer and committing the membership happen as one step.

use serde_json::Value;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, info, warn};

use super::messages::{ClientMessage, ServerMessage};
use super::registry::Registry;
use super::types::{ConnectionHandle, ConnectionId, RoomId, SignalingError};

pub struct Coordinator {
    registry: Registry,
    /// Connections whose outbound queue was full during the current event
    lagging: Vec<ConnectionId>,
}

impl Coordinator {
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            lagging: Vec::new(),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Register a new connection and refresh everyone's room directory.
    pub fn connect(
        &mut self,
        id: ConnectionId,
        handle: ConnectionHandle,
    ) -> Result<(), SignalingError> {
        self.registry.add_connection(id.clone(), handle)?;
        info!("Connection {} registered", id);
        self.share_rooms();
        self.drop_lagging();
        Ok(())
    }

    /// Route an inbound client action to its handler.
    pub fn dispatch(&mut self, from: &ConnectionId, message: ClientMessage) {
        match message {
            ClientMessage::Join { room } => self.join(from, room),
            ClientMessage::Leave => self.leave(from),
            ClientMessage::RelaySdp {
                peer_id,
                session_description,
            } => self.relay_sdp(from, &peer_id, session_description),
            ClientMessage::RelayIce {
                peer_id,
                ice_candidate,
            } => self.relay_ice(from, &peer_id, ice_candidate),
        }
    }

    pub fn join(&mut self, from: &ConnectionId, room: RoomId) {
        self.join_room(from, room);
        self.drop_lagging();
    }

    fn join_room(&mut self, from: &ConnectionId, room: RoomId) {
        if self.registry.is_member(from, &room) {
            warn!("Connection {} already in room {}", from, room);
            return;
        }
        if !self.registry.contains(from) {
            warn!("Join from unregistered connection {}", from);
            return;
        }

        // The newcomer offers to every existing member; members wait.
        for member in self.registry.members_of(&room) {
            self.send(
                &member,
                &ServerMessage::AddPeer {
                    peer_id: from.clone(),
                    create_offer: false,
                },
            );
            self.send(
                from,
                &ServerMessage::AddPeer {
                    peer_id: member,
                    create_offer: true,
                },
            );
        }

        self.registry.join_room(from, &room);
        info!("Connection {} joined room {}", from, room);
        self.share_rooms();
    }

    pub fn leave(&mut self, from: &ConnectionId) {
        self.leave_all_rooms(from);
        self.share_rooms();
        self.drop_lagging();
    }

    /// Same teardown as `leave`, then forget the connection entirely.
    /// A connection that was already dropped for lagging is skipped.
    pub fn disconnect(&mut self, from: &ConnectionId) {
        if !self.registry.contains(from) {
            debug!("Connection {} already removed", from);
            return;
        }
        self.remove(from);
        self.drop_lagging();
    }

    pub fn relay_sdp(
        &mut self,
        from: &ConnectionId,
        target: &ConnectionId,
        session_description: Value,
    ) {
        debug!("Relaying session description {} -> {}", from, target);
        self.send(
            target,
            &ServerMessage::SessionDescription {
                peer_id: from.clone(),
                session_description,
            },
        );
        self.drop_lagging();
    }

    pub fn relay_ice(&mut self, from: &ConnectionId, target: &ConnectionId, ice_candidate: Value) {
        debug!("Relaying ICE candidate {} -> {}", from, target);
        self.send(
            target,
            &ServerMessage::IceCandidate {
                peer_id: from.clone(),
                ice_candidate,
            },
        );
        self.drop_lagging();
    }

    fn remove(&mut self, id: &ConnectionId) {
        self.leave_all_rooms(id);
        if self.registry.remove_connection(id) {
            info!("Connection {} removed", id);
        }
        self.share_rooms();
    }

    /// Disconnect every connection that stopped draining its queue. Removing
    /// one may overflow another, so this runs until no new laggard appears.
    fn drop_lagging(&mut self) {
        while let Some(id) = self.lagging.pop() {
            if self.registry.contains(&id) {
                warn!("Connection {} is not reading, dropping it", id);
                self.remove(&id);
            }
        }
    }

    /// Tear down peer links in every listed room, notifying both sides.
    /// Memberships in rooms with non-UUID ids are left untouched.
    fn leave_all_rooms(&mut self, from: &ConnectionId) {
        let rooms = self.registry.rooms_of(from);
        for room in rooms.into_iter().filter(RoomId::is_valid) {
            for member in self.registry.members_of(&room) {
                if &member == from {
                    continue;
                }
                self.send(
                    &member,
                    &ServerMessage::RemovePeer {
                        peer_id: from.clone(),
                    },
                );
                self.send(from, &ServerMessage::RemovePeer { peer_id: member });
            }
            self.registry.leave_room(from, &room);
            info!("Connection {} left room {}", from, room);
        }
    }

    fn send(&mut self, to: &ConnectionId, message: &ServerMessage) {
        let Some(handle) = self.registry.handle(to) else {
            debug!("Dropping message for unknown connection {}", to);
            return;
        };
        match message.encode() {
            Ok(frame) => match handle.try_send(frame) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => self.lagging.push(to.clone()),
                Err(TrySendError::Closed(_)) => debug!("Connection {} writer is closed", to),
            },
            Err(e) => error!("Failed to serialize server message: {}", e),
        }
    }

    /// Broadcast the room directory to every connection.
    fn share_rooms(&mut self) {
        let message = ServerMessage::ShareRooms {
            rooms: self.registry.all_room_ids(),
        };
        let frame = match message.encode() {
            Ok(frame) => frame,
            Err(e) => {
                error!("Failed to serialize room list: {}", e);
                return;
            }
        };
        for (id, handle) in self.registry.handles() {
            match handle.try_send(frame.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => self.lagging.push(id.clone()),
                Err(TrySendError::Closed(_)) => debug!("Connection {} writer is closed", id),
            }
        }
    }
}
