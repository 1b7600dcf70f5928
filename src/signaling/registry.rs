use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::warn;

use super::types::{ConnectionHandle, ConnectionId, RoomId, SignalingError};

/// Live connections and their room memberships.
///
/// Membership edges are stored once, keyed by room. A connection's room set
/// is derived from that map, so the per-room and per-connection views cannot
/// disagree. A room exists exactly while its member set is non-empty.
#[derive(Debug, Default)]
pub struct Registry {
    connections: HashMap<ConnectionId, ConnectionHandle>,
    rooms: BTreeMap<RoomId, BTreeSet<ConnectionId>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_connection(
        &mut self,
        id: ConnectionId,
        handle: ConnectionHandle,
    ) -> Result<(), SignalingError> {
        if self.connections.contains_key(&id) {
            return Err(SignalingError::DuplicateConnection(id));
        }
        self.connections.insert(id, handle);
        Ok(())
    }

    /// Drop the connection and every membership it holds. Returns false if
    /// the connection was not registered.
    pub fn remove_connection(&mut self, id: &ConnectionId) -> bool {
        self.rooms.retain(|_, members| {
            members.remove(id);
            !members.is_empty()
        });
        self.connections.remove(id).is_some()
    }

    /// Returns true if the edge was added.
    pub fn join_room(&mut self, id: &ConnectionId, room: &RoomId) -> bool {
        if !self.connections.contains_key(id) {
            warn!("Unknown connection {} cannot join room {}", id, room);
            return false;
        }
        let added = self
            .rooms
            .entry(room.clone())
            .or_default()
            .insert(id.clone());
        if !added {
            warn!("Connection {} already in room {}", id, room);
        }
        added
    }

    /// Returns true if the edge existed.
    pub fn leave_room(&mut self, id: &ConnectionId, room: &RoomId) -> bool {
        let Some(members) = self.rooms.get_mut(room) else {
            return false;
        };
        let removed = members.remove(id);
        if members.is_empty() {
            self.rooms.remove(room);
        }
        removed
    }

    pub fn members_of(&self, room: &RoomId) -> BTreeSet<ConnectionId> {
        self.rooms.get(room).cloned().unwrap_or_default()
    }

    pub fn rooms_of(&self, id: &ConnectionId) -> BTreeSet<RoomId> {
        self.rooms
            .iter()
            .filter(|(_, members)| members.contains(id))
            .map(|(room, _)| room.clone())
            .collect()
    }

    pub fn is_member(&self, id: &ConnectionId, room: &RoomId) -> bool {
        self.rooms
            .get(room)
            .is_some_and(|members| members.contains(id))
    }

    /// Every non-empty room whose id is a UUID v4, in sorted order.
    pub fn all_room_ids(&self) -> Vec<RoomId> {
        self.rooms
            .keys()
            .filter(|room| room.is_valid())
            .cloned()
            .collect()
    }

    pub fn handle(&self, id: &ConnectionId) -> Option<&ConnectionHandle> {
        self.connections.get(id)
    }

    pub fn handles(&self) -> impl Iterator<Item = (&ConnectionId, &ConnectionHandle)> {
        self.connections.iter()
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.connections.contains_key(id)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}
