use super::ConnectionId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Caller-supplied room identifier. Opaque to the relay.
pub type RoomId = String;

/// A room and the connections currently joined to it.
///
/// Rooms are created implicitly by the first join and dropped from the
/// directory as soon as the last member leaves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    id: RoomId,
    members: HashSet<ConnectionId>,
}

impl Room {
    pub fn new(id: RoomId) -> Self {
        Self {
            id,
            members: HashSet::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn members(&self) -> &HashSet<ConnectionId> {
        &self.members
    }

    pub fn contains(&self, connection_id: &ConnectionId) -> bool {
        self.members.contains(connection_id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Members other than `connection_id`
    pub fn others(&self, connection_id: &ConnectionId) -> impl Iterator<Item = &ConnectionId> {
        let connection_id = *connection_id;
        self.members.iter().filter(move |id| **id != connection_id)
    }

    pub(crate) fn insert(&mut self, connection_id: ConnectionId) -> bool {
        self.members.insert(connection_id)
    }

    pub(crate) fn remove(&mut self, connection_id: &ConnectionId) -> bool {
        self.members.remove(connection_id)
    }
}
