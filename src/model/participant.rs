use super::{CallState, RoomId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Server-assigned identifier of a live channel connection.
pub type ConnectionId = Uuid;

/// A connected endpoint, as seen by the session directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    /// Identifier of the channel this participant is connected through
    connection_id: ConnectionId,

    /// Display label supplied on join (observability only)
    label: Option<String>,

    /// Room the participant currently belongs to
    room_id: Option<RoomId>,

    /// Progress of call setup relative to this participant
    call_state: CallState,
}

impl Participant {
    pub fn new(connection_id: ConnectionId) -> Self {
        Self {
            connection_id,
            label: None,
            room_id: None,
            call_state: CallState::Idle,
        }
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn room_id(&self) -> Option<&RoomId> {
        self.room_id.as_ref()
    }

    pub fn call_state(&self) -> CallState {
        self.call_state
    }

    pub fn is_in_room(&self) -> bool {
        self.room_id.is_some()
    }

    pub(crate) fn set_label(&mut self, label: Option<String>) {
        self.label = label;
    }

    pub(crate) fn set_room(&mut self, room_id: Option<RoomId>) {
        self.room_id = room_id;
    }

    pub(crate) fn set_call_state(&mut self, call_state: CallState) {
        self.call_state = call_state;
    }
}
