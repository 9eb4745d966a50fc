use super::{CallEvent, CallTransition, ConnectionId, Participant, RelayError, Room, RoomId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// What happens when a participant asks to join a room while already in
/// another one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinPolicy {
    /// Refuse with `AlreadyInRoom`
    #[default]
    Reject,
    /// Leave the previous room, then join the new one
    Transfer,
}

impl FromStr for JoinPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(JoinPolicy::Reject),
            "transfer" => Ok(JoinPolicy::Transfer),
            other => Err(format!("unknown join policy: {other}")),
        }
    }
}

impl fmt::Display for JoinPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinPolicy::Reject => write!(f, "reject"),
            JoinPolicy::Transfer => write!(f, "transfer"),
        }
    }
}

/// Another room member, as reported to a joiner.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Member {
    pub connection_id: ConnectionId,
    pub label: Option<String>,
}

/// A participant left a room.
#[derive(Debug, Clone, PartialEq)]
pub struct Departure {
    pub connection_id: ConnectionId,
    pub label: Option<String>,
    pub room_id: RoomId,
    /// Members still in the room afterwards
    pub remaining: Vec<ConnectionId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinOutcome {
    pub room_id: RoomId,
    /// Other members, taken before the joiner was added
    pub members: Vec<Member>,
    /// Set when the joiner was moved out of a different room
    pub departure: Option<Departure>,
}

/// In-memory registry of rooms and participants.
///
/// Keeps the membership bijection: a connection is listed in a room's member
/// set if and only if that room is the participant's current room. Every
/// mutation updates both sides before returning, so wrapping the directory
/// in a single lock is enough to make each operation atomic.
#[derive(Debug, Default, Clone)]
pub struct SessionDirectory {
    rooms: HashMap<RoomId, Room>,
    participants: HashMap<ConnectionId, Participant>,
}

impl SessionDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly connected participant. Re-registering an existing
    /// connection keeps its state.
    pub fn register(&mut self, connection_id: ConnectionId) -> &Participant {
        self.participants
            .entry(connection_id)
            .or_insert_with(|| Participant::new(connection_id))
    }

    pub fn join(
        &mut self,
        connection_id: ConnectionId,
        room_id: RoomId,
        label: Option<String>,
        policy: JoinPolicy,
    ) -> Result<JoinOutcome, RelayError> {
        let current = self
            .participants
            .get(&connection_id)
            .and_then(|p| p.room_id().cloned());

        let departure = match current {
            Some(current) if current != room_id => match policy {
                JoinPolicy::Reject => {
                    return Err(RelayError::AlreadyInRoom {
                        connection_id,
                        room_id: current,
                    })
                }
                JoinPolicy::Transfer => self.leave(connection_id),
            },
            _ => None,
        };

        let room = self
            .rooms
            .entry(room_id.clone())
            .or_insert_with(|| Room::new(room_id.clone()));
        let others: Vec<ConnectionId> = room.others(&connection_id).copied().collect();
        room.insert(connection_id);

        let participant = self
            .participants
            .entry(connection_id)
            .or_insert_with(|| Participant::new(connection_id));
        participant.set_label(label);
        participant.set_room(Some(room_id.clone()));
        let next = participant.call_state().apply(CallEvent::Joined).next;
        participant.set_call_state(next);

        let members = others
            .into_iter()
            .map(|id| Member {
                connection_id: id,
                label: self
                    .participants
                    .get(&id)
                    .and_then(|p| p.label().map(str::to_string)),
            })
            .collect();

        Ok(JoinOutcome {
            room_id,
            members,
            departure,
        })
    }

    /// Remove the participant from its room. No-op when it has none.
    pub fn leave(&mut self, connection_id: ConnectionId) -> Option<Departure> {
        let participant = self.participants.get_mut(&connection_id)?;
        let room_id = participant.room_id().cloned()?;
        let label = participant.label().map(str::to_string);
        participant.set_room(None);
        let next = participant.call_state().apply(CallEvent::Left).next;
        participant.set_call_state(next);

        let mut remaining = Vec::new();
        if let Some(room) = self.rooms.get_mut(&room_id) {
            room.remove(&connection_id);
            remaining.extend(room.members().iter().copied());
            if room.is_empty() {
                self.rooms.remove(&room_id);
                debug!(%room_id, "Removed empty room");
            }
        }

        self.release_peer(connection_id);

        Some(Departure {
            connection_id,
            label,
            room_id,
            remaining,
        })
    }

    /// Drop every trace of the participant. Returns the departure if it
    /// was in a room.
    pub fn remove(&mut self, connection_id: ConnectionId) -> Option<Departure> {
        let departure = self.leave(connection_id);
        self.participants.remove(&connection_id);
        self.release_peer(connection_id);
        departure
    }

    pub fn room_of(&self, connection_id: &ConnectionId) -> Option<&RoomId> {
        self.participants
            .get(connection_id)
            .and_then(|p| p.room_id())
    }

    pub fn members_of(&self, room_id: &str) -> HashSet<ConnectionId> {
        self.rooms
            .get(room_id)
            .map(|room| room.members().clone())
            .unwrap_or_default()
    }

    pub fn participant(&self, connection_id: &ConnectionId) -> Option<&Participant> {
        self.participants.get(connection_id)
    }

    pub fn room(&self, room_id: &str) -> Option<&Room> {
        self.rooms.get(room_id)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    /// Apply a call event to a participant's state. Returns `None` for
    /// unknown connections.
    pub fn record_call_event(
        &mut self,
        connection_id: ConnectionId,
        event: CallEvent,
    ) -> Option<CallTransition> {
        let participant = self.participants.get_mut(&connection_id)?;
        let transition = participant.call_state().apply(event);
        participant.set_call_state(transition.next);
        Some(transition)
    }

    /// Check the membership bijection in both directions
    pub fn is_consistent(&self) -> bool {
        let rooms_agree = self.rooms.iter().all(|(room_id, room)| {
            !room.is_empty()
                && room.id() == room_id
                && room
                    .members()
                    .iter()
                    .all(|id| self.room_of(id) == Some(room_id))
        });

        let participants_agree = self.participants.iter().all(|(id, participant)| {
            match participant.room_id() {
                Some(room_id) => self.rooms.get(room_id).is_some_and(|room| room.contains(id)),
                None => self.rooms.values().all(|room| !room.contains(id)),
            }
        });

        rooms_agree && participants_agree
    }

    // Anyone mid-call with the departed connection falls back to a settled state.
    fn release_peer(&mut self, departed: ConnectionId) {
        for participant in self.participants.values_mut() {
            if participant.call_state().peer() != Some(departed) {
                continue;
            }
            let next = participant
                .call_state()
                .apply(CallEvent::PeerGone { peer: departed })
                .next;
            let next = if participant.is_in_room() {
                next
            } else {
                next.apply(CallEvent::Left).next
            };
            participant.set_call_state(next);
        }
    }
}
