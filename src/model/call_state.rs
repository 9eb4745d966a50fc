use super::ConnectionId;
use serde::{Deserialize, Serialize};

/// Call setup progress of a single participant.
///
/// Tracked for observability only. The relay never refuses or reorders a
/// message because of it; unexpected transitions are still applied and
/// flagged so the caller can log them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CallState {
    #[default]
    Idle,
    InRoom,
    OfferSent { to: ConnectionId },
    MustAnswer { from: ConnectionId },
    Connected { peer: ConnectionId },
}

/// Something the relay observed that moves a participant's call state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallEvent {
    Joined,
    Left,
    OfferSent { to: ConnectionId },
    OfferReceived { from: ConnectionId },
    AnswerSent { to: ConnectionId },
    AnswerReceived { from: ConnectionId },
    /// The remote side of the current call went away
    PeerGone { peer: ConnectionId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallTransition {
    pub previous: CallState,
    pub next: CallState,
    pub expected: bool,
}

impl CallState {
    /// The other participant this state refers to, if any
    pub fn peer(&self) -> Option<ConnectionId> {
        match *self {
            CallState::OfferSent { to } => Some(to),
            CallState::MustAnswer { from } => Some(from),
            CallState::Connected { peer } => Some(peer),
            CallState::Idle | CallState::InRoom => None,
        }
    }

    pub fn apply(self, event: CallEvent) -> CallTransition {
        let (next, expected) = match (self, event) {
            (_, CallEvent::Joined) => (CallState::InRoom, true),
            (_, CallEvent::Left) => (CallState::Idle, true),

            // A new offer is fine from a settled state, including renegotiation
            // of an established call.
            (CallState::InRoom | CallState::Connected { .. }, CallEvent::OfferSent { to }) => {
                (CallState::OfferSent { to }, true)
            }
            (_, CallEvent::OfferSent { to }) => (CallState::OfferSent { to }, false),

            (
                CallState::InRoom | CallState::Connected { .. },
                CallEvent::OfferReceived { from },
            ) => (CallState::MustAnswer { from }, true),
            (_, CallEvent::OfferReceived { from }) => (CallState::MustAnswer { from }, false),

            (CallState::MustAnswer { from }, CallEvent::AnswerSent { to }) => {
                (CallState::Connected { peer: to }, from == to)
            }
            (_, CallEvent::AnswerSent { to }) => (CallState::Connected { peer: to }, false),

            (CallState::OfferSent { to }, CallEvent::AnswerReceived { from }) => {
                (CallState::Connected { peer: from }, to == from)
            }
            (_, CallEvent::AnswerReceived { from }) => (CallState::Connected { peer: from }, false),

            (state, CallEvent::PeerGone { peer }) if state.peer() == Some(peer) => {
                (CallState::InRoom, true)
            }
            (state, CallEvent::PeerGone { .. }) => (state, true),
        };

        CallTransition {
            previous: self,
            next,
            expected,
        }
    }
}
