use super::{ConnectionId, RoomId};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RelayError {
    #[error("Connection {connection_id} is already in room {room_id}")]
    AlreadyInRoom {
        connection_id: ConnectionId,
        room_id: RoomId,
    },

    #[error("Unknown target: {0}")]
    UnknownTarget(ConnectionId),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RelayError {
    pub fn malformed(reason: impl ToString) -> Self {
        RelayError::MalformedPayload(reason.to_string())
    }

    pub fn internal(reason: impl ToString) -> Self {
        RelayError::Internal(reason.to_string())
    }

    /// Errors caused by the request of a single participant, as opposed to
    /// failures of the relay itself
    pub fn is_client_error(&self) -> bool {
        !matches!(self, RelayError::Internal(_))
    }
}
