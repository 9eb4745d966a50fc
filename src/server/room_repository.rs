use crate::model::{
    CallEvent, CallTransition, ConnectionId, Departure, JoinOutcome, JoinPolicy, RelayError,
    RoomId,
};
use async_trait::async_trait;
use std::collections::HashSet;

/// Room membership store. Each method is one atomic step on the directory.
#[async_trait]
pub trait RoomRepository: Send + Sync {
    async fn register_participant(&self, connection_id: ConnectionId) -> Result<(), RelayError>;

    async fn join_room(
        &self,
        connection_id: ConnectionId,
        room_id: RoomId,
        label: Option<String>,
        policy: JoinPolicy,
    ) -> Result<JoinOutcome, RelayError>;

    async fn leave_room(&self, connection_id: ConnectionId)
        -> Result<Option<Departure>, RelayError>;

    /// Leave the room and forget the participant entirely
    async fn remove_participant(
        &self,
        connection_id: ConnectionId,
    ) -> Result<Option<Departure>, RelayError>;

    async fn room_of(&self, connection_id: ConnectionId) -> Result<Option<RoomId>, RelayError>;

    async fn members_of(&self, room_id: &str) -> Result<HashSet<ConnectionId>, RelayError>;

    async fn record_call_event(
        &self,
        connection_id: ConnectionId,
        event: CallEvent,
    ) -> Result<Option<CallTransition>, RelayError>;

    async fn room_count(&self) -> Result<usize, RelayError>;
}
