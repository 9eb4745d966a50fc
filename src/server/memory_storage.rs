use super::{Connection, ConnectionRepository, RoomRepository};
use crate::model::{
    CallEvent, CallTransition, ConnectionId, Departure, JoinOutcome, JoinPolicy, RelayError,
    RoomId, SessionDirectory,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use tracing::{debug, error, instrument};

/// Process-lifetime storage backing both repositories.
///
/// The directory sits behind a single lock so that compound operations
/// (read members, then insert) cannot interleave. No lock is ever held
/// across an `.await`.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    connections: Arc<RwLock<HashMap<ConnectionId, Connection>>>,
    directory: Arc<RwLock<SessionDirectory>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current directory state
    pub fn snapshot(&self) -> Result<SessionDirectory, RelayError> {
        self.read_directory(|directory| directory.clone())
    }

    fn read_directory<T>(&self, f: impl FnOnce(&SessionDirectory) -> T) -> Result<T, RelayError> {
        match self.directory.read() {
            Ok(directory) => Ok(f(&directory)),
            Err(e) => {
                error!(?e, "Failed to read directory");
                Err(RelayError::internal(e))
            }
        }
    }

    fn write_directory<T>(
        &self,
        f: impl FnOnce(&mut SessionDirectory) -> T,
    ) -> Result<T, RelayError> {
        match self.directory.write() {
            Ok(mut directory) => Ok(f(&mut directory)),
            Err(e) => {
                error!(?e, "Failed to write directory");
                Err(RelayError::internal(e))
            }
        }
    }
}

#[async_trait]
impl ConnectionRepository for MemoryStorage {
    #[instrument(skip(self, connection), fields(connection_id = %connection.connection_id))]
    async fn add_connection(&self, connection: Connection) -> Result<(), RelayError> {
        debug!("Adding connection");
        match self.connections.write() {
            Ok(mut connections) => {
                connections.insert(connection.connection_id, connection);
                Ok(())
            }
            Err(e) => {
                error!(?e, "Failed to add connection");
                Err(RelayError::internal(e))
            }
        }
    }

    #[instrument(skip(self))]
    async fn remove_connection(&self, id: ConnectionId) -> Result<Option<Connection>, RelayError> {
        debug!("Removing connection");
        match self.connections.write() {
            Ok(mut connections) => Ok(connections.remove(&id)),
            Err(e) => {
                error!(?e, "Failed to remove connection");
                Err(RelayError::internal(e))
            }
        }
    }

    #[instrument(skip(self))]
    async fn get_connection(&self, id: ConnectionId) -> Result<Option<Connection>, RelayError> {
        match self.connections.read() {
            Ok(connections) => Ok(connections.get(&id).cloned()),
            Err(e) => {
                error!(?e, "Failed to get connection");
                Err(RelayError::internal(e))
            }
        }
    }

    #[instrument(skip(self))]
    async fn get_all_connections(&self) -> Result<Vec<Connection>, RelayError> {
        match self.connections.read() {
            Ok(connections) => {
                let connections: Vec<_> = connections.values().cloned().collect();
                debug!(connection_count = connections.len(), "Retrieved all connections");
                Ok(connections)
            }
            Err(e) => {
                error!(?e, "Failed to get all connections");
                Err(RelayError::internal(e))
            }
        }
    }
}

#[async_trait]
impl RoomRepository for MemoryStorage {
    #[instrument(skip(self))]
    async fn register_participant(&self, connection_id: ConnectionId) -> Result<(), RelayError> {
        self.write_directory(|directory| {
            directory.register(connection_id);
        })
    }

    #[instrument(skip(self, label))]
    async fn join_room(
        &self,
        connection_id: ConnectionId,
        room_id: RoomId,
        label: Option<String>,
        policy: JoinPolicy,
    ) -> Result<JoinOutcome, RelayError> {
        debug!("Adding participant to room");
        self.write_directory(|directory| directory.join(connection_id, room_id, label, policy))?
    }

    #[instrument(skip(self))]
    async fn leave_room(
        &self,
        connection_id: ConnectionId,
    ) -> Result<Option<Departure>, RelayError> {
        self.write_directory(|directory| directory.leave(connection_id))
    }

    #[instrument(skip(self))]
    async fn remove_participant(
        &self,
        connection_id: ConnectionId,
    ) -> Result<Option<Departure>, RelayError> {
        self.write_directory(|directory| directory.remove(connection_id))
    }

    async fn room_of(&self, connection_id: ConnectionId) -> Result<Option<RoomId>, RelayError> {
        self.read_directory(|directory| directory.room_of(&connection_id).cloned())
    }

    async fn members_of(&self, room_id: &str) -> Result<HashSet<ConnectionId>, RelayError> {
        self.read_directory(|directory| directory.members_of(room_id))
    }

    async fn record_call_event(
        &self,
        connection_id: ConnectionId,
        event: CallEvent,
    ) -> Result<Option<CallTransition>, RelayError> {
        self.write_directory(|directory| directory.record_call_event(connection_id, event))
    }

    async fn room_count(&self) -> Result<usize, RelayError> {
        self.read_directory(SessionDirectory::room_count)
    }
}
