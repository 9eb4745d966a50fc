use super::{Connection, ConnectionRepository, RelayEngine, RoomRepository};
use crate::model::{ConnectionId, RelayError, RoomId, ServerEvent};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Keeps the registry and directory in step with channel connect and
/// disconnect events.
#[derive(Clone)]
pub struct LifecycleManager {
    connection_repo: Arc<dyn ConnectionRepository>,
    room_repo: Arc<dyn RoomRepository>,
    relay: RelayEngine,
}

impl LifecycleManager {
    pub fn new(
        connection_repo: Arc<dyn ConnectionRepository>,
        room_repo: Arc<dyn RoomRepository>,
        relay: RelayEngine,
    ) -> Self {
        LifecycleManager {
            connection_repo,
            room_repo,
            relay,
        }
    }

    /// Make the connection reachable and greet it with its own identifier.
    #[instrument(skip(self, connection), fields(connection_id = %connection.connection_id))]
    pub async fn on_connect(&self, connection: Connection) -> Result<(), RelayError> {
        let connection_id = connection.connection_id;
        self.connection_repo.add_connection(connection).await?;
        self.room_repo.register_participant(connection_id).await?;
        info!("Participant connected");

        if let Err(e) = self
            .relay
            .send_event(connection_id, ServerEvent::Connected { id: connection_id })
            .await
        {
            warn!(error = %e, "Failed to greet participant");
        }
        Ok(())
    }

    /// Forget the connection. Safe to call more than once.
    #[instrument(skip(self))]
    pub async fn on_disconnect(
        &self,
        connection_id: ConnectionId,
    ) -> Result<Option<RoomId>, RelayError> {
        // Unreachable first, so relays racing this disconnect fail fast
        // instead of queueing into a dead channel.
        self.connection_repo.remove_connection(connection_id).await?;

        let departure = self.room_repo.remove_participant(connection_id).await?;
        match departure {
            Some(departure) => {
                info!(room_id = %departure.room_id, remaining = departure.remaining.len(), "Participant disconnected");
                self.relay.announce_departure(&departure).await;
                Ok(Some(departure.room_id))
            }
            None => {
                info!("Participant disconnected");
                Ok(None)
            }
        }
    }
}
