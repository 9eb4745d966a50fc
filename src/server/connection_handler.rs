use super::{
    ClientEventHandler, Connection, ConnectionRepository, LifecycleManager, RelayEngine,
    RoomRepository,
};
use crate::config::RelayConfig;
use crate::model::{ClientEvent, ConnectionId, RelayError, RoomId};
use async_trait::async_trait;
use axum::extract::ws::Message;
use std::sync::Arc;
use tokio::sync::mpsc::Sender;
use tracing::{debug, error, instrument, warn};
use uuid::Uuid;

/// Handles the inbound events of a single channel.
///
/// The sender identity of every relayed message is the `connection_id`
/// held here, assigned when the channel opened.
#[derive(Clone)]
pub struct ConnectionHandler {
    connection_id: ConnectionId,
    relay: RelayEngine,
    lifecycle: LifecycleManager,
}

impl ConnectionHandler {
    pub fn new(
        connection_repo: Arc<dyn ConnectionRepository>,
        room_repo: Arc<dyn RoomRepository>,
        config: &RelayConfig,
    ) -> Self {
        let relay = RelayEngine::new(connection_repo.clone(), room_repo.clone(), config);
        let lifecycle = LifecycleManager::new(connection_repo, room_repo, relay.clone());
        ConnectionHandler {
            connection_id: Uuid::new_v4(),
            relay,
            lifecycle,
        }
    }

    /// Handler for a new channel, sharing state with `cloneable` but with a
    /// fresh connection identifier
    pub fn new_from(cloneable: &Self) -> Self {
        ConnectionHandler {
            connection_id: Uuid::new_v4(),
            relay: cloneable.relay.clone(),
            lifecycle: cloneable.lifecycle.clone(),
        }
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    pub async fn connect(&self, sender: Sender<Message>) -> Result<(), RelayError> {
        self.lifecycle
            .on_connect(Connection::new(self.connection_id, sender))
            .await
    }

    pub async fn disconnect(&self) -> Result<Option<RoomId>, RelayError> {
        self.lifecycle.on_disconnect(self.connection_id).await
    }

    /// Parse a text frame and act on it. Errors stay local to this
    /// connection: they are logged and returned, never propagated further.
    #[instrument(skip(self, text), fields(connection_id = %self.connection_id))]
    pub async fn handle_text(&self, text: &str) -> Result<(), RelayError> {
        let event = match ClientEvent::parse(text) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, text = ?text, "Rejected inbound frame");
                return Err(e);
            }
        };
        debug!(event = event.name(), "Parsed event");

        let result = self.handle_event(event).await;
        match &result {
            Err(e) if e.is_client_error() => warn!(error = %e, "Event not relayed"),
            Err(e) => error!(error = %e, "Failed to handle event"),
            Ok(()) => {}
        }
        result
    }
}

#[async_trait]
impl ClientEventHandler for ConnectionHandler {
    async fn handle_event(&self, event: ClientEvent) -> Result<(), RelayError> {
        let from = self.connection_id;
        match event {
            ClientEvent::JoinRoom { email, room } => {
                self.relay.handle_join(from, room, email).await
            }
            ClientEvent::LeaveRoom(_) => self.relay.handle_leave(from).await.map(|_| ()),
            ClientEvent::Call { to, offer } => self.relay.handle_offer(from, to, offer).await,
            ClientEvent::Answer { to, ans } => self.relay.handle_answer(from, to, ans).await,
            ClientEvent::Candidate { to, candidate } => {
                self.relay.handle_candidate(from, to, candidate).await
            }
        }
    }
}
