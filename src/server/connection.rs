use crate::model::{ConnectionId, RelayError, ServerEvent};
use axum::extract::ws::Message;
use tokio::sync::mpsc::Sender;

/// Outbound handle of a live channel.
#[derive(Debug, Clone)]
pub struct Connection {
    pub connection_id: ConnectionId,
    pub sender: Sender<Message>,
}

impl PartialEq for Connection {
    fn eq(&self, other: &Self) -> bool {
        self.connection_id == other.connection_id
    }
}

impl Connection {
    pub fn new(connection_id: ConnectionId, sender: Sender<Message>) -> Self {
        Connection {
            connection_id,
            sender,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Queue an event on the channel. Fails with `UnknownTarget` when the
    /// channel has already gone away.
    pub async fn deliver(&self, event: &ServerEvent) -> Result<(), RelayError> {
        let text = event.to_json()?;
        self.sender
            .send(Message::Text(text))
            .await
            .map_err(|_| RelayError::UnknownTarget(self.connection_id))
    }
}
