use super::Connection;
use crate::model::{ConnectionId, RelayError};
use async_trait::async_trait;

/// Reachability registry: which connections currently have an open channel.
#[async_trait]
pub trait ConnectionRepository: Send + Sync {
    async fn add_connection(&self, connection: Connection) -> Result<(), RelayError>;
    async fn remove_connection(&self, id: ConnectionId) -> Result<Option<Connection>, RelayError>;
    async fn get_connection(&self, id: ConnectionId) -> Result<Option<Connection>, RelayError>;
    async fn get_all_connections(&self) -> Result<Vec<Connection>, RelayError>;
}
