use crate::model::{ClientEvent, RelayError};
use async_trait::async_trait;

#[async_trait]
pub trait ClientEventHandler {
    async fn handle_event(&self, event: ClientEvent) -> Result<(), RelayError>;
}
