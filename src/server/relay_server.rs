use super::{create_health_route, create_signaling_route, ConnectionHandler, MemoryStorage, ServerError};
use crate::config::RelayConfig;
use axum::Router;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::info;

/// Signaling relay over WebSockets, backed by in-memory storage.
pub struct RelayServer {
    config: RelayConfig,
    storage: Arc<MemoryStorage>,
}

impl RelayServer {
    pub fn new(config: RelayConfig) -> Self {
        RelayServer {
            config,
            storage: Arc::new(MemoryStorage::new()),
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn storage(&self) -> Arc<MemoryStorage> {
        self.storage.clone()
    }

    pub fn router(&self) -> Router {
        let connection_handler =
            ConnectionHandler::new(self.storage.clone(), self.storage.clone(), &self.config);

        Router::new()
            .merge(create_signaling_route(
                connection_handler,
                self.config.channel_capacity,
            ))
            .merge(create_health_route(
                self.storage.clone(),
                self.storage.clone(),
            ))
            .layer(CorsLayer::permissive())
    }

    /// Bind the configured address and serve until ctrl-c.
    pub async fn run(self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.config.bind_address).await?;
        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on an already bound listener until `shutdown` resolves.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let address: SocketAddr = listener.local_addr()?;
        info!(%address, join_policy = %self.config.join_policy, "Relay listening on ws://{}/socket", address);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Relay stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
