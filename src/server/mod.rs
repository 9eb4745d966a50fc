mod connection;
mod connection_handler;
mod connection_repository;
mod error;
mod event_handler;
mod lifecycle;
mod memory_storage;
mod relay;
mod relay_server;
mod room_repository;
pub mod route;
pub mod telemetry;
pub mod websocket_listener;

pub use connection::Connection;
pub use connection_handler::ConnectionHandler;
pub use connection_repository::ConnectionRepository;
pub use error::ServerError;
pub use event_handler::ClientEventHandler;
pub use lifecycle::LifecycleManager;
pub use memory_storage::MemoryStorage;
pub use relay::RelayEngine;
pub use relay_server::RelayServer;
pub use room_repository::RoomRepository;
pub use route::{create_health_route, create_signaling_route};
