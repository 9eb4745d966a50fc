pub mod config;
pub mod model;

#[cfg(feature = "server")]
pub mod server;

pub mod prelude {
    pub use crate::config::RelayConfig;
    pub use crate::model::CallState;
    pub use crate::model::ClientEvent;
    pub use crate::model::ConnectionId;
    pub use crate::model::JoinPolicy;
    pub use crate::model::Participant;
    pub use crate::model::RelayError;
    pub use crate::model::Room;
    pub use crate::model::RoomId;
    pub use crate::model::ServerEvent;
    pub use crate::model::SessionDirectory;
    #[cfg(feature = "server")]
    pub use crate::server::RelayServer;
}
