use super::{websocket_listener, ConnectionHandler, ConnectionRepository, RoomRepository};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, instrument};

pub fn create_signaling_route(connection_handler: ConnectionHandler, channel_capacity: usize) -> Router {
    debug!("Creating signaling route");
    Router::new().route(
        "/socket",
        get(move |ws: WebSocketUpgrade| {
            websocket_listener::handle_websocket(
                ws,
                ConnectionHandler::new_from(&connection_handler),
                channel_capacity,
            )
        }),
    )
}

#[derive(Clone)]
struct HealthState {
    connection_repo: Arc<dyn ConnectionRepository>,
    room_repo: Arc<dyn RoomRepository>,
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub connections: usize,
    pub rooms: usize,
}

pub fn create_health_route(
    connection_repo: Arc<dyn ConnectionRepository>,
    room_repo: Arc<dyn RoomRepository>,
) -> Router {
    Router::new()
        .route("/health", get(health))
        .with_state(HealthState {
            connection_repo,
            room_repo,
        })
}

#[instrument(skip(state))]
async fn health(State(state): State<HealthState>) -> impl IntoResponse {
    let connections = state.connection_repo.get_all_connections().await;
    let rooms = state.room_repo.room_count().await;
    match (connections, rooms) {
        (Ok(connections), Ok(rooms)) => (
            StatusCode::OK,
            Json(HealthReport {
                status: "ok",
                connections: connections.len(),
                rooms,
            }),
        ),
        (connections, rooms) => {
            error!(?connections, ?rooms, "Health check failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(HealthReport {
                    status: "error",
                    connections: 0,
                    rooms: 0,
                }),
            )
        }
    }
}
