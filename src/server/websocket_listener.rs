use super::ConnectionHandler;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::WebSocketUpgrade;
use axum::response::IntoResponse;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::ops::ControlFlow;
use tokio::sync::mpsc::Receiver;
use tracing::{debug, error, info, instrument, warn};

#[instrument(skip(ws, connection_handler), fields(connection_id = %connection_handler.connection_id()))]
pub async fn handle_websocket(
    ws: WebSocketUpgrade,
    connection_handler: ConnectionHandler,
    channel_capacity: usize,
) -> impl IntoResponse {
    debug!("New WebSocket upgrade request");
    ws.on_upgrade(move |socket| listen(socket, connection_handler, channel_capacity))
}

#[instrument(skip(socket, connection_handler), fields(connection_id = %connection_handler.connection_id()))]
async fn listen(socket: WebSocket, connection_handler: ConnectionHandler, channel_capacity: usize) {
    debug!("WebSocket connection established");
    let (ws_sender, ws_receiver) = socket.split();
    let (tx, rx) = tokio::sync::mpsc::channel(channel_capacity);

    // The outgoing pump must be running before the greeting is queued,
    // otherwise a full queue would stall the handshake.
    let mut sender_task = tokio::spawn(handle_outgoing_messages(rx, ws_sender));

    if let Err(e) = connection_handler.connect(tx).await {
        error!(error = %e, "Failed to register connection");
        sender_task.abort();
        return;
    }

    let receiver_task = handle_incoming_messages(ws_receiver, &connection_handler);

    tokio::select! {
        _ = &mut sender_task => {
            info!("Sender task completed");
        }
        _ = receiver_task => {
            info!("Receiver task completed");
        }
    }

    if let Err(e) = connection_handler.disconnect().await {
        error!(error = %e, "Failed to disconnect");
    }
    // Frames still queued for a closed socket are discarded.
    sender_task.abort();
}

#[instrument(skip(rx, ws_sender))]
pub async fn handle_outgoing_messages(
    mut rx: Receiver<Message>,
    mut ws_sender: SplitSink<WebSocket, Message>,
) {
    debug!("Started handling outgoing messages");
    while let Some(msg) = rx.recv().await {
        if let Err(e) = ws_sender.send(msg).await {
            error!(error = ?e, "Failed to send message");
            break;
        }
    }
}

#[instrument(skip(receiver, connection_handler))]
pub async fn handle_incoming_messages(
    mut receiver: SplitStream<WebSocket>,
    connection_handler: &ConnectionHandler,
) {
    debug!("Started handling incoming messages");
    while let Some(message) = receiver.next().await {
        match message {
            Ok(message) => {
                if handle_message(message, connection_handler).await.is_break() {
                    break;
                }
            }
            Err(e) => {
                error!(error = ?e, "Failed to receive message");
                break;
            }
        }
    }
}

/// Act on one frame. Breaks when the client closed the channel.
pub async fn handle_message(
    message: Message,
    connection_handler: &ConnectionHandler,
) -> ControlFlow<()> {
    match message {
        Message::Text(text) => {
            // Errors are already logged by the handler and never end the channel.
            let _ = connection_handler.handle_text(&text).await;
            ControlFlow::Continue(())
        }
        Message::Close(_) => {
            info!(connection_id = %connection_handler.connection_id(), "Client disconnected");
            ControlFlow::Break(())
        }
        Message::Ping(_) | Message::Pong(_) => ControlFlow::Continue(()),
        Message::Binary(_) => {
            warn!(
                connection_id = %connection_handler.connection_id(),
                "Unsupported binary message"
            );
            ControlFlow::Continue(())
        }
    }
}
