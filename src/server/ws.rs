use crate::state::{AppState, HubCommand};
use axum::extract::ws::{Message, Utf8Bytes, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let id = Uuid::new_v4();
    let (tx, mut rx) = mpsc::channel::<Utf8Bytes>(state.config.ws_buffer);

    // Send the last priced tick so the client has something before the next one
    let initial = state.latest_rx.borrow().clone();
    if let Some(latest) = initial {
        if let Ok(json) = serde_json::to_string(&latest) {
            if sender.send(Message::Text(json.into())).await.is_err() {
                return;
            }
        }
    }

    if state.hub_tx.send(HubCommand::Subscribe { id, tx }).await.is_err() {
        tracing::error!("subscriber hub closed, refusing websocket");
        return;
    }

    // Forward hub messages to this client
    let mut send_task = tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            if sender.send(Message::Text(payload)).await.is_err() {
                break;
            }
        }
    });

    // Read (and discard) incoming messages; detect disconnect
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Close(_)) | Err(_) => break,
                _ => {} // Ignore client messages
            }
        }
    });

    // Wait for either task to finish (client disconnected)
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    let _ = state.hub_tx.send(HubCommand::Unsubscribe { id }).await;
}
