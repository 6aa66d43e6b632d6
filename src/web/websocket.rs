use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Router,
};
use futures::{sink::SinkExt, stream::StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error};

use crate::backup::{BackupManager, JobStatus};

/// Push-based alternative to polling `/api/status`.
pub fn routes() -> Router<BackupManager> {
    Router::new().route("/", get(websocket_handler))
}

async fn websocket_handler(ws: WebSocketUpgrade, State(manager): State<BackupManager>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, manager))
}

fn status_message(status: &JobStatus) -> Option<Message> {
    match serde_json::to_string(status) {
        Ok(text) => Some(Message::Text(text)),
        Err(e) => {
            error!("Failed to encode status: {}", e);
            None
        }
    }
}

async fn handle_socket(socket: WebSocket, manager: BackupManager) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before reading the snapshot so no update falls in between
    let mut event_rx = manager.subscribe_events();

    if let Some(msg) = status_message(&manager.get_status()) {
        if let Err(e) = sender.send(msg).await {
            error!("Failed to send initial status: {}", e);
            return;
        }
    }

    let mut send_task = tokio::spawn(async move {
        loop {
            let status = match event_rx.recv().await {
                Ok(status) => status,
                // Slow client: skip to the newest snapshot
                Err(RecvError::Lagged(skipped)) => {
                    debug!("WebSocket client lagged by {} updates", skipped);
                    manager.get_status()
                }
                Err(RecvError::Closed) => break,
            };

            let Some(msg) = status_message(&status) else {
                continue;
            };
            if sender.send(msg).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Close(_) = msg {
                debug!("WebSocket closed by client");
                break;
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    }

    debug!("WebSocket connection closed");
}
