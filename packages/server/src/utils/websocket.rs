use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use log::{error, info, warn};
use uuid::Uuid;

use crate::models::event::{ClientEvent, ServerEvent};
use crate::services::game_service;
use crate::state::AppState;

pub async fn handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// One task per direction. The connection id doubles as the player id for
/// sessions created or joined over this socket.
pub async fn handle_socket(ws: WebSocket, state: AppState) {
    let connection_id = Uuid::new_v4().to_string();
    info!("New WebSocket connection: {}", connection_id);

    let mut rx = state.hub.register(&connection_id).await;
    let (mut sender, mut receiver) = ws.split();

    let send_id = connection_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    error!("Failed to encode event for {}: {}", send_id, e);
                    continue;
                }
            };
            if let Err(e) = sender.send(Message::Text(text)).await {
                warn!("Error sending to {}: {}", send_id, e);
                break;
            }
        }
    });

    let receive_state = state.clone();
    let receive_id = connection_id.clone();
    let receive_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<ClientEvent>(&text) {
                    Ok(event) => {
                        game_service::handle_client_event(&receive_state, &receive_id, event)
                            .await
                    }
                    Err(e) => {
                        warn!("Malformed frame from {}: {}", receive_id, e);
                        receive_state
                            .hub
                            .send_to(
                                &receive_id,
                                ServerEvent::error(format!("Malformed message: {}", e)),
                            )
                            .await;
                    }
                },
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    if let Err(e) = receive_task.await {
        error!("Receive task for {} failed: {}", connection_id, e);
    }

    // Dropping the hub's sender ends the send task.
    state.hub.unregister(&connection_id).await;
    game_service::disconnect(&state, &connection_id).await;
    let _ = send_task.await;

    info!("WebSocket connection closed: {}", connection_id);
}
