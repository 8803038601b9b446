use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::StreamExt;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::state::AppState;

#[derive(Deserialize)]
pub struct WsQuery {
    user_id: Uuid,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, query.user_id))
}

/// One live lane per user plus the shared broadcast lane. Detaches the user
/// when either side of the socket goes away.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>, user_id: Uuid) {
    let (mut sender, mut receiver) = socket.split();
    let mut personal_rx = state.live.attach(user_id);
    let mut broadcast_rx = state.live.subscribe_broadcast();

    info!(%user_id, "live channel attached");

    let send_task = tokio::spawn(async move {
        loop {
            let payload = tokio::select! {
                msg = personal_rx.recv() => match msg {
                    Some(payload) => payload,
                    None => break,
                },
                msg = broadcast_rx.recv() => match msg {
                    Ok(payload) => payload,
                    // Lagged subscribers skip ahead; closed means shutdown.
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                },
            };

            if sender.send(Message::Text(payload)).await.is_err() {
                break;
            }
        }
    });

    let recv_task = tokio::spawn(async move {
        while let Some(Ok(_msg)) = receiver.next().await {}
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    state.live.detach(user_id);
    info!(%user_id, "live channel detached");
}
