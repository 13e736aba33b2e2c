//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::{stream::SplitSink, SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::room::{RoomCommand, OUTBOUND_BUFFER};
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// Query parameters for WebSocket connection
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Stable player id; supplying a previous id reattaches to its room
    pub player_id: Option<Uuid>,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    let player_id = query.player_id.unwrap_or_else(Uuid::new_v4);
    info!(player_id = %player_id, "WebSocket upgrade");
    ws.on_upgrade(move |socket| handle_socket(socket, player_id, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, player_id: Uuid, state: AppState) {
    info!(player_id = %player_id, "New WebSocket connection");

    let (mut ws_sink, mut ws_stream) = socket.split();

    // Send welcome message
    let welcome = ServerMsg::Welcome {
        player_id,
        server_time: unix_millis(),
    };
    if let Err(e) = send_msg(&mut ws_sink, &welcome).await {
        error!(player_id = %player_id, error = %e, "Failed to send welcome");
        return;
    }

    let (outbound_tx, mut outbound_rx) = mpsc::channel::<ServerMsg>(OUTBOUND_BUFFER);

    // Writer task: outbound queue -> WebSocket
    let writer_handle = tokio::spawn(async move {
        while let Some(msg) = outbound_rx.recv().await {
            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(player_id = %player_id, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    let token = state
        .matchmaking
        .register_player(player_id, outbound_tx.clone())
        .await;

    let rate_limiter = ConnectionRateLimiter::new();

    // Reader loop: WebSocket -> matchmaking or room
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_message() {
                    warn!(player_id = %player_id, "Rate limited message");
                    continue;
                }

                match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(client_msg) => {
                        route_message(&state, player_id, client_msg, &outbound_tx, &rate_limiter)
                            .await;
                    }
                    Err(e) => {
                        warn!(player_id = %player_id, error = %e, "Failed to parse client message");
                        reply(&outbound_tx, ServerMsg::error("bad_message", e.to_string()));
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(player_id = %player_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(player_id = %player_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(player_id = %player_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    // Cleanup on disconnect
    state.matchmaking.unregister_player(player_id, token).await;
    writer_handle.abort();

    info!(player_id = %player_id, "WebSocket connection closed");
}

async fn route_message(
    state: &AppState,
    player_id: Uuid,
    msg: ClientMsg,
    outbound: &mpsc::Sender<ServerMsg>,
    rate_limiter: &ConnectionRateLimiter,
) {
    let room = state.room_registry.room_of(&player_id);

    match (msg, room) {
        (ClientMsg::Ping { t }, None) => reply(outbound, ServerMsg::Pong { t }),
        (ClientMsg::FindMatch, None) => {
            if !rate_limiter.check_matchmaking() {
                return;
            }
            match state.matchmaking.join_queue(player_id).await {
                Ok(position) => reply(outbound, ServerMsg::Queued { position }),
                Err(e) => reply(outbound, ServerMsg::error("matchmaking", e.to_string())),
            }
        }
        (ClientMsg::Leave, None) => {
            state.matchmaking.leave_queue(player_id).await;
        }
        (_, None) => reply(outbound, ServerMsg::error("not_in_match", "Not in a match")),
        (msg, Some((room, player))) => {
            if room.tx.send(RoomCommand::Client { player, msg }).await.is_err() {
                debug!(player_id = %player_id, "Room channel closed");
            }
        }
    }
}

fn reply(outbound: &mpsc::Sender<ServerMsg>, msg: ServerMsg) {
    if outbound.try_send(msg).is_err() {
        warn!("Outbound queue full, dropping reply");
    }
}

/// Send a message over WebSocket
async fn send_msg(sink: &mut SplitSink<WebSocket, Message>, msg: &ServerMsg) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json)).await.map_err(|e| e.to_string())
}
