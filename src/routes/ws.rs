//! WebSocket handler: one connection, one participant, one room.
//!
//! DESIGN
//! ======
//! Admission happens before the upgrade: a request without a participant id
//! or name is refused with 400. On upgrade the connection joins its room and
//! enters a `select!` loop:
//! - Incoming text frames -> decode + hand to the relay
//! - Events queued by room peers -> forward to the socket
//!
//! The relay applies and fans out under the room lock and returns an
//! `Outcome`; this layer only owns the socket.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade -> join -> send `joined`, `users`, `elements`
//! 2. Client events -> relay -> peers' queues
//! 3. Socket closed, or queue dropped by the registry -> leave
//! 4. Leave -> remaining members receive `users`
//!
//! A second connection with the same participant id takes the registration
//! over; the first connection's queue is dropped and its leave is a no-op.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use frames::{ServerEvent, decode_client_event, encode_server_event};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::services::relay::{self, Admission, ConnectParams, ConnectionState, Membership, Outcome};
use crate::state::AppState;

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(
    State(state): State<AppState>,
    Query(params): Query<ConnectParams>,
    ws: WebSocketUpgrade,
) -> Response {
    let admission = match relay::admit(params) {
        Ok(admission) => admission,
        Err(e) => {
            warn!(error = %e, "ws: admission refused");
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    ws.on_upgrade(move |socket| run_ws(socket, state, admission))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState, admission: Admission) {
    let Admission { room_id, participant } = admission;
    let participant_id = participant.id.clone();
    let mut conn = ConnectionState::Connecting;

    // Per-connection queue for events from room peers.
    let (client_tx, mut client_rx) = mpsc::channel::<ServerEvent>(state.config.channel_capacity);

    let snapshot = state.registry.join(&room_id, participant, client_tx).await;
    conn.join(room_id.clone(), participant_id.clone(), snapshot.token);
    let peers = state.registry.broadcast_targets(&room_id, Some(&participant_id)).await.len();
    info!(%room_id, %participant_id, peers, "ws: participant connected");

    let greeting = [
        ServerEvent::Joined { room_id: room_id.clone(), participant_id: participant_id.clone() },
        ServerEvent::Users { users: snapshot.users },
        ServerEvent::Elements { elements: snapshot.elements },
    ];
    let mut greeted = true;
    for event in &greeting {
        if send_event(&mut socket, event).await.is_err() {
            greeted = false;
            break;
        }
    }

    while greeted {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        if let Some(reply) = process_inbound_text(&state, &conn, text.as_str()).await {
                            if send_event(&mut socket, &reply).await.is_err() {
                                break;
                            }
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            event = client_rx.recv() => {
                let Some(event) = event else {
                    // The registry dropped our queue: it overflowed, or the
                    // same participant id connected again.
                    warn!(%room_id, %participant_id, "ws: outbound queue dropped; closing");
                    break;
                };
                if send_event(&mut socket, &event).await.is_err() {
                    break;
                }
            }
        }
    }

    if let Some(membership) = conn.disconnect() {
        let Membership { room_id, participant_id, token } = membership;
        match state.registry.leave(&room_id, &participant_id, token).await {
            Some(remaining) => {
                let rooms = state.registry.room_count().await;
                info!(%room_id, %participant_id, remaining = remaining.len(), rooms, "ws: participant disconnected");
            }
            None => info!(%room_id, %participant_id, "ws: superseded connection closed"),
        }
    }
}

// =============================================================================
// INBOUND
// =============================================================================

/// Decode one inbound text frame and hand it to the relay. Returns the event
/// to send back to the sender, if any (only errors are ever replied).
async fn process_inbound_text(state: &AppState, conn: &ConnectionState, text: &str) -> Option<ServerEvent> {
    let (room_id, participant_id) = conn.membership()?;

    let event = match decode_client_event(text) {
        Ok(event) => event,
        Err(e) => {
            warn!(%room_id, %participant_id, error = %e, "ws: malformed event dropped");
            return Some(ServerEvent::error_from(&e));
        }
    };

    let name = event.name();
    let is_cursor = matches!(event, frames::ClientEvent::CursorMove { .. });
    match relay::handle_client_event(&state.registry, room_id, participant_id, event).await {
        Outcome::Broadcast { delivered, .. } => {
            if !is_cursor {
                info!(%room_id, %participant_id, event = name, delivered, "ws: event relayed");
            }
        }
        Outcome::Ignored => {
            if !is_cursor {
                info!(%room_id, %participant_id, event = name, "ws: no-op event ignored");
            }
        }
        Outcome::RoomGone => {
            warn!(%room_id, %participant_id, event = name, "ws: event for a room this connection left");
        }
    }
    None
}

// =============================================================================
// HELPERS
// =============================================================================

async fn send_event(socket: &mut WebSocket, event: &ServerEvent) -> Result<(), ()> {
    let json = match encode_server_event(event) {
        Ok(j) => j,
        Err(e) => {
            warn!(error = %e, event = event.name(), "ws: failed to encode event");
            return Err(());
        }
    };
    socket.send(Message::Text(json.into())).await.map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
