//! WebSocket handler — control channel relay.
//!
//! DESIGN
//! ======
//! On upgrade, registers the connection with the coordinator and enters a
//! `select!` loop:
//! - Incoming client text → decode + dispatch to the coordinator
//! - Queued messages for this connection → forward to the socket
//!
//! The coordinator's handlers return an `Outcome`; this layer applies it
//! under the same lock and writes the sender's reply, if any.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → coordinator queues `welcome`, `source` (and the active `play`)
//! 2. Client sends commands → dispatch → reply to sender / broadcast
//! 3. Close → unregister → commanders receive the new client list
//!
//! Text that is not JSON gets `error{"Invalid JSON"}`; a known `type` with
//! bad fields gets `error`; an unknown `type` is echoed back. None of these
//! reach other clients.

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use frames::{DecodeError, Inbound, ServerMessage};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::services::registry::ClientId;
use crate::state::AppState;

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run_ws(socket, state))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState) {
    // Per-connection queue for the greeting and broadcasts.
    let (client_tx, mut client_rx) = mpsc::channel::<ServerMessage>(state.config.client_channel_capacity);

    let client_id = state.coordinator.lock().await.connect(client_tx, connected_at());

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(msg) = msg else { break };
                let Ok(msg) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        let reply = process_inbound_text(&state, client_id, text.as_str(), frames::now_ms()).await;
                        if let Some(reply) = reply {
                            if send_message(&mut socket, &reply).await.is_err() {
                                break;
                            }
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(msg) = client_rx.recv() => {
                if send_message(&mut socket, &msg).await.is_err() {
                    break;
                }
            }
        }
    }

    state.coordinator.lock().await.disconnect(client_id);
}

// =============================================================================
// DISPATCH
// =============================================================================

/// Decode and run one inbound text frame. Returns the message for the
/// sender, if any; broadcasts are queued before this returns.
pub(crate) async fn process_inbound_text(
    state: &AppState,
    client_id: ClientId,
    text: &str,
    now_ms: i64,
) -> Option<ServerMessage> {
    let cmd = match frames::decode_client_message(text) {
        Ok(Inbound::Command(cmd)) => cmd,
        Ok(Inbound::Unknown(data)) => {
            info!(client_id, "ws: echoing unrecognised message");
            return Some(ServerMessage::Echo { data });
        }
        Err(e @ DecodeError::InvalidJson(_)) => {
            warn!(client_id, error = %e, "ws: invalid inbound frame");
            return Some(ServerMessage::error(e.to_string()));
        }
        Err(e) => {
            warn!(client_id, error = %e, "ws: malformed command");
            return Some(ServerMessage::error(e.to_string()));
        }
    };

    info!(client_id, kind = cmd.kind(), "ws: recv command");
    let mut coordinator = state.coordinator.lock().await;
    let outcome = coordinator.handle(client_id, cmd, now_ms);
    coordinator.apply(client_id, outcome)
}

// =============================================================================
// HELPERS
// =============================================================================

async fn send_message(socket: &mut WebSocket, msg: &ServerMessage) -> Result<(), axum::Error> {
    let text = match serde_json::to_string(msg) {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, kind = msg.kind(), "ws: failed to encode outbound message");
            return Ok(());
        }
    };
    socket.send(Message::Text(text.into())).await
}

fn connected_at() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| OffsetDateTime::now_utc().unix_timestamp().to_string())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
