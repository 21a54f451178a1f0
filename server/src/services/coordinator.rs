//! Session coordinator — the single writer of shared playback state.
//!
//! DESIGN
//! ======
//! The coordinator owns the [`ClientRegistry`], the current source and the
//! transport state. The WebSocket layer holds it behind one mutex, so each
//! command's mutation and the resulting broadcast happen under the same lock
//! and are never interleaved with another connection's command.
//!
//! Command handlers are pure business logic: they validate, mutate and
//! return an [`Outcome`]. [`Coordinator::apply`] turns the outcome into
//! queued messages. Nothing is acknowledged or retried; clients converge
//! through drift correction.
//!
//! LATE JOIN
//! =========
//! A connection that arrives while the transport is playing is sent the
//! active `play` right after `welcome` and `source`, so a reconnecting device
//! rejoins the shared timeline instead of idling until the next command.

use frames::{ClientMessage, Role, ServerMessage};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::services::registry::{ClientId, ClientRegistry};

const WELCOME_MESSAGE: &str = "Connected to server";

// =============================================================================
// OUTCOME
// =============================================================================

/// Result of one command. The caller applies it; handlers never send.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Queue for every playback client. Commanders are skipped.
    Broadcast(ServerMessage),
    /// Queue for the issuing connection only.
    Reply(ServerMessage),
    /// The client list changed; push it to every commander.
    RosterChanged,
    /// Nothing to send.
    Done,
}

// =============================================================================
// TRANSPORT STATE
// =============================================================================

/// Last transport command seen by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TransportState {
    #[default]
    Idle,
    Playing {
        video: String,
        target_time: i64,
        delay: i64,
    },
    Paused,
    Stopped,
}

impl TransportState {
    /// The `play` a late joiner should receive, if any.
    #[must_use]
    pub fn active_play(&self) -> Option<ServerMessage> {
        match self {
            Self::Playing { video, target_time, delay } => Some(ServerMessage::Play {
                video: video.clone(),
                target_time: *target_time,
                delay: *delay,
            }),
            _ => None,
        }
    }
}

// =============================================================================
// COORDINATOR
// =============================================================================

pub struct Coordinator {
    registry: ClientRegistry,
    current_source: String,
    transport: TransportState,
    play_lead_ms: i64,
    default_video: String,
}

impl Coordinator {
    #[must_use]
    pub fn new(initial_source: String, play_lead_ms: i64, default_video: String) -> Self {
        Self {
            registry: ClientRegistry::new(),
            current_source: initial_source,
            transport: TransportState::Idle,
            play_lead_ms,
            default_video,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &ClientRegistry {
        &self.registry
    }

    #[must_use]
    pub fn current_source(&self) -> &str {
        &self.current_source
    }

    #[must_use]
    pub fn transport(&self) -> &TransportState {
        &self.transport
    }

    /// Register a connection and queue its greeting.
    ///
    /// The greeting is `welcome`, then `source`, then the active `play` when
    /// the transport is playing. Commanders learn about the new connection.
    pub fn connect(&mut self, tx: mpsc::Sender<ServerMessage>, connected_at: String) -> ClientId {
        let id = self.registry.connect(tx, connected_at);
        info!(client_id = id, total = self.registry.len(), "coordinator: client connected");

        self.registry.send_to(
            id,
            ServerMessage::Welcome { message: WELCOME_MESSAGE.to_owned(), client_id: id },
        );
        self.registry
            .send_to(id, ServerMessage::Source { source: self.current_source.clone() });
        if let Some(play) = self.transport.active_play() {
            info!(client_id = id, "coordinator: relaying active play to late joiner");
            self.registry.send_to(id, play);
        }

        self.registry.notify_commanders();
        id
    }

    pub fn disconnect(&mut self, id: ClientId) {
        if self.registry.disconnect(id) {
            info!(client_id = id, total = self.registry.len(), "coordinator: client disconnected");
            self.registry.notify_commanders();
        }
    }

    /// Run one command from `from` and return what should be sent.
    pub fn handle(&mut self, from: ClientId, cmd: ClientMessage, now_ms: i64) -> Outcome {
        match cmd {
            ClientMessage::Identify { role } => self.identify(from, role),
            ClientMessage::GetClients => Outcome::Reply(ServerMessage::clients_update(self.registry.list())),
            ClientMessage::Play { video, target_time, delay } => self.play(video, target_time, delay, now_ms),
            ClientMessage::Pause => self.pause(),
            ClientMessage::Stop => self.stop(),
            ClientMessage::Reload => {
                info!("coordinator: broadcasting reload");
                Outcome::Broadcast(ServerMessage::Reload)
            }
            ClientMessage::SetSource { source } => self.set_source(source),
        }
    }

    /// Queue an outcome. Returns the reply meant for `from`, if any.
    pub fn apply(&self, from: ClientId, outcome: Outcome) -> Option<ServerMessage> {
        match outcome {
            Outcome::Broadcast(msg) => {
                let delivered = self.registry.broadcast_players(&msg);
                debug!(client_id = from, kind = msg.kind(), delivered, "coordinator: broadcast");
                None
            }
            Outcome::Reply(msg) => Some(msg),
            Outcome::RosterChanged => {
                self.registry.notify_commanders();
                None
            }
            Outcome::Done => None,
        }
    }

    // ===== COMMANDS =====

    fn identify(&mut self, from: ClientId, role: Role) -> Outcome {
        if role != Role::Commander {
            return Outcome::Done;
        }
        if self.registry.mark_commander(from) {
            info!(client_id = from, "coordinator: client identified as commander");
            Outcome::RosterChanged
        } else {
            Outcome::Reply(ServerMessage::clients_update(self.registry.list()))
        }
    }

    fn play(&mut self, video: Option<String>, target_time: Option<i64>, delay: Option<i64>, now_ms: i64) -> Outcome {
        let target_time = target_time.unwrap_or(now_ms + self.play_lead_ms);
        let video = video.unwrap_or_else(|| self.default_video.clone());
        let delay = delay.unwrap_or(self.play_lead_ms);

        info!(target_time, lead_ms = target_time - now_ms, %video, "coordinator: broadcasting play");
        self.transport = TransportState::Playing { video: video.clone(), target_time, delay };
        Outcome::Broadcast(ServerMessage::Play { video, target_time, delay })
    }

    fn pause(&mut self) -> Outcome {
        if matches!(self.transport, TransportState::Playing { .. }) {
            self.transport = TransportState::Paused;
        }
        info!("coordinator: broadcasting pause");
        Outcome::Broadcast(ServerMessage::Pause)
    }

    fn stop(&mut self) -> Outcome {
        self.transport = TransportState::Stopped;
        info!("coordinator: broadcasting stop");
        Outcome::Broadcast(ServerMessage::Stop)
    }

    fn set_source(&mut self, source: String) -> Outcome {
        info!(from = %self.current_source, to = %source, "coordinator: source changed");
        self.current_source.clone_from(&source);
        Outcome::Broadcast(ServerMessage::Source { source })
    }
}

#[cfg(test)]
#[path = "coordinator_test.rs"]
mod tests;
