//! Client registry — live connections and their outbound queues.
//!
//! DESIGN
//! ======
//! Each WebSocket connection owns an `mpsc` receiver; the registry keeps the
//! sending half next to the connection's [`ClientInfo`]. Sends are
//! `try_send`: a connection whose queue is full misses that message rather
//! than stalling every other client.
//!
//! Ids are assigned from a counter starting at 1 and never reused, so the
//! `BTreeMap` key order is also connection order.

use std::collections::BTreeMap;

use frames::{ClientInfo, ServerMessage};
use tokio::sync::mpsc;
use tracing::debug;

pub type ClientId = u64;

struct ConnectedClient {
    info: ClientInfo,
    tx: mpsc::Sender<ServerMessage>,
}

#[derive(Default)]
pub struct ClientRegistry {
    next_id: ClientId,
    clients: BTreeMap<ClientId, ConnectedClient>,
}

impl ClientRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection and return its id.
    pub fn connect(&mut self, tx: mpsc::Sender<ServerMessage>, connected_at: String) -> ClientId {
        self.next_id += 1;
        let id = self.next_id;
        let info = ClientInfo { id, connected_at, is_commander: false };
        self.clients.insert(id, ConnectedClient { info, tx });
        id
    }

    /// Returns `false` when `id` was not registered.
    pub fn disconnect(&mut self, id: ClientId) -> bool {
        self.clients.remove(&id).is_some()
    }

    /// Mark `id` as a commander. Returns `true` only on the transition.
    pub fn mark_commander(&mut self, id: ClientId) -> bool {
        match self.clients.get_mut(&id) {
            Some(client) if !client.info.is_commander => {
                client.info.is_commander = true;
                true
            }
            _ => false,
        }
    }

    #[must_use]
    pub fn is_commander(&self, id: ClientId) -> bool {
        self.clients.get(&id).is_some_and(|c| c.info.is_commander)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Snapshot of every connection, in connection order.
    #[must_use]
    pub fn list(&self) -> Vec<ClientInfo> {
        self.clients.values().map(|c| c.info.clone()).collect()
    }

    /// Queue `msg` for one connection.
    pub fn send_to(&self, id: ClientId, msg: ServerMessage) -> bool {
        self.clients.get(&id).is_some_and(|c| deliver(id, &c.tx, msg))
    }

    /// Queue `msg` for every playback (non-commander) client. Returns how
    /// many queues accepted it.
    pub fn broadcast_players(&self, msg: &ServerMessage) -> usize {
        self.clients
            .iter()
            .filter(|(_, c)| !c.info.is_commander)
            .filter(|(id, c)| deliver(**id, &c.tx, msg.clone()))
            .count()
    }

    /// Push the full client list to every commander.
    pub fn notify_commanders(&self) -> usize {
        let update = ServerMessage::clients_update(self.list());
        self.clients
            .iter()
            .filter(|(_, c)| c.info.is_commander)
            .filter(|(id, c)| deliver(**id, &c.tx, update.clone()))
            .count()
    }
}

fn deliver(id: ClientId, tx: &mpsc::Sender<ServerMessage>, msg: ServerMessage) -> bool {
    match tx.try_send(msg) {
        Ok(()) => true,
        Err(e) => {
            debug!(client_id = id, error = %e, "registry: dropped outbound message");
            false
        }
    }
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;
