//! Live sockets and their session memberships

use crate::protocol::ServerMessage;
use dashmap::DashMap;
use std::collections::HashMap;
use std::time::Instant;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

/// Opaque per-connection identifier
pub type ConnectionId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Host,
    Player,
}

/// Cleanup owed to a session when a connection goes away
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectAction {
    TeardownSession(String),
    LeaveSession(String),
}

pub struct Connection {
    pub sender: UnboundedSender<ServerMessage>,
    /// pin -> role held in that session
    pub memberships: HashMap<String, Role>,
    pub connected_at: Instant,
}

#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, Connection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, sender: UnboundedSender<ServerMessage>) -> ConnectionId {
        let id = Uuid::new_v4().to_string();
        self.connections.insert(
            id.clone(),
            Connection {
                sender,
                memberships: HashMap::new(),
                connected_at: Instant::now(),
            },
        );
        id
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    #[cfg(test)]
    pub fn contains(&self, id: &str) -> bool {
        self.connections.contains_key(id)
    }

    /// Queue a message for one connection; false if it is gone or closed
    pub fn send(&self, id: &str, message: ServerMessage) -> bool {
        match self.connections.get(id) {
            Some(conn) => conn.sender.send(message).is_ok(),
            None => false,
        }
    }

    pub fn attach(&self, id: &str, pin: &str, role: Role) {
        if let Some(mut conn) = self.connections.get_mut(id) {
            conn.memberships.insert(pin.to_string(), role);
        }
    }

    pub fn detach(&self, id: &str, pin: &str) {
        if let Some(mut conn) = self.connections.get_mut(id) {
            conn.memberships.remove(pin);
        }
    }

    #[cfg(test)]
    pub fn role_in(&self, id: &str, pin: &str) -> Option<Role> {
        self.connections
            .get(id)
            .and_then(|conn| conn.memberships.get(pin).copied())
    }

    /// Forget a connection and report what its sessions need to do about it
    pub fn on_disconnect(&self, id: &str) -> Vec<DisconnectAction> {
        let Some((_, conn)) = self.connections.remove(id) else {
            return Vec::new();
        };
        tracing::info!(
            peer_id = %id,
            sessions = conn.memberships.len(),
            connected_secs = conn.connected_at.elapsed().as_secs(),
            "Connection closed"
        );
        let mut actions: Vec<DisconnectAction> = conn
            .memberships
            .into_iter()
            .map(|(pin, role)| match role {
                Role::Host => DisconnectAction::TeardownSession(pin),
                Role::Player => DisconnectAction::LeaveSession(pin),
            })
            .collect();
        actions.sort_by_key(|a| matches!(a, DisconnectAction::LeaveSession(_)));
        actions
    }
}
