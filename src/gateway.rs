//! Session event fan-out

use crate::engine::Session;
use crate::protocol::ServerMessage;
use crate::state::{ConnectionId, ConnectionRegistry};

/// Who in a session receives an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    Host,
    Player(ConnectionId),
    /// Host and every player
    Room,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub audience: Audience,
    pub message: ServerMessage,
}

impl Outbound {
    pub fn new(audience: Audience, message: ServerMessage) -> Self {
        Self { audience, message }
    }
}

pub struct Gateway<'a> {
    connections: &'a ConnectionRegistry,
}

impl<'a> Gateway<'a> {
    pub fn new(connections: &'a ConnectionRegistry) -> Self {
        Self { connections }
    }

    /// Deliver events in order; gone connections are skipped
    pub fn deliver(&self, session: &Session, outbound: Vec<Outbound>) {
        for Outbound { audience, message } in outbound {
            match audience {
                Audience::Host => self.send(session.host(), message),
                Audience::Player(id) => self.send(&id, message),
                Audience::Room => {
                    for player in session.players() {
                        self.send(&player.id, message.clone());
                    }
                    self.send(session.host(), message);
                }
            }
        }
    }

    fn send(&self, peer_id: &str, message: ServerMessage) {
        if !self.connections.send(peer_id, message) {
            tracing::debug!(peer_id = %peer_id, "Dropped message for closed connection");
        }
    }
}
