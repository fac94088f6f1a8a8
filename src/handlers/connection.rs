//! Connection lifecycle handlers

use crate::error::RelayError;
use crate::protocol::ServerMessage;
use crate::state::{AppState, DisconnectAction};
use tokio::sync::mpsc::UnboundedSender;

/// Register a new socket and greet it with its id
pub fn handle_connection(state: &AppState, sender: UnboundedSender<ServerMessage>) -> String {
    let peer_id = state.connections.register(sender.clone());

    let _ = sender.send(ServerMessage::Connected {
        socket_id: peer_id.clone(),
    });

    tracing::info!(peer_id = %peer_id, "New connection established");
    peer_id
}

/// Clean up after a closed socket: hosts take their sessions down, players leave
pub fn handle_disconnect(state: &AppState, peer_id: &str) {
    for action in state.connections.on_disconnect(peer_id) {
        match action {
            DisconnectAction::TeardownSession(pin) => {
                crate::handlers::room::close_session(state, &pin, &RelayError::HostDisconnected);
            }
            DisconnectAction::LeaveSession(pin) => {
                crate::handlers::room::leave_session(state, peer_id, &pin);
            }
        }
    }
}

pub fn handle_heartbeat(sender: &UnboundedSender<ServerMessage>) {
    let _ = sender.send(ServerMessage::HeartbeatAck);
}
