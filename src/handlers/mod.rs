//! Inbound event handlers

pub mod connection;
pub mod game;
pub mod room;

pub use connection::*;
pub use game::*;
pub use room::*;

use crate::engine::{Command, Phase};
use crate::error::RelayError;
use crate::gateway::Gateway;
use crate::protocol::ServerMessage;
use crate::state::AppState;

/// Run one command against a session and fan out what it produced
fn apply(
    state: &AppState,
    peer_id: &str,
    pin: &str,
    command: Command,
) -> Result<Phase, RelayError> {
    state.sessions.with_session(pin, |session| {
        let outbound = session.handle(peer_id, command)?;
        Gateway::new(&state.connections).deliver(session, outbound);
        Ok(session.phase())
    })
}

/// Report a rejected request to its sender only
pub fn send_error(state: &AppState, peer_id: &str, err: &RelayError) {
    tracing::warn!(peer_id = %peer_id, code = err.code(), "Request rejected: {}", err);
    state.connections.send(peer_id, ServerMessage::error(err));
}
