//! Room management handlers

use crate::engine::{Command, Player, Session};
use crate::error::RelayError;
use crate::gateway::Gateway;
use crate::handlers::send_error;
use crate::protocol::{JoinRequest, ServerMessage};
use crate::quiz::QuizRequest;
use crate::state::{AppState, Role};

/// Open a new session with the sender as host
pub fn handle_create_room(state: &AppState, peer_id: &str, request: QuizRequest) {
    let created = state.sessions.create_session(
        &state.catalog,
        request,
        peer_id,
        state.config.session.max_players,
    );

    match created {
        Ok(pin) => {
            state.connections.attach(peer_id, &pin, Role::Host);
            state
                .connections
                .send(peer_id, ServerMessage::RoomCreated { pin: pin.clone() });
            tracing::info!(peer_id = %peer_id, pin = %pin, "Room created");
        }
        Err(e) => send_error(state, peer_id, &e),
    }
}

pub fn handle_join_room(state: &AppState, peer_id: &str, request: JoinRequest) {
    let pin = request.pin.trim().to_string();
    let player = Player {
        id: peer_id.to_string(),
        username: request.username,
        avatar: request.avatar,
    };

    let joined = state.sessions.with_session(&pin, |session| {
        let outbound = session.handle(peer_id, Command::Join(player))?;
        state.connections.attach(peer_id, &pin, Role::Player);
        Gateway::new(&state.connections).deliver(session, outbound);
        Ok(session.players().len())
    });

    match joined {
        Ok(player_count) => {
            tracing::info!(peer_id = %peer_id, pin = %pin, player_count, "Player joined room")
        }
        Err(e) => send_error(state, peer_id, &e),
    }
}

/// Remove a departed player from a session they had joined
pub fn leave_session(state: &AppState, peer_id: &str, pin: &str) {
    let left = state.sessions.with_session(pin, |session| {
        let outbound = session.handle(peer_id, Command::Leave)?;
        Gateway::new(&state.connections).deliver(session, outbound);
        Ok(session.players().len())
    });

    match left {
        Ok(remaining) => {
            tracing::info!(peer_id = %peer_id, pin = %pin, remaining, "Player left room")
        }
        Err(e) => {
            tracing::debug!(peer_id = %peer_id, pin = %pin, error = %e, "Leave for closed room")
        }
    }
}

/// Tear a session down and tell everyone still in it why
pub fn close_session(state: &AppState, pin: &str, reason: &RelayError) {
    if let Some(session) = state.sessions.remove(pin) {
        announce_closed(state, &session, reason);
    }
}

/// Expire sessions past the configured lifetime
pub fn cleanup_expired_sessions(state: &AppState) {
    let expired = state
        .sessions
        .sweep_expired(state.config.session.timeout());

    for session in &expired {
        announce_closed(state, session, &RelayError::SessionExpired);
    }

    if !expired.is_empty() {
        tracing::info!(deleted_sessions = expired.len(), "Cleanup completed");
    }
}

fn announce_closed(state: &AppState, session: &Session, reason: &RelayError) {
    Gateway::new(&state.connections).deliver(session, session.close(reason));

    state.connections.detach(session.host(), session.pin());
    for player in session.players() {
        state.connections.detach(&player.id, session.pin());
    }

    tracing::info!(
        pin = %session.pin(),
        reason = reason.code(),
        players = session.players().len(),
        "Room closed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::handlers::test_support::{connect, error_code, state, Client};
    use crate::handlers::{handle_disconnect, handle_submit_answer};
    use crate::protocol::AnswerSubmission;
    use crate::quiz::tests::two_question_quiz;
    use crate::quiz::{QuizCatalog, QuizId};
    use serde_json::json;

    fn create(state: &AppState, host: &mut Client) -> String {
        handle_create_room(state, &host.id, QuizRequest::Id(QuizId::Number(1)));
        match &host.drain()[..] {
            [ServerMessage::RoomCreated { pin }] => pin.clone(),
            other => panic!("unexpected {other:?}"),
        }
    }

    fn join(state: &AppState, player: &Client, pin: &str, name: &str) {
        handle_join_room(
            state,
            &player.id,
            JoinRequest {
                pin: pin.to_string(),
                username: name.to_string(),
                avatar: json!({ "sex": "female" }),
            },
        );
    }

    #[test]
    fn create_with_unknown_quiz_reports_error() {
        let state = state();
        let mut host = connect(&state);
        handle_create_room(&state, &host.id, QuizRequest::Id(QuizId::Number(404)));
        let messages = host.drain();
        assert_eq!(error_code(&messages), Some("quiz_not_found"));
        assert_eq!(state.sessions.len(), 0);
    }

    #[test]
    fn join_notifies_both_sides() {
        let state = state();
        let mut host = connect(&state);
        let mut player = connect(&state);
        let pin = create(&state, &mut host);

        join(&state, &player, &format!(" {pin} "), "ana");

        assert_eq!(
            player.drain(),
            vec![ServerMessage::JoinedSuccess { pin: pin.clone() }]
        );
        match &host.drain()[..] {
            [ServerMessage::PlayerJoined(p)] => {
                assert_eq!(p.id, player.id);
                assert_eq!(p.username, "ana");
                assert_eq!(p.avatar, json!({ "sex": "female" }));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(
            state.connections.role_in(&player.id, &pin),
            Some(Role::Player)
        );
    }

    #[test]
    fn join_unknown_pin_is_session_not_found() {
        let state = state();
        let mut player = connect(&state);
        join(&state, &player, "000000", "ana");
        assert_eq!(error_code(&player.drain()), Some("session_not_found"));
    }

    #[test]
    fn join_full_room_is_rejected() {
        let config = Config {
            session: crate::config::SessionConfig {
                max_players: 1,
                ..Config::default().session
            },
            ..Config::default()
        };
        let state = AppState::new(config, QuizCatalog::new(vec![two_question_quiz()]));
        let mut host = connect(&state);
        let first = connect(&state);
        let mut second = connect(&state);
        let pin = create(&state, &mut host);

        join(&state, &first, &pin, "ana");
        join(&state, &second, &pin, "bo");
        assert_eq!(error_code(&second.drain()), Some("session_full"));
    }

    #[test]
    fn host_disconnect_closes_room_for_everyone() {
        let state = state();
        let mut host = connect(&state);
        let mut player = connect(&state);
        let pin = create(&state, &mut host);
        join(&state, &player, &pin, "ana");
        player.drain();

        handle_disconnect(&state, &host.id);

        assert_eq!(
            player.drain(),
            vec![ServerMessage::error(&RelayError::HostDisconnected)]
        );
        assert!(state.sessions.get(&pin).is_none());
        assert_eq!(state.connections.role_in(&player.id, &pin), None);

        handle_submit_answer(
            &state,
            &player.id,
            AnswerSubmission {
                pin: pin.clone(),
                answer_index: 0,
            },
        );
        assert_eq!(error_code(&player.drain()), Some("session_not_found"));

        let mut late = connect(&state);
        join(&state, &late, &pin, "late");
        assert_eq!(error_code(&late.drain()), Some("session_not_found"));
    }

    #[test]
    fn player_disconnect_tells_host() {
        let state = state();
        let mut host = connect(&state);
        let player = connect(&state);
        let pin = create(&state, &mut host);
        join(&state, &player, &pin, "ana");
        host.drain();

        handle_disconnect(&state, &player.id);

        assert_eq!(
            host.drain(),
            vec![ServerMessage::PlayerLeft {
                id: player.id.clone(),
                username: "ana".into()
            }]
        );
        assert!(state.sessions.get(&pin).unwrap().players().is_empty());
    }

    #[test]
    fn expired_sessions_are_swept_and_announced() {
        let config = Config {
            session: crate::config::SessionConfig {
                timeout_ms: 0,
                ..Config::default().session
            },
            ..Config::default()
        };
        let state = AppState::new(config, QuizCatalog::new(vec![two_question_quiz()]));
        let mut host = connect(&state);
        let mut player = connect(&state);
        let pin = create(&state, &mut host);
        join(&state, &player, &pin, "ana");
        host.drain();
        player.drain();

        std::thread::sleep(std::time::Duration::from_millis(5));
        cleanup_expired_sessions(&state);

        assert_eq!(state.sessions.len(), 0);
        assert_eq!(error_code(&host.drain()), Some("session_expired"));
        assert_eq!(error_code(&player.drain()), Some("session_expired"));
        assert_eq!(state.connections.role_in(&host.id, &pin), None);
    }
}
