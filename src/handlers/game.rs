//! Game flow handlers: start, answers, results, continue

use crate::engine::{Command, Phase};
use crate::handlers::{apply, send_error};
use crate::protocol::AnswerSubmission;
use crate::state::AppState;

pub fn handle_start_game(state: &AppState, peer_id: &str, pin: &str) {
    host_transition(state, peer_id, pin, Command::Start);
}

pub fn handle_submit_answer(state: &AppState, peer_id: &str, submission: AnswerSubmission) {
    let pin = submission.pin.trim();
    let command = Command::SubmitAnswer {
        answer_index: submission.answer_index,
    };

    match apply(state, peer_id, pin, command) {
        Ok(_) => tracing::debug!(
            peer_id = %peer_id,
            pin = %pin,
            answer_index = submission.answer_index,
            "Answer received"
        ),
        Err(e) => send_error(state, peer_id, &e),
    }
}

/// Close the live question and show the leaderboard
pub fn handle_next_state(state: &AppState, peer_id: &str, pin: &str) {
    host_transition(state, peer_id, pin, Command::Advance);
}

/// Move from results to the next question, or end the game
pub fn handle_continue_game(state: &AppState, peer_id: &str, pin: &str) {
    host_transition(state, peer_id, pin, Command::Continue);
}

fn host_transition(state: &AppState, peer_id: &str, pin: &str, command: Command) {
    let pin = pin.trim();
    match apply(state, peer_id, pin, command) {
        Ok(Phase::Ended) => tracing::info!(pin = %pin, "Game over"),
        Ok(phase) => tracing::info!(pin = %pin, phase = ?phase, "Room advanced"),
        Err(e) => send_error(state, peer_id, &e),
    }
}
