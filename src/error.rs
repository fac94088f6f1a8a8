//! Relay errors

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    #[error("Quiz not found")]
    QuizNotFound,

    #[error("Invalid quiz: {0}")]
    InvalidQuiz(String),

    #[error("Room not found")]
    SessionNotFound,

    #[error("Not authorized")]
    NotAuthorized,

    #[error("Cannot {action} while {phase}")]
    InvalidPhase {
        action: &'static str,
        phase: &'static str,
    },

    #[error("Answers are not being accepted right now")]
    AnswerWindowClosed,

    #[error("Not a player in this room")]
    NotAPlayer,

    #[error("Answer index {index} is out of range")]
    InvalidAnswer { index: usize },

    #[error("Already in this room")]
    AlreadyJoined,

    #[error("Room is full")]
    SessionFull,

    #[error("Host disconnected")]
    HostDisconnected,

    #[error("Session expired")]
    SessionExpired,

    #[error("Malformed message")]
    BadRequest,
}

impl RelayError {
    /// Stable machine-readable identifier sent alongside the message
    pub fn code(&self) -> &'static str {
        match self {
            Self::QuizNotFound => "quiz_not_found",
            Self::InvalidQuiz(_) => "invalid_quiz",
            Self::SessionNotFound => "session_not_found",
            Self::NotAuthorized => "not_authorized",
            Self::InvalidPhase { .. } => "invalid_phase",
            Self::AnswerWindowClosed => "answer_window_closed",
            Self::NotAPlayer => "not_a_player",
            Self::InvalidAnswer { .. } => "invalid_answer",
            Self::AlreadyJoined => "already_joined",
            Self::SessionFull => "session_full",
            Self::HostDisconnected => "host_disconnected",
            Self::SessionExpired => "session_expired",
            Self::BadRequest => "bad_request",
        }
    }
}
