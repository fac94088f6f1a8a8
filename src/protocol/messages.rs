//! Client ↔ relay message definitions
//!
//! Frames are JSON objects of the form `{"type": "<event>", "payload": ...}`.
//! Errors carry `{"code", "message"}` rather than a bare string; `message`
//! is the human-readable text, `code` a stable machine tag.

use crate::error::RelayError;
use crate::quiz::QuizRequest;
use serde::{Deserialize, Serialize};

/// Client → relay
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ClientMessage {
    // Connection
    Heartbeat,

    // Room Management
    CreateRoom(QuizRequest),
    JoinRoom(JoinRequest),

    // Game Flow (payload is the room PIN unless noted)
    StartGame(String),
    SubmitAnswer(AnswerSubmission),
    NextState(String),
    ContinueGame(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinRequest {
    pub pin: String,
    pub username: String,
    /// Opaque avatar description, relayed untouched
    #[serde(default)]
    pub avatar: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerSubmission {
    pub pin: String,
    pub answer_index: usize,
}

/// Relay → client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ServerMessage {
    // Connection
    Connected { socket_id: String },
    HeartbeatAck,
    /// `message` is what a client shows; `code` is for branching on
    Error { code: String, message: String },

    // Room Events
    RoomCreated { pin: String },
    JoinedSuccess { pin: String },
    PlayerJoined(PlayerDescriptor),
    PlayerLeft { id: String, username: String },

    // Rounds
    NewQuestionHost(HostQuestion),
    NewQuestionPlayer(PlayerQuestion),
    PlayerAnswered { count: usize },
    ShowResults { leaderboard: Vec<LeaderboardRow> },
    GameOver { leaderboard: Vec<LeaderboardRow> },
}

impl ServerMessage {
    pub fn error(err: &RelayError) -> Self {
        Self::Error {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

/// Player as announced to the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerDescriptor {
    pub id: String,
    pub username: String,
    pub avatar: serde_json::Value,
    pub score: u32,
}

/// Host view of a live question, including the answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reward: Option<u32>,
    pub question_number: usize,
    pub total_questions: usize,
}

/// Player view of a live question: answer buttons only, no option text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerQuestion {
    pub question: String,
    pub options_count: usize,
    pub question_number: usize,
    pub total_questions: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardRow {
    pub username: String,
    pub avatar: serde_json::Value,
    pub score: u32,
}
