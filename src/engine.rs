//! Per-session quiz state machine

use crate::error::RelayError;
use crate::gateway::{Audience, Outbound};
use crate::protocol::{
    HostQuestion, LeaderboardRow, PlayerDescriptor, PlayerQuestion, ServerMessage,
};
use crate::quiz::{Question, Quiz};
use crate::state::ConnectionId;
use std::collections::HashMap;
use std::time::Instant;

/// Points awarded for each correct answer
pub const POINTS_PER_CORRECT: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Lobby,
    Question,
    Results,
    Ended,
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Self::Lobby => "lobby",
            Self::Question => "question",
            Self::Results => "results",
            Self::Ended => "ended",
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            Self::Lobby => "in the lobby",
            Self::Question => "a question is live",
            Self::Results => "showing results",
            Self::Ended => "the game is over",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub id: ConnectionId,
    pub username: String,
    pub avatar: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Answer {
    pub index: usize,
    pub submitted_at: Instant,
}

/// Requests a session can react to
#[derive(Debug, Clone)]
pub enum Command {
    Join(Player),
    Start,
    SubmitAnswer { answer_index: usize },
    Advance,
    Continue,
    Leave,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pin: String,
    host: ConnectionId,
    quiz: Quiz,
    players: Vec<Player>,
    current_question: usize,
    answers: HashMap<ConnectionId, Answer>,
    scores: HashMap<ConnectionId, u32>,
    phase: Phase,
    max_players: usize,
    created_at: Instant,
}

impl Session {
    pub fn new(pin: String, host: ConnectionId, quiz: Quiz, max_players: usize) -> Self {
        Self {
            pin,
            host,
            quiz,
            players: Vec::new(),
            current_question: 0,
            answers: HashMap::new(),
            scores: HashMap::new(),
            phase: Phase::Lobby,
            max_players,
            created_at: Instant::now(),
        }
    }

    pub fn pin(&self) -> &str {
        &self.pin
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn quiz(&self) -> &Quiz {
        &self.quiz
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn current_question_index(&self) -> usize {
        self.current_question
    }

    pub fn answer_count(&self) -> usize {
        self.answers.len()
    }

    /// Most recent submission for the live question
    pub fn last_answer_at(&self) -> Option<Instant> {
        self.answers.values().map(|a| a.submitted_at).max()
    }

    #[cfg(test)]
    pub fn answer_of(&self, id: &str) -> Option<&Answer> {
        self.answers.get(id)
    }

    #[cfg(test)]
    pub fn score_of(&self, id: &str) -> Option<u32> {
        self.scores.get(id).copied()
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn is_host(&self, id: &str) -> bool {
        self.host == id
    }

    pub fn is_player(&self, id: &str) -> bool {
        self.players.iter().any(|p| p.id == id)
    }

    /// On error nothing has been mutated
    pub fn handle(&mut self, from: &str, command: Command) -> Result<Vec<Outbound>, RelayError> {
        let mut out = Vec::new();
        match command {
            Command::Join(player) => self.admit(player, &mut out)?,
            Command::Start => {
                self.require_host(from)?;
                self.require_phase(Phase::Lobby, "start the game")?;
                self.dispatch_question(&mut out);
            }
            Command::SubmitAnswer { answer_index } => {
                self.record_answer(from, answer_index, &mut out)?
            }
            Command::Advance => {
                self.require_host(from)?;
                self.require_phase(Phase::Question, "show results")?;
                self.enter_results(&mut out);
            }
            Command::Continue => {
                self.require_host(from)?;
                self.require_phase(Phase::Results, "continue")?;
                self.dispatch_question(&mut out);
            }
            Command::Leave => self.remove_player(from, &mut out),
        }
        Ok(out)
    }

    /// Final notice for everyone in a session that is being torn down
    pub fn close(&self, reason: &RelayError) -> Vec<Outbound> {
        vec![Outbound::new(Audience::Room, ServerMessage::error(reason))]
    }

    /// Players ranked by cumulative score; equal scores keep join order
    pub fn leaderboard(&self) -> Vec<LeaderboardRow> {
        let mut rows: Vec<LeaderboardRow> = self
            .players
            .iter()
            .map(|p| LeaderboardRow {
                username: p.username.clone(),
                avatar: p.avatar.clone(),
                score: self.scores.get(&p.id).copied().unwrap_or(0),
            })
            .collect();
        rows.sort_by(|a, b| b.score.cmp(&a.score));
        rows
    }

    fn require_host(&self, from: &str) -> Result<(), RelayError> {
        if self.is_host(from) {
            Ok(())
        } else {
            Err(RelayError::NotAuthorized)
        }
    }

    fn require_phase(&self, expected: Phase, action: &'static str) -> Result<(), RelayError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(RelayError::InvalidPhase {
                action,
                phase: self.phase.describe(),
            })
        }
    }

    fn current(&self) -> Option<&Question> {
        self.quiz.questions.get(self.current_question)
    }

    fn admit(&mut self, player: Player, out: &mut Vec<Outbound>) -> Result<(), RelayError> {
        if self.phase == Phase::Ended {
            return Err(RelayError::InvalidPhase {
                action: "join",
                phase: self.phase.describe(),
            });
        }
        if self.is_host(&player.id) || self.is_player(&player.id) {
            return Err(RelayError::AlreadyJoined);
        }
        if self.players.len() >= self.max_players {
            return Err(RelayError::SessionFull);
        }

        self.scores.insert(player.id.clone(), 0);
        out.push(Outbound::new(
            Audience::Player(player.id.clone()),
            ServerMessage::JoinedSuccess {
                pin: self.pin.clone(),
            },
        ));
        out.push(Outbound::new(
            Audience::Host,
            ServerMessage::PlayerJoined(PlayerDescriptor {
                id: player.id.clone(),
                username: player.username.clone(),
                avatar: player.avatar.clone(),
                score: 0,
            }),
        ));
        self.players.push(player);
        Ok(())
    }

    fn record_answer(
        &mut self,
        from: &str,
        index: usize,
        out: &mut Vec<Outbound>,
    ) -> Result<(), RelayError> {
        if self.phase != Phase::Question {
            return Err(RelayError::AnswerWindowClosed);
        }
        if !self.is_player(from) {
            return Err(RelayError::NotAPlayer);
        }
        let options = self.current().map_or(0, |q| q.options.len());
        if index >= options {
            return Err(RelayError::InvalidAnswer { index });
        }

        // Last write wins: a changed answer replaces the earlier one.
        self.answers.insert(
            from.to_string(),
            Answer {
                index,
                submitted_at: Instant::now(),
            },
        );
        out.push(self.answer_count_update());
        Ok(())
    }

    fn remove_player(&mut self, id: &str, out: &mut Vec<Outbound>) {
        let Some(position) = self.players.iter().position(|p| p.id == id) else {
            return;
        };
        let player = self.players.remove(position);
        self.scores.remove(id);
        self.answers.remove(id);

        out.push(Outbound::new(
            Audience::Host,
            ServerMessage::PlayerLeft {
                id: player.id,
                username: player.username,
            },
        ));
        if self.phase == Phase::Question {
            out.push(self.answer_count_update());
        }
    }

    fn answer_count_update(&self) -> Outbound {
        Outbound::new(
            Audience::Host,
            ServerMessage::PlayerAnswered {
                count: self.answers.len(),
            },
        )
    }

    /// Entry action of `Question`; falls through to `Ended` past the last question
    fn dispatch_question(&mut self, out: &mut Vec<Outbound>) {
        let total = self.quiz.questions.len();
        if self.current_question >= total {
            self.enter_ended(out);
            return;
        }

        let question = &self.quiz.questions[self.current_question];
        let number = self.current_question + 1;
        let host_view = ServerMessage::NewQuestionHost(HostQuestion {
            question: question.text.clone(),
            options: question.options.clone(),
            correct_answer: question.correct_answer,
            explanation: question.explanation.clone(),
            reward: question.reward,
            question_number: number,
            total_questions: total,
        });
        let player_view = ServerMessage::NewQuestionPlayer(PlayerQuestion {
            question: question.text.clone(),
            options_count: question.options.len(),
            question_number: number,
            total_questions: total,
        });

        out.push(Outbound::new(Audience::Host, host_view));
        for player in &self.players {
            out.push(Outbound::new(
                Audience::Player(player.id.clone()),
                player_view.clone(),
            ));
        }
        self.phase = Phase::Question;
    }

    fn enter_results(&mut self, out: &mut Vec<Outbound>) {
        if let Some(correct) = self.current().map(|q| q.correct_answer) {
            for (id, answer) in &self.answers {
                if answer.index == correct {
                    if let Some(score) = self.scores.get_mut(id) {
                        *score += POINTS_PER_CORRECT;
                    }
                }
            }
        }

        out.push(Outbound::new(
            Audience::Room,
            ServerMessage::ShowResults {
                leaderboard: self.leaderboard(),
            },
        ));
        self.answers.clear();
        self.current_question += 1;
        self.phase = Phase::Results;
    }

    fn enter_ended(&mut self, out: &mut Vec<Outbound>) {
        self.answers.clear();
        self.phase = Phase::Ended;
        out.push(Outbound::new(
            Audience::Room,
            ServerMessage::GameOver {
                leaderboard: self.leaderboard(),
            },
        ));
    }
}
