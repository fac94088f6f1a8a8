//! Quiz documents and the static catalog they are resolved from

use crate::error::RelayError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Quiz identifier; clients send either a number or a string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QuizId {
    Number(u64),
    Text(String),
}

impl QuizId {
    /// Ids compare by their textual form, so `1` and `"1"` name the same quiz
    pub fn matches(&self, other: &QuizId) -> bool {
        self.to_string() == other.to_string()
    }
}

impl fmt::Display for QuizId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub text: String,
    pub options: Vec<String>,
    pub correct_answer: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reward: Option<u32>,
}

/// A resolved, validated quiz
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quiz {
    pub id: QuizId,
    pub questions: Vec<Question>,
}

/// Inline quiz supplied by the room creator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizDocument {
    #[serde(default)]
    pub id: Option<QuizId>,
    pub questions: Vec<Question>,
}

/// Payload of `create_room`: a catalog id or a full inline document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QuizRequest {
    Inline(QuizDocument),
    Id(QuizId),
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read quiz catalog: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse quiz catalog: {0}")]
    Parse(#[from] serde_json::Error),
}

impl Quiz {
    pub fn validate(&self) -> Result<(), RelayError> {
        if self.questions.is_empty() {
            return Err(RelayError::InvalidQuiz("quiz has no questions".to_string()));
        }
        for (i, question) in self.questions.iter().enumerate() {
            if question.options.len() < 2 {
                return Err(RelayError::InvalidQuiz(format!(
                    "question {} needs at least two options",
                    i + 1
                )));
            }
            if question.correct_answer >= question.options.len() {
                return Err(RelayError::InvalidQuiz(format!(
                    "question {} has no option at index {}",
                    i + 1,
                    question.correct_answer
                )));
            }
        }
        Ok(())
    }
}

/// Static question bank keyed by quiz id
#[derive(Debug, Clone, Default)]
pub struct QuizCatalog {
    quizzes: Vec<Quiz>,
}

impl QuizCatalog {
    /// Build a catalog, dropping entries that fail validation
    pub fn new(quizzes: Vec<Quiz>) -> Self {
        let quizzes = quizzes
            .into_iter()
            .filter(|quiz| match quiz.validate() {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(quiz_id = %quiz.id, error = %e, "Skipping invalid catalog quiz");
                    false
                }
            })
            .collect();
        Self { quizzes }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let data = std::fs::read_to_string(path)?;
        let entries: Vec<serde_json::Value> = serde_json::from_str(&data)?;
        let quizzes = entries
            .into_iter()
            .enumerate()
            .filter_map(|(i, entry)| match serde_json::from_value::<Quiz>(entry) {
                Ok(quiz) => Some(quiz),
                Err(e) => {
                    tracing::warn!(entry = i, error = %e, "Skipping malformed catalog quiz");
                    None
                }
            })
            .collect();
        Ok(Self::new(quizzes))
    }

    pub fn len(&self) -> usize {
        self.quizzes.len()
    }

    pub fn get(&self, id: &QuizId) -> Option<&Quiz> {
        self.quizzes.iter().find(|q| q.id.matches(id))
    }

    /// Turn a `create_room` payload into a playable quiz
    pub fn resolve(&self, request: QuizRequest) -> Result<Quiz, RelayError> {
        let quiz = match request {
            QuizRequest::Inline(doc) => Quiz {
                id: doc.id.unwrap_or_else(custom_quiz_id),
                questions: doc.questions,
            },
            QuizRequest::Id(id) => self.get(&id).cloned().ok_or(RelayError::QuizNotFound)?,
        };
        quiz.validate()?;
        Ok(quiz)
    }
}

fn custom_quiz_id() -> QuizId {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    QuizId::Text(format!("custom_{millis}"))
}
