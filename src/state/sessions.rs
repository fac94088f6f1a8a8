//! Live sessions by PIN

use crate::engine::Session;
use crate::error::RelayError;
use crate::quiz::{QuizCatalog, QuizRequest};
use dashmap::mapref::entry::Entry;
use dashmap::mapref::one::Ref;
use dashmap::DashMap;
use rand::Rng;
use std::time::{Duration, Instant};

#[derive(Default)]
pub struct SessionStore {
    sessions: DashMap<String, Session>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the new session's PIN
    pub fn create_session(
        &self,
        catalog: &QuizCatalog,
        request: QuizRequest,
        host: &str,
        max_players: usize,
    ) -> Result<String, RelayError> {
        let quiz = catalog.resolve(request)?;
        loop {
            let pin = generate_pin();
            if let Entry::Vacant(slot) = self.sessions.entry(pin.clone()) {
                tracing::info!(pin = %pin, quiz_id = %quiz.id, questions = quiz.questions.len(), "Session created");
                slot.insert(Session::new(pin.clone(), host.to_string(), quiz, max_players));
                return Ok(pin);
            }
            tracing::debug!(pin = %pin, "PIN collision, regenerating");
        }
    }

    pub fn get(&self, pin: &str) -> Option<Ref<'_, String, Session>> {
        self.sessions.get(pin)
    }

    /// The entry stays locked for the whole closure, broadcasts included.
    pub fn with_session<R>(
        &self,
        pin: &str,
        f: impl FnOnce(&mut Session) -> Result<R, RelayError>,
    ) -> Result<R, RelayError> {
        let mut session = self
            .sessions
            .get_mut(pin)
            .ok_or(RelayError::SessionNotFound)?;
        f(&mut session)
    }

    /// Idempotent delete
    pub fn remove(&self, pin: &str) -> Option<Session> {
        self.sessions.remove(pin).map(|(_, session)| session)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Drop sessions older than `max_age` and hand them back for notification
    pub fn sweep_expired(&self, max_age: Duration) -> Vec<Session> {
        let now = Instant::now();
        let expired: Vec<String> = self
            .sessions
            .iter()
            .filter(|entry| now.duration_since(entry.created_at()) > max_age)
            .map(|entry| entry.key().clone())
            .collect();

        expired
            .into_iter()
            .filter_map(|pin| self.remove(&pin))
            .collect()
    }
}

fn generate_pin() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}
