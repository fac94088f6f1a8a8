//! Application state

pub mod connections;
pub mod sessions;

pub use connections::{ConnectionId, ConnectionRegistry, DisconnectAction, Role};
pub use sessions::SessionStore;

use crate::config::Config;
use crate::quiz::QuizCatalog;
use std::sync::Arc;

/// Shared relay state
pub struct AppState {
    /// Live sessions (pin -> Session)
    pub sessions: SessionStore,
    /// Live connections (peer_id -> Connection)
    pub connections: ConnectionRegistry,
    pub catalog: QuizCatalog,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config, catalog: QuizCatalog) -> Self {
        Self {
            sessions: SessionStore::new(),
            connections: ConnectionRegistry::new(),
            catalog,
            config: Arc::new(config),
        }
    }
}
