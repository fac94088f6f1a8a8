//! Environment-based configuration

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub host: String,
    pub cors_origins: Vec<String>,
    pub quiz_catalog_path: String,
    pub session: SessionConfig,
    pub log_level: String,
}

/// Session limits and housekeeping
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub max_players: usize,
    pub timeout_ms: u64,
    pub cleanup_interval_secs: u64,
}

impl SessionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs.max(1))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3001,
            host: "0.0.0.0".to_string(),
            cors_origins: vec!["*".to_string()],
            quiz_catalog_path: "data/quizzes.json".to_string(),
            session: SessionConfig {
                max_players: 100,
                timeout_ms: 14_400_000,
                cleanup_interval_secs: 300,
            },
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load settings from the environment (and `.env` if present)
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        Self {
            port: parse_var("PORT", defaults.port),
            host: env::var("HOST").unwrap_or(defaults.host),
            cors_origins: env::var("CORS_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or(defaults.cors_origins),
            quiz_catalog_path: env::var("QUIZ_CATALOG_PATH")
                .unwrap_or(defaults.quiz_catalog_path),
            session: SessionConfig {
                max_players: parse_var("MAX_PLAYERS", defaults.session.max_players),
                timeout_ms: parse_var("SESSION_TIMEOUT", defaults.session.timeout_ms),
                cleanup_interval_secs: parse_var(
                    "CLEANUP_INTERVAL_SECS",
                    defaults.session.cleanup_interval_secs,
                ),
            },
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
        }
    }

    pub fn allows_any_origin(&self) -> bool {
        self.cors_origins.is_empty() || self.cors_origins.iter().any(|o| o == "*")
    }
}

fn parse_var<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
