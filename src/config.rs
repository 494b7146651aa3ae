use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::quiz::{BookError, QuizBook};

pub const ADVANCE_DELAY_VAR: &str = "QUIZ_ADVANCE_DELAY_MS";
pub const BOOK_PATH_VAR: &str = "QUIZ_BOOK_PATH";
const DEFAULT_ADVANCE_DELAY: Duration = Duration::from_millis(2000);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("QUIZ_ADVANCE_DELAY_MS must be a whole number of milliseconds, got {0:?}")]
    InvalidDelay(String),
    #[error("could not load quiz book from {path:?}: {source}")]
    Book {
        path: PathBuf,
        #[source]
        source: BookError,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Pause between a correct submission and the move to the next stage.
    pub advance_delay: Duration,
    pub book_path: Option<PathBuf>,
}

impl Config {
    /// Reads settings from the process environment. `.env` is expected to
    /// be loaded already.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let advance_delay = match lookup(ADVANCE_DELAY_VAR) {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| ConfigError::InvalidDelay(raw))?,
            None => DEFAULT_ADVANCE_DELAY,
        };

        let book_path = lookup(BOOK_PATH_VAR)
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            advance_delay,
            book_path,
        })
    }

    pub fn load_book(&self) -> Result<QuizBook, ConfigError> {
        match &self.book_path {
            Some(path) => QuizBook::from_json_file(path).map_err(|source| ConfigError::Book {
                path: path.clone(),
                source,
            }),
            None => Ok(QuizBook::builtin()),
        }
    }
}
