use thiserror::Error;

use crate::txn::{Key, Timestamp};

/// User-visible failures of the engine.
///
/// Commit conflicts and speculative-commit aborts are deliberately absent:
/// they are absorbed by the scheduler's retry loop and only show up in the
/// engine stats.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StmError {
    #[error("key {0} has never been created")]
    MissingKey(Key),

    #[error("no version of key {key} is visible at timestamp {start_ts}")]
    NoVisibleVersion { key: Key, start_ts: Timestamp },

    #[error("key {0} already exists")]
    KeyExists(Key),

    #[error("transaction rejected: {0}")]
    User(String),

    #[error("engine is shut down")]
    EngineShutdown,
}

impl StmError {
    /// Convenience constructor for domain errors raised inside transaction
    /// closures ("insufficient funds" and friends).
    pub fn user(message: impl Into<String>) -> Self {
        StmError::User(message.into())
    }
}
