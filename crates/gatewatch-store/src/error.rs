//! Error types for the store crate.

use thiserror::Error;

/// Errors that can occur in the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying SQLite error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection-task error from the async wrapper.
    #[error("sqlite connection error: {0}")]
    Connection(#[from] tokio_rusqlite::Error),

    /// A stored timestamp failed to parse.
    #[error("invalid stored timestamp: {0}")]
    InvalidTimestamp(String),

    /// A stored direction label failed to parse.
    #[error("invalid stored direction: {0}")]
    InvalidDirection(String),

    /// No subscriber row for the given chat.
    #[error("subscriber not found: chat {0}")]
    SubscriberNotFound(i64),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
