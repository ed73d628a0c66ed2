//! Error types for the Telegram bot.

use thiserror::Error;

/// Errors that can occur in the Telegram bot.
#[derive(Debug, Error)]
pub enum TelegramError {
    /// Bot token not provided.
    #[error("Telegram bot token not set. Set TELEGRAM_BOT_TOKEN environment variable.")]
    NoToken,

    /// A configuration value is missing or invalid.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Store error.
    #[error("store error: {0}")]
    Store(#[from] gatewatch_store::StoreError),

    /// Pipeline error.
    #[error("pipeline error: {0}")]
    Runtime(#[from] gatewatch_runtime::RuntimeError),

    /// Event-source construction error.
    #[error("event source error: {0}")]
    Source(#[from] gatewatch_device::FetchError),
}

/// Result type for Telegram operations.
pub type Result<T> = std::result::Result<T, TelegramError>;
