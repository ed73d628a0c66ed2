//! Error types for the runtime crate.

use thiserror::Error;

/// Errors that can occur in the pipeline runtime.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Store error.
    #[error("store error: {0}")]
    Store(#[from] gatewatch_store::StoreError),

    /// Pipeline already started.
    #[error("pipeline already started")]
    AlreadyStarted,

    /// Shutdown error.
    #[error("shutdown error: {0}")]
    Shutdown(String),
}

/// Result type for runtime operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;
