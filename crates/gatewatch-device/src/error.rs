//! Error types for event sources.

use thiserror::Error;

/// Errors that can occur while fetching events.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Failed to build the HTTP client.
    #[error("http client build failed: {0}")]
    ClientBuild(String),

    /// Request-level failure: timeout, connection refused, TLS.
    #[error("transport error: {0}")]
    Transport(String),

    /// The endpoint answered with a non-success status.
    #[error("unexpected status: {0}")]
    Status(reqwest::StatusCode),

    /// The response body could not be decoded.
    #[error("malformed response body: {0}")]
    Body(String),

    /// Both the primary and the fallback device transports failed.
    /// Distinct from an empty `Ok` batch, which means "no new events".
    #[error("device unreachable (http: {primary}; https: {fallback})")]
    Unavailable { primary: String, fallback: String },
}

/// Result type for fetch operations.
pub type Result<T> = std::result::Result<T, FetchError>;
