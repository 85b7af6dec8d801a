//! # Error Types
//!
//! Custom error types for RadScope using `thiserror`.
//!
//! Decode failures are intentionally absent from this taxonomy: message
//! decoding is total and substitutes a sentinel empty reading instead of
//! erroring (see [`crate::telemetry::decoder`]).

use thiserror::Error;

/// Main error type for the RadScope core
#[derive(Debug, Error)]
pub enum RadScopeError {
    /// Transport (MQTT) errors
    #[error("transport error: {0}")]
    Transport(String),

    /// Session precondition violations (empty name, interval < 1, session
    /// already armed)
    #[error("invalid session: {0}")]
    InvalidSession(String),

    /// Range-query input errors (unparsable date or time strings)
    #[error("query error: {0}")]
    Query(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for the RadScope core
pub type Result<T> = std::result::Result<T, RadScopeError>;
