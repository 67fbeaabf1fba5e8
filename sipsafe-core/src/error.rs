//! Error types for sipsafe-core

use thiserror::Error;

/// Main error type for the sipsafe-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Backend/API error
    #[error("backend error: {0}")]
    Backend(String),

    /// A collaborator call did not finish in time
    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: &'static str, secs: u64 },

    /// Rejected input (unknown range, malformed amount, ...)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Drink not present in the active session
    #[error("drink not found: {0}")]
    DrinkNotFound(String),

    /// Both the remote aggregation and the local fallback failed
    #[error("analytics unavailable (remote: {remote}; local: {local})")]
    AnalyticsUnavailable { remote: String, local: String },

    /// No usable emergency contacts
    #[error("no usable emergency contacts")]
    NoContacts,
}

/// Result type alias for sipsafe-core
pub type Result<T> = std::result::Result<T, Error>;
