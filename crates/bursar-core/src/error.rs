//! Error types for Bursar

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Malformed or constraint-violating input. Always recoverable by the
    /// caller; `field` names the offending input field.
    #[error("Validation failed on '{field}': {message}")]
    Validation { field: &'static str, message: String },

    /// Obligation state machine violation (pay on paid, revoke on unpaid).
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// Attempt to delete an entity that is still referenced.
    #[error("Integrity violation: {0}")]
    Integrity(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Rejected obligation schedule parameters.
    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),
}

impl Error {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
