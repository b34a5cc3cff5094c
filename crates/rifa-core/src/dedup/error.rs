//! Duplicate-detection error types.

use thiserror::Error;

/// Errors that can occur during fingerprint operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DedupError {
    /// Database error from `SQLite`.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The fingerprint record was not found.
    #[error("receipt fingerprint not found: {fingerprint_id}")]
    NotFound {
        /// The fingerprint ID that was not found.
        fingerprint_id: i64,
    },

    /// The fingerprint status string is not recognized.
    #[error("invalid fingerprint status: {value}")]
    InvalidStatus {
        /// The invalid value provided.
        value: String,
    },
}
