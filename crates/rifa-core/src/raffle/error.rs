//! Raffle-specific error types.

use thiserror::Error;

use super::registry::RaffleStatus;
use crate::ticket::TicketError;

/// Errors that can occur during raffle operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RaffleError {
    /// Database error from `SQLite`.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Ticket pool error.
    #[error(transparent)]
    Ticket(#[from] TicketError),

    /// The raffle was not found.
    #[error("raffle not found: {raffle_id}")]
    NotFound {
        /// The raffle ID that was not found.
        raffle_id: i64,
    },

    /// Operation attempted from the wrong lifecycle state.
    #[error("cannot {attempted} raffle {raffle_id} in state {from}")]
    InvalidTransition {
        /// The raffle ID.
        raffle_id: i64,
        /// The raffle's current state.
        from: RaffleStatus,
        /// The attempted operation.
        attempted: &'static str,
    },

    /// The chosen winning ticket has no owner.
    #[error("winner ticket {number} of raffle {raffle_id} has not been issued")]
    WinnerNotIssued {
        /// The raffle ID.
        raffle_id: i64,
        /// The winning ticket number.
        number: u32,
    },

    /// The raffle status string is not recognized.
    #[error("invalid raffle status: {value}")]
    InvalidStatus {
        /// The invalid value provided.
        value: String,
    },
}
