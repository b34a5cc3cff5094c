//! Ticket-pool error types.

use thiserror::Error;

/// Errors that can occur during ticket pool operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TicketError {
    /// Database error from `SQLite`.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Fewer free tickets were available than the claim requested.
    #[error(
        "insufficient capacity in raffle {raffle_id}: requested {requested}, only {available} free"
    )]
    InsufficientCapacity {
        /// The raffle whose pool was short.
        raffle_id: i64,
        /// How many tickets the claim asked for.
        requested: u32,
        /// How many free tickets were available at lock time.
        available: u32,
    },

    /// The linked-ticket count did not match the order's recorded quantity.
    ///
    /// This is an invariant violation, not a user error: it indicates a
    /// lost or duplicated claim. The surrounding transaction is rolled
    /// back and the order must be halted for operator attention.
    #[error(
        "ticket count mismatch for order {order_id}: expected {expected} linked tickets, found {actual}"
    )]
    TicketCountMismatch {
        /// The order being issued.
        order_id: i64,
        /// The order's recorded quantity.
        expected: u32,
        /// The number of tickets actually linked.
        actual: u32,
    },

    /// Capacity value is not usable.
    #[error("invalid capacity {value}: must be at least 1")]
    InvalidCapacity {
        /// The rejected capacity value.
        value: u32,
    },

    /// The allocation mode string is not recognized.
    #[error("invalid allocation mode: {value}")]
    InvalidMode {
        /// The invalid value provided.
        value: String,
    },
}
