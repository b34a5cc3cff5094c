//! Order lifecycle error types.

use thiserror::Error;

use super::engine::OrderStatus;
use crate::raffle::RaffleStatus;
use crate::ticket::TicketError;

/// Errors that can occur during order lifecycle operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum OrderError {
    /// Database error from `SQLite`.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Ticket pool error.
    ///
    /// [`TicketError::TicketCountMismatch`] arriving through here is an
    /// invariant violation: surface it to operators and halt automated
    /// processing of the order.
    #[error(transparent)]
    Ticket(#[from] TicketError),

    /// The order was not found.
    #[error("order not found: {order_id}")]
    NotFound {
        /// The order ID that was not found.
        order_id: i64,
    },

    /// The referenced raffle was not found.
    #[error("raffle not found: {raffle_id}")]
    RaffleNotFound {
        /// The raffle ID that was not found.
        raffle_id: i64,
    },

    /// Reservations require an active raffle.
    #[error("raffle {raffle_id} is not active (status: {status})")]
    RaffleNotActive {
        /// The raffle ID.
        raffle_id: i64,
        /// The raffle's current status.
        status: RaffleStatus,
    },

    /// Not enough free tickets at reservation time.
    #[error(
        "capacity exceeded for raffle {raffle_id}: requested {requested}, only {available} slots left"
    )]
    CapacityExceeded {
        /// The raffle ID.
        raffle_id: i64,
        /// How many tickets were requested.
        requested: u32,
        /// How many slots remain free.
        available: u32,
    },

    /// Operation attempted from the wrong state.
    #[error("cannot {attempted} order {order_id} in state {from}")]
    InvalidTransition {
        /// The order ID.
        order_id: i64,
        /// The order's current state.
        from: OrderStatus,
        /// The attempted operation.
        attempted: &'static str,
    },

    /// Quantity must be at least 1.
    #[error("invalid quantity {value}: must be at least 1")]
    InvalidQuantity {
        /// The rejected quantity.
        value: u32,
    },

    /// The order status string is not recognized.
    #[error("invalid order status: {value}")]
    InvalidStatus {
        /// The invalid value provided.
        value: String,
    },
}
