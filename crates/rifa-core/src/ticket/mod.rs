//! Numbered-ticket pool for one raffle.
//!
//! Tickets are the finite resource the engine allocates: numbered
//! `1..=total_slots`, created in bulk when a raffle's capacity is
//! (re)initialized, and mutated only through the operations in this module.
//!
//! # Linkage invariants
//!
//! - A ticket has an owner only if it has an `issued_at` timestamp.
//! - A ticket may be linked to an order while its owner is still unset
//!   (mid-reservation).
//! - [`claim`] never partially allocates: either `quantity` free tickets
//!   are linked to the order, or the operation fails and the surrounding
//!   transaction rolls back.
//! - [`issue`] aborts with [`TicketError::TicketCountMismatch`] if the
//!   linked-ticket count does not equal the order's recorded quantity; a
//!   mismatch indicates a lost or duplicated claim and must never silently
//!   under- or over-issue.
//!
//! All functions here take a [`rusqlite::Connection`] and expect to run
//! inside the caller's write transaction (see
//! [`Store::with_tx`](crate::store::Store::with_tx)).

mod error;
mod pool;


pub use error::TicketError;
pub(crate) use pool::owner_of;
pub use pool::{
    AllocationMode, PoolStats, ShrinkOutcome, claim, initialize, issue, release, release_partial,
    shrink, stats,
};
