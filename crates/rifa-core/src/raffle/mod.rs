//! Raffle aggregate: capacity, lifecycle, and derived statistics.
//!
//! A raffle owns a fixed pool of numbered tickets and moves through
//! `active`, `paused`, `completed`, and `cancelled` states. At most one
//! raffle is `active` per owning bot at any time; the partial unique index
//! in the schema backs the invariant, and [`RaffleRegistry`] preserves it
//! by pausing any sibling before activating a raffle.
//!
//! Statistics are never trusted counters: [`RaffleStats::compute`] derives
//! them from the tickets/orders tables on demand, and the columns on the
//! raffle row are only a read-through cache refreshed after every
//! mutation.

mod error;
mod registry;
mod stats;

#[cfg(test)]
mod tests;

pub use error::RaffleError;
pub(crate) use registry::find_raffle;
pub(crate) use stats::refresh_counters;
pub use registry::{Raffle, RaffleRegistry, RaffleStatus};
pub use stats::RaffleStats;
