//! # rifa-core
//!
//! Reservation engine for time-boxed raffles that sell numbered tickets
//! against a fixed capacity. Proof of payment is reviewed by a human before
//! a reservation becomes final, and abandoned reservations are reclaimed by
//! a periodic sweep.
//!
//! # Architecture
//!
//! ```text
//! create --> Order (RESERVED, deadline)
//!               |
//!               v
//! attach_receipt --> Order (REVIEW, no deadline)
//!               |
//!               v
//! approve/reject --> Order (SOLD / REJECTED)
//!
//! deadline elapsed + sweep --> Order (EXPIRED, tickets freed)
//! ```
//!
//! # Key Concepts
//!
//! - **Ticket**: one numbered unit of raffle capacity, allocated and
//!   released by the [`ticket`] pool operations
//! - **Order**: a reservation of N tickets pending payment proof and review,
//!   driven through its state machine by [`order::OrderEngine`]
//! - **Raffle**: one running instance of the game with a fixed capacity;
//!   at most one raffle is `active` per owning bot
//! - **Duplicate fingerprint**: derived keys (file hash, bank operation id,
//!   amount+minute) used by [`dedup::DuplicateDetector`] to catch receipt
//!   resubmission before an order can be approved
//!
//! # Concurrency Model
//!
//! There is no in-process shared mutable state between handlers. All
//! coordination goes through the SQLite store: every mutating operation runs
//! inside one IMMEDIATE (write) transaction and either fully commits or
//! fully rolls back. The write transaction plays the role of row-level
//! locking — the first claim to start its transaction wins, a losing
//! concurrent claim observes fewer free tickets and fails with a capacity
//! error instead of double-allocating.

pub mod config;
pub mod dedup;
pub mod notify;
pub mod order;
pub mod raffle;
pub mod store;
pub mod sweeper;
pub mod ticket;

pub use config::DaemonConfig;
pub use dedup::{DuplicateDetector, DuplicateMatch, ReceiptFingerprint};
pub use notify::{LogNotifier, Notifier};
pub use order::{Order, OrderEngine, OrderStatus};
pub use raffle::{Raffle, RaffleRegistry, RaffleStats, RaffleStatus};
pub use store::Store;
pub use sweeper::{ExpirySweeper, SweepReport};
pub use ticket::{AllocationMode, PoolStats};
