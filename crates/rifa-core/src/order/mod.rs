//! Order lifecycle: the reservation state machine.
//!
//! An order reserves N tickets against a raffle's capacity, waits for a
//! payment receipt, and is finalized or released by a human decision.
//!
//! # State Machine
//!
//! ```text
//! create --> RESERVED (deadline = now + ttl)
//!               |
//!               | attach_receipt          | deadline elapsed + expire
//!               v                         v
//!            REVIEW                    EXPIRED (tickets freed)
//!             |    |
//!     approve |    | reject
//!             v    v
//!           SOLD  REJECTED (tickets freed)
//! ```
//!
//! `SOLD`, `REJECTED`, and `EXPIRED` are terminal; no transition re-enters
//! `RESERVED`. While an order is live (`RESERVED`/`REVIEW`) exactly
//! `quantity` tickets are linked to it; once terminal, zero are — sold
//! tickets carry the owner instead of the order link.
//!
//! All mutating operations are single transactions through
//! [`Store::with_tx`](crate::store::Store::with_tx); none partially apply.

mod engine;
mod error;


pub use engine::{Order, OrderEngine, OrderStatus};
pub use error::OrderError;
