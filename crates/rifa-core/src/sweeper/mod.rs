//! Reservation expiry sweeper.
//!
//! Reclaims reservations abandoned by requesters who never submitted a
//! receipt. The sweeper is driven by an external scheduler (the daemon's
//! interval loop); the deadline itself is advisory data, not an active
//! task — an order can sit in `reserved` past its deadline until a sweep
//! runs, which makes reclamation at-least-once rather than real-time.
//!
//! Each overdue order is expired independently so one failure does not
//! block the others. Notification of the requester is delegated to the
//! engine's [`Notifier`](crate::notify::Notifier) seam; a delivery failure
//! is logged but never reverts the reclamation — capacity correctness
//! takes precedence over notification delivery.

use serde::Serialize;
use tracing::{info, warn};

use crate::order::OrderEngine;

#[cfg(test)]
mod tests;

/// Outcome of one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Overdue reserved orders found.
    pub examined: usize,
    /// Orders reclaimed by this pass.
    pub expired: usize,
    /// Orders whose expiry failed; left for the next pass.
    pub failed: usize,
}

/// Periodically reclaims overdue reservations through the order engine.
#[derive(Clone)]
pub struct ExpirySweeper {
    engine: OrderEngine,
}

impl ExpirySweeper {
    /// Creates a sweeper over the order engine.
    #[must_use]
    pub fn new(engine: OrderEngine) -> Self {
        Self { engine }
    }

    /// Runs one sweep pass at time `now`.
    ///
    /// Finds all reserved orders with a deadline in the past and expires
    /// each one independently. Orders that raced with a concurrent
    /// transition (receipt attached between the scan and the expiry) are
    /// skipped by the engine's no-op semantics and not counted as
    /// failures.
    ///
    /// # Errors
    ///
    /// Returns a database error only if the overdue scan itself fails;
    /// per-order failures are logged and reported in the
    /// [`SweepReport`].
    pub fn sweep(&self, now: i64) -> Result<SweepReport, crate::order::OrderError> {
        let overdue = self.engine.list_overdue(now)?;

        let mut report = SweepReport {
            examined: overdue.len(),
            ..SweepReport::default()
        };

        for order_id in overdue {
            match self.engine.expire_if_overdue(order_id, now) {
                Ok(true) => report.expired += 1,
                Ok(false) => {}
                Err(err) => {
                    report.failed += 1;
                    warn!(order_id, %err, "failed to expire overdue order");
                }
            }
        }

        if report.examined > 0 {
            info!(
                examined = report.examined,
                expired = report.expired,
                failed = report.failed,
                "sweep pass finished"
            );
        }
        Ok(report)
    }
}
