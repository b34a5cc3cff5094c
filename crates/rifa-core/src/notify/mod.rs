//! Messaging collaborator seam.
//!
//! The engine reports order lifecycle events to the requester through this
//! trait. Delivery is fire-and-forget: the engine fires notifications only
//! after its transaction has committed, logs failures, and never lets them
//! affect the transaction outcome. Capacity correctness always takes
//! precedence over notification delivery.

use thiserror::Error;
use tracing::info;

/// Error from a notification backend.
#[derive(Debug, Error)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Outbound lifecycle notifications for one requester.
///
/// Implementations deliver to the actual messaging channel (outside this
/// crate). Errors are reported back so the caller can log them; they are
/// never retried or allowed to revert engine state.
pub trait Notifier: Send + Sync {
    /// A reservation was created; tickets are held until `deadline`.
    fn reservation_created(
        &self,
        requester_id: &str,
        order_id: i64,
        quantity: u32,
        deadline: i64,
    ) -> Result<(), NotifyError>;

    /// A receipt was accepted for human review.
    fn receipt_under_review(&self, requester_id: &str, order_id: i64) -> Result<(), NotifyError>;

    /// The order was approved; these are the final ticket numbers.
    fn order_approved(
        &self,
        requester_id: &str,
        order_id: i64,
        ticket_numbers: &[u32],
    ) -> Result<(), NotifyError>;

    /// The order was rejected with a reason.
    fn order_rejected(
        &self,
        requester_id: &str,
        order_id: i64,
        reason: &str,
    ) -> Result<(), NotifyError>;

    /// The reservation expired and its tickets were released.
    fn order_expired(&self, requester_id: &str, order_id: i64) -> Result<(), NotifyError>;
}

/// Default notifier that only writes structured log lines.
///
/// Useful for tests and for deployments where the messaging adapter is
/// wired in elsewhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn reservation_created(
        &self,
        requester_id: &str,
        order_id: i64,
        quantity: u32,
        deadline: i64,
    ) -> Result<(), NotifyError> {
        info!(requester_id, order_id, quantity, deadline, "notify: reservation created");
        Ok(())
    }

    fn receipt_under_review(&self, requester_id: &str, order_id: i64) -> Result<(), NotifyError> {
        info!(requester_id, order_id, "notify: receipt under review");
        Ok(())
    }

    fn order_approved(
        &self,
        requester_id: &str,
        order_id: i64,
        ticket_numbers: &[u32],
    ) -> Result<(), NotifyError> {
        info!(requester_id, order_id, ?ticket_numbers, "notify: order approved");
        Ok(())
    }

    fn order_rejected(
        &self,
        requester_id: &str,
        order_id: i64,
        reason: &str,
    ) -> Result<(), NotifyError> {
        info!(requester_id, order_id, reason, "notify: order rejected");
        Ok(())
    }

    fn order_expired(&self, requester_id: &str, order_id: i64) -> Result<(), NotifyError> {
        info!(requester_id, order_id, "notify: order expired");
        Ok(())
    }
}
