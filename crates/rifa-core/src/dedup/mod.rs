//! Receipt duplicate detection.
//!
//! Before an order is allowed to advance to approval, the submitted
//! receipt's fingerprints are checked against previously accepted receipts
//! in the same owner scope. Three independent keys are tried in priority
//! order, first match wins:
//!
//! 1. **File content hash** — the strongest signal: the same bytes were
//!    re-submitted.
//! 2. **Bank operation identifier** — bank-guaranteed unique per payment.
//! 3. **Amount + date key** — amount in cents plus payment date truncated
//!    to the minute; a heuristic fallback and the most likely source of
//!    false positives, so it is checked last.
//!
//! The detector never mutates order state. The caller decides how to react
//! to a match — typically by warning the submitter and requesting a
//! different receipt.

mod detector;
mod error;

#[cfg(test)]
mod tests;

pub use detector::{
    DuplicateDetector, DuplicateMatch, FingerprintStatus, MatchRule, ReceiptFingerprint,
};
pub use error::DedupError;
