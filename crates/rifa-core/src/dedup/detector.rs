//! Fingerprint storage and the three-rule duplicate classifier.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::{OptionalExtension, ToSql, params};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::error::DedupError;
use crate::store::Store;

/// Which rule classified a receipt as a duplicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchRule {
    /// Exact file-content hash match.
    FileHash,
    /// Bank operation identifier match.
    BankOperation,
    /// Amount + minute-truncated date match.
    AmountDate,
}

impl fmt::Display for MatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::FileHash => "file_hash",
            Self::BankOperation => "bank_operation",
            Self::AmountDate => "amount_date",
        };
        f.write_str(s)
    }
}

/// A classified duplicate: which prior receipt matched and by which rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateMatch {
    /// Fingerprint ID of the original (previously accepted) receipt.
    pub original_id: i64,
    /// The rule that fired.
    pub rule: MatchRule,
}

/// Review status of a stored fingerprint.
///
/// Only `accepted` fingerprints participate in duplicate matching:
/// receipts already classified as duplicates or rejected by a reviewer
/// must not block a legitimate resubmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FingerprintStatus {
    /// Counted as an original; participates in matching.
    Accepted,
    /// Classified as a duplicate of an earlier receipt.
    Duplicate,
    /// Rejected by a reviewer.
    Rejected,
}

impl FingerprintStatus {
    /// Returns the canonical string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Duplicate => "duplicate",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for FingerprintStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FingerprintStatus {
    type Err = DedupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "accepted" => Ok(Self::Accepted),
            "duplicate" => Ok(Self::Duplicate),
            "rejected" => Ok(Self::Rejected),
            other => Err(DedupError::InvalidStatus {
                value: other.to_string(),
            }),
        }
    }
}

impl ToSql for FingerprintStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for FingerprintStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: DedupError| FromSqlError::Other(Box::new(e)))
    }
}

/// The derived keys of one submitted receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptFingerprint {
    /// Content hash of the uploaded file (hex-encoded).
    pub file_hash: String,
    /// Bank-issued operation identifier extracted from text, if any.
    pub bank_op_id: Option<String>,
    /// Parsed amount in cents.
    pub amount_cents: i64,
    /// Payment date truncated to the minute, unix seconds.
    pub paid_at_minute: i64,
}

impl ReceiptFingerprint {
    /// Builds a fingerprint, truncating the payment date to the minute.
    #[must_use]
    pub fn new(
        file_hash: impl Into<String>,
        bank_op_id: Option<String>,
        amount_cents: i64,
        paid_at: DateTime<Utc>,
    ) -> Self {
        let secs = paid_at.timestamp();
        Self {
            file_hash: file_hash.into(),
            bank_op_id,
            amount_cents,
            paid_at_minute: secs - secs.rem_euclid(60),
        }
    }
}

/// Classifies incoming receipts as original or duplicate and maintains the
/// fingerprint table.
#[derive(Clone)]
pub struct DuplicateDetector {
    store: Arc<Store>,
}

impl DuplicateDetector {
    /// Creates a detector over the shared store.
    #[must_use]
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Checks a fingerprint against prior accepted receipts for `bot_id`.
    ///
    /// Rules fire in priority order (file hash, bank operation id,
    /// amount+date); the first match wins and is logged. Returns `None`
    /// when the receipt is original. Never mutates state.
    ///
    /// # Errors
    ///
    /// Returns a database error if a lookup fails.
    pub fn check(
        &self,
        bot_id: &str,
        fingerprint: &ReceiptFingerprint,
    ) -> Result<Option<DuplicateMatch>, DedupError> {
        self.store.read(|conn| {
            let by_hash: Option<i64> = conn
                .query_row(
                    "SELECT id FROM receipt_fingerprints
                     WHERE bot_id = ?1 AND file_hash = ?2 AND status = 'accepted'
                     ORDER BY id ASC LIMIT 1",
                    params![bot_id, fingerprint.file_hash],
                    |row| row.get(0),
                )
                .optional()?;
            if let Some(original_id) = by_hash {
                let m = DuplicateMatch {
                    original_id,
                    rule: MatchRule::FileHash,
                };
                info!(bot_id, original_id, rule = %m.rule, "duplicate receipt detected");
                return Ok(Some(m));
            }

            if let Some(bank_op_id) = &fingerprint.bank_op_id {
                let by_op: Option<i64> = conn
                    .query_row(
                        "SELECT id FROM receipt_fingerprints
                         WHERE bot_id = ?1 AND bank_op_id = ?2 AND status = 'accepted'
                         ORDER BY id ASC LIMIT 1",
                        params![bot_id, bank_op_id],
                        |row| row.get(0),
                    )
                    .optional()?;
                if let Some(original_id) = by_op {
                    let m = DuplicateMatch {
                        original_id,
                        rule: MatchRule::BankOperation,
                    };
                    info!(bot_id, original_id, rule = %m.rule, "duplicate receipt detected");
                    return Ok(Some(m));
                }
            }

            let by_key: Option<i64> = conn
                .query_row(
                    "SELECT id FROM receipt_fingerprints
                     WHERE bot_id = ?1 AND amount_cents = ?2 AND paid_at_minute = ?3
                       AND status = 'accepted'
                     ORDER BY id ASC LIMIT 1",
                    params![bot_id, fingerprint.amount_cents, fingerprint.paid_at_minute],
                    |row| row.get(0),
                )
                .optional()?;
            if let Some(original_id) = by_key {
                let m = DuplicateMatch {
                    original_id,
                    rule: MatchRule::AmountDate,
                };
                info!(bot_id, original_id, rule = %m.rule, "duplicate receipt detected");
                return Ok(Some(m));
            }

            Ok(None)
        })
    }

    /// Records a fingerprint with the given status.
    ///
    /// Returns the new fingerprint ID.
    ///
    /// # Errors
    ///
    /// Returns a database error if the insert fails.
    pub fn record(
        &self,
        bot_id: &str,
        raffle_id: i64,
        order_id: Option<i64>,
        fingerprint: &ReceiptFingerprint,
        status: FingerprintStatus,
        now: i64,
    ) -> Result<i64, DedupError> {
        self.store.with_tx(|tx| {
            tx.execute(
                "INSERT INTO receipt_fingerprints
                 (bot_id, raffle_id, order_id, file_hash, bank_op_id, amount_cents,
                  paid_at_minute, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    bot_id,
                    raffle_id,
                    order_id,
                    fingerprint.file_hash,
                    fingerprint.bank_op_id,
                    fingerprint.amount_cents,
                    fingerprint.paid_at_minute,
                    status,
                    now,
                ],
            )?;
            Ok(tx.last_insert_rowid())
        })
    }

    /// Marks a stored fingerprint as a duplicate, removing it from future
    /// matching.
    ///
    /// # Errors
    ///
    /// Returns [`DedupError::NotFound`] if no such fingerprint exists.
    pub fn mark_duplicate(&self, fingerprint_id: i64) -> Result<(), DedupError> {
        self.set_status(fingerprint_id, FingerprintStatus::Duplicate)
    }

    /// Marks a stored fingerprint as rejected, removing it from future
    /// matching.
    ///
    /// # Errors
    ///
    /// Returns [`DedupError::NotFound`] if no such fingerprint exists.
    pub fn mark_rejected(&self, fingerprint_id: i64) -> Result<(), DedupError> {
        self.set_status(fingerprint_id, FingerprintStatus::Rejected)
    }

    fn set_status(&self, fingerprint_id: i64, status: FingerprintStatus) -> Result<(), DedupError> {
        self.store.with_tx(|tx| {
            let changed = tx.execute(
                "UPDATE receipt_fingerprints SET status = ?1 WHERE id = ?2",
                params![status, fingerprint_id],
            )?;
            if changed == 0 {
                return Err(DedupError::NotFound { fingerprint_id });
            }
            Ok(())
        })
    }
}
