//! Unit tests for the duplicate detector.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use rusqlite::params;

use super::{DuplicateDetector, FingerprintStatus, MatchRule, ReceiptFingerprint};
use crate::store::Store;

fn setup() -> (Arc<Store>, i64) {
    let store = Arc::new(Store::in_memory().unwrap());
    let raffle_id = store
        .with_tx(|tx| {
            tx.execute(
                "INSERT INTO raffles (bot_id, total_slots, unit_price_cents, created_at)
                 VALUES ('bot-1', 10, 500, 0)",
                params![],
            )?;
            Ok::<_, rusqlite::Error>(tx.last_insert_rowid())
        })
        .unwrap();
    (store, raffle_id)
}

fn fp(hash: &str, op: Option<&str>, cents: i64, minute: i64) -> ReceiptFingerprint {
    ReceiptFingerprint {
        file_hash: hash.to_string(),
        bank_op_id: op.map(str::to_string),
        amount_cents: cents,
        paid_at_minute: minute,
    }
}

#[test]
fn fingerprint_truncates_date_to_minute() {
    let paid_at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 47).unwrap();
    let fingerprint = ReceiptFingerprint::new("abc", None, 1500, paid_at);

    let minute = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
    assert_eq!(fingerprint.paid_at_minute, minute.timestamp());
}

#[test]
fn same_file_bytes_match_regardless_of_other_fields() {
    let (store, raffle_id) = setup();
    let detector = DuplicateDetector::new(store);

    let first = fp("hash-a", Some("op-1"), 1000, 60);
    let original_id = detector
        .record("bot-1", raffle_id, None, &first, FingerprintStatus::Accepted, 0)
        .unwrap();

    // Same bytes, different operation id, amount and date.
    let resubmission = fp("hash-a", Some("op-2"), 9999, 6000);
    let m = detector.check("bot-1", &resubmission).unwrap().unwrap();
    assert_eq!(m.original_id, original_id);
    assert_eq!(m.rule, MatchRule::FileHash);
}

#[test]
fn bank_operation_id_matches_before_amount_date() {
    let (store, raffle_id) = setup();
    let detector = DuplicateDetector::new(store);

    let first = fp("hash-a", Some("op-1"), 1000, 60);
    let original_id = detector
        .record("bot-1", raffle_id, None, &first, FingerprintStatus::Accepted, 0)
        .unwrap();

    let second = fp("hash-b", Some("op-1"), 1000, 60);
    let m = detector.check("bot-1", &second).unwrap().unwrap();
    assert_eq!(m.original_id, original_id);
    assert_eq!(m.rule, MatchRule::BankOperation);
}

#[test]
fn amount_date_key_is_the_fallback() {
    let (store, raffle_id) = setup();
    let detector = DuplicateDetector::new(store);

    detector
        .record(
            "bot-1",
            raffle_id,
            None,
            &fp("hash-a", None, 1500, 120),
            FingerprintStatus::Accepted,
            0,
        )
        .unwrap();

    let m = detector
        .check("bot-1", &fp("hash-b", None, 1500, 120))
        .unwrap()
        .unwrap();
    assert_eq!(m.rule, MatchRule::AmountDate);

    // Same amount, different minute: no match.
    assert!(detector
        .check("bot-1", &fp("hash-b", None, 1500, 180))
        .unwrap()
        .is_none());
}

#[test]
fn rejected_and_duplicate_receipts_do_not_block_resubmission() {
    let (store, raffle_id) = setup();
    let detector = DuplicateDetector::new(store);

    let id = detector
        .record(
            "bot-1",
            raffle_id,
            None,
            &fp("hash-a", None, 1000, 60),
            FingerprintStatus::Accepted,
            0,
        )
        .unwrap();
    detector.mark_rejected(id).unwrap();

    assert!(detector
        .check("bot-1", &fp("hash-a", None, 1000, 60))
        .unwrap()
        .is_none());
}

#[test]
fn matching_is_scoped_to_the_owning_bot() {
    let (store, raffle_id) = setup();
    let detector = DuplicateDetector::new(store);

    detector
        .record(
            "bot-1",
            raffle_id,
            None,
            &fp("hash-a", None, 1000, 60),
            FingerprintStatus::Accepted,
            0,
        )
        .unwrap();

    assert!(detector
        .check("bot-2", &fp("hash-a", None, 1000, 60))
        .unwrap()
        .is_none());
}
