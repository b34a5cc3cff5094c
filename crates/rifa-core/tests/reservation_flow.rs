//! End-to-end scenarios across the raffle, order, ticket, and dedup
//! components, on one shared in-memory store.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use rifa_core::dedup::{DuplicateDetector, FingerprintStatus, MatchRule, ReceiptFingerprint};
use rifa_core::notify::LogNotifier;
use rifa_core::order::{OrderEngine, OrderError, OrderStatus};
use rifa_core::raffle::RaffleRegistry;
use rifa_core::store::Store;
use rifa_core::sweeper::ExpirySweeper;
use rifa_core::ticket::AllocationMode;

struct World {
    registry: RaffleRegistry,
    engine: OrderEngine,
    detector: DuplicateDetector,
    sweeper: ExpirySweeper,
}

fn world() -> World {
    let store = Arc::new(Store::in_memory().unwrap());
    let registry = RaffleRegistry::new(Arc::clone(&store));
    let engine = OrderEngine::new(Arc::clone(&store), Arc::new(LogNotifier));
    let detector = DuplicateDetector::new(Arc::clone(&store));
    let sweeper = ExpirySweeper::new(engine.clone());
    World {
        registry,
        engine,
        detector,
        sweeper,
    }
}

#[test]
fn ten_slot_raffle_walkthrough() {
    let w = world();
    let raffle = w
        .registry
        .create("bot-1", 10, 500, AllocationMode::Sequential, 0)
        .unwrap();

    // Order A reserves 3: 7 remain free.
    let order_a = w.engine.create(raffle.id, "alice", 3, 3600, 0).unwrap();
    assert_eq!(order_a.status, OrderStatus::Reserved);
    assert_eq!(w.registry.stats(raffle.id).unwrap().tickets_available, 7);

    // A competing request for 8 fails: only 7 free.
    let err = w.engine.create(raffle.id, "bob", 8, 3600, 0).unwrap_err();
    assert!(matches!(
        err,
        OrderError::CapacityExceeded {
            requested: 8,
            available: 7,
            ..
        }
    ));

    // Alice's receipt arrives and is approved.
    w.engine.attach_receipt(order_a.id).unwrap();
    let order_a = w.engine.approve(order_a.id, "admin", None, 500).unwrap();
    assert_eq!(order_a.status, OrderStatus::Sold);
    assert_eq!(order_a.ticket_numbers, vec![1, 2, 3]);

    let stats = w.registry.stats(raffle.id).unwrap();
    assert_eq!(stats.tickets_issued, 3);
    assert_eq!(stats.tickets_available, 7);
    assert_eq!(stats.total_revenue_cents, 1500);

    // The cached counters agree with the derived values.
    let cached = w.registry.get(raffle.id).unwrap();
    assert_eq!(cached.tickets_issued, 3);
    assert_eq!(cached.total_revenue_cents, 1500);
}

#[test]
fn abandoned_reservation_is_reclaimed_by_the_sweep() {
    let w = world();
    let raffle = w
        .registry
        .create("bot-1", 10, 500, AllocationMode::Sequential, 0)
        .unwrap();

    let order_b = w.engine.create(raffle.id, "bob", 4, 60, 0).unwrap();
    assert_eq!(w.registry.stats(raffle.id).unwrap().tickets_reserved, 4);

    let report = w.sweeper.sweep(120).unwrap();
    assert_eq!(report.expired, 1);

    assert_eq!(w.engine.get(order_b.id).unwrap().status, OrderStatus::Expired);
    let stats = w.registry.stats(raffle.id).unwrap();
    assert_eq!(stats.tickets_reserved, 0);
    assert_eq!(stats.tickets_available, 10);
}

#[test]
fn shrink_keeps_owned_ticket_above_new_capacity() {
    let w = world();
    let raffle = w
        .registry
        .create("bot-1", 10, 500, AllocationMode::Sequential, 0)
        .unwrap();

    // Sell tickets 1..=7: sequential claims take the lowest numbers.
    let order = w.engine.create(raffle.id, "carol", 7, 3600, 0).unwrap();
    w.engine.attach_receipt(order.id).unwrap();
    w.engine.approve(order.id, "admin", None, 100).unwrap();

    let shrunk = w.registry.resize_capacity(raffle.id, 5).unwrap();
    assert_eq!(shrunk.total_slots, 5);

    // Tickets 1..=7 are owned and all retained; only free 8..10 removed.
    let stats = w.registry.stats(raffle.id).unwrap();
    assert_eq!(stats.tickets_issued, 7);
    assert_eq!(stats.tickets_available, 0);
}

#[test]
fn duplicate_receipt_blocks_review_until_resolved() {
    let w = world();
    let raffle = w
        .registry
        .create("bot-1", 10, 500, AllocationMode::Sequential, 0)
        .unwrap();

    let order_a = w.engine.create(raffle.id, "alice", 2, 3600, 0).unwrap();
    let paid_at = Utc.with_ymd_and_hms(2024, 5, 1, 9, 15, 30).unwrap();

    // Alice's receipt is original: record it and move to review.
    let fp_a = ReceiptFingerprint::new("hash-a", Some("op-77".to_string()), 1000, paid_at);
    assert!(w.detector.check("bot-1", &fp_a).unwrap().is_none());
    let original_id = w
        .detector
        .record("bot-1", raffle.id, Some(order_a.id), &fp_a, FingerprintStatus::Accepted, 10)
        .unwrap();
    w.engine.attach_receipt(order_a.id).unwrap();

    // Bob resubmits the same file bytes with different metadata.
    let order_b = w.engine.create(raffle.id, "bob", 1, 3600, 0).unwrap();
    let fp_b = ReceiptFingerprint::new("hash-a", Some("op-99".to_string()), 9999, paid_at);
    let dup = w.detector.check("bot-1", &fp_b).unwrap().unwrap();
    assert_eq!(dup.original_id, original_id);
    assert_eq!(dup.rule, MatchRule::FileHash);

    // The caller records the duplicate and does not advance the order.
    w.detector
        .record("bot-1", raffle.id, Some(order_b.id), &fp_b, FingerprintStatus::Duplicate, 20)
        .unwrap();
    assert_eq!(w.engine.get(order_b.id).unwrap().status, OrderStatus::Reserved);

    // A genuinely different receipt goes through.
    let fp_c = ReceiptFingerprint::new(
        "hash-c",
        None,
        500,
        Utc.with_ymd_and_hms(2024, 5, 2, 18, 0, 0).unwrap(),
    );
    assert!(w.detector.check("bot-1", &fp_c).unwrap().is_none());
    w.engine.attach_receipt(order_b.id).unwrap();
    assert_eq!(w.engine.get(order_b.id).unwrap().status, OrderStatus::Review);
}

#[test]
fn winner_completion_after_sales() {
    let w = world();
    let raffle = w
        .registry
        .create("bot-1", 5, 500, AllocationMode::Sequential, 0)
        .unwrap();

    let order = w.engine.create(raffle.id, "dave", 2, 3600, 0).unwrap();
    w.engine.attach_receipt(order.id).unwrap();
    w.engine.approve(order.id, "admin", None, 50).unwrap();

    let done = w.registry.complete(raffle.id, 2, 100).unwrap();
    assert_eq!(done.winner_owner.as_deref(), Some("dave"));

    // A completed raffle sells no more tickets.
    let err = w.engine.create(raffle.id, "eve", 1, 3600, 200).unwrap_err();
    assert!(matches!(err, OrderError::RaffleNotActive { .. }));
}
