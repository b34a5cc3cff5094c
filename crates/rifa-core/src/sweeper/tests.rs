//! Unit tests for the expiry sweeper.

use std::sync::Arc;

use super::ExpirySweeper;
use crate::notify::LogNotifier;
use crate::order::{OrderEngine, OrderStatus};
use crate::raffle::RaffleRegistry;
use crate::store::Store;
use crate::ticket::AllocationMode;

fn setup() -> (RaffleRegistry, OrderEngine, ExpirySweeper, i64) {
    let store = Arc::new(Store::in_memory().unwrap());
    let registry = RaffleRegistry::new(Arc::clone(&store));
    let engine = OrderEngine::new(Arc::clone(&store), Arc::new(LogNotifier));
    let sweeper = ExpirySweeper::new(engine.clone());
    let raffle_id = registry
        .create("bot-1", 10, 500, AllocationMode::Sequential, 0)
        .unwrap()
        .id;
    (registry, engine, sweeper, raffle_id)
}

#[test]
fn sweep_reclaims_only_overdue_reservations() {
    let (registry, engine, sweeper, raffle_id) = setup();

    let overdue = engine.create(raffle_id, "user-1", 4, 60, 0).unwrap();
    let fresh = engine.create(raffle_id, "user-2", 2, 10_000, 0).unwrap();
    let reviewed = engine.create(raffle_id, "user-3", 1, 60, 0).unwrap();
    engine.attach_receipt(reviewed.id).unwrap();

    let report = sweeper.sweep(100).unwrap();
    assert_eq!(report.examined, 1);
    assert_eq!(report.expired, 1);
    assert_eq!(report.failed, 0);

    assert_eq!(engine.get(overdue.id).unwrap().status, OrderStatus::Expired);
    assert_eq!(engine.get(fresh.id).unwrap().status, OrderStatus::Reserved);
    assert_eq!(engine.get(reviewed.id).unwrap().status, OrderStatus::Review);

    // The overdue order's tickets returned to the pool.
    let stats = registry.stats(raffle_id).unwrap();
    assert_eq!(stats.tickets_available, 7);
    assert_eq!(stats.tickets_reserved, 3);
}

#[test]
fn sweep_twice_has_no_further_effect() {
    let (_registry, engine, sweeper, raffle_id) = setup();
    engine.create(raffle_id, "user-1", 2, 60, 0).unwrap();

    let first = sweeper.sweep(100).unwrap();
    assert_eq!(first.expired, 1);

    let second = sweeper.sweep(100).unwrap();
    assert_eq!(second.examined, 0);
    assert_eq!(second.expired, 0);
}

#[test]
fn sweep_with_nothing_overdue_is_quiet() {
    let (_registry, engine, sweeper, raffle_id) = setup();
    engine.create(raffle_id, "user-1", 2, 10_000, 0).unwrap();

    let report = sweeper.sweep(100).unwrap();
    assert_eq!(report, super::SweepReport::default());
}
