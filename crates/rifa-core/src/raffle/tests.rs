//! Unit tests for the raffle registry and derived statistics.

use std::sync::Arc;

use rusqlite::params;

use super::{RaffleError, RaffleRegistry, RaffleStatus};
use crate::store::Store;
use crate::ticket::AllocationMode;

fn registry() -> (Arc<Store>, RaffleRegistry) {
    let store = Arc::new(Store::in_memory().unwrap());
    let registry = RaffleRegistry::new(Arc::clone(&store));
    (store, registry)
}

#[test]
fn create_initializes_pool_and_activates() {
    let (_store, registry) = registry();
    let raffle = registry
        .create("bot-1", 10, 500, AllocationMode::Sequential, 0)
        .unwrap();

    assert_eq!(raffle.status, RaffleStatus::Active);
    assert_eq!(raffle.total_slots, 10);

    let stats = registry.stats(raffle.id).unwrap();
    assert_eq!(stats.tickets_available, 10);
    assert_eq!(stats.tickets_issued, 0);
}

#[test]
fn creating_a_second_raffle_pauses_the_sibling() {
    let (_store, registry) = registry();
    let first = registry
        .create("bot-1", 10, 500, AllocationMode::Sequential, 0)
        .unwrap();
    let second = registry
        .create("bot-1", 20, 500, AllocationMode::Sequential, 1)
        .unwrap();

    assert_eq!(registry.get(first.id).unwrap().status, RaffleStatus::Paused);
    assert_eq!(second.status, RaffleStatus::Active);

    let active = registry.find_active("bot-1").unwrap().unwrap();
    assert_eq!(active.id, second.id);
}

#[test]
fn raffles_of_different_bots_are_independent() {
    let (_store, registry) = registry();
    let a = registry
        .create("bot-1", 10, 500, AllocationMode::Sequential, 0)
        .unwrap();
    let b = registry
        .create("bot-2", 10, 500, AllocationMode::Sequential, 0)
        .unwrap();

    assert_eq!(registry.get(a.id).unwrap().status, RaffleStatus::Active);
    assert_eq!(registry.get(b.id).unwrap().status, RaffleStatus::Active);
}

#[test]
fn reactivate_pauses_active_sibling() {
    let (_store, registry) = registry();
    let first = registry
        .create("bot-1", 10, 500, AllocationMode::Sequential, 0)
        .unwrap();
    let second = registry
        .create("bot-1", 20, 500, AllocationMode::Sequential, 1)
        .unwrap();

    registry.reactivate(first.id).unwrap();

    assert_eq!(registry.get(first.id).unwrap().status, RaffleStatus::Active);
    assert_eq!(registry.get(second.id).unwrap().status, RaffleStatus::Paused);
}

#[test]
fn pause_requires_active_state() {
    let (_store, registry) = registry();
    let raffle = registry
        .create("bot-1", 10, 500, AllocationMode::Sequential, 0)
        .unwrap();
    registry.pause(raffle.id).unwrap();

    let err = registry.pause(raffle.id).unwrap_err();
    assert!(matches!(
        err,
        RaffleError::InvalidTransition {
            from: RaffleStatus::Paused,
            attempted: "pause",
            ..
        }
    ));
}

#[test]
fn complete_requires_an_issued_winner() {
    let (store, registry) = registry();
    let raffle = registry
        .create("bot-1", 10, 500, AllocationMode::Sequential, 0)
        .unwrap();

    let err = registry.complete(raffle.id, 3, 100).unwrap_err();
    assert!(matches!(err, RaffleError::WinnerNotIssued { number: 3, .. }));

    // Issue ticket 3 directly and complete.
    store
        .with_tx(|tx| {
            tx.execute(
                "UPDATE tickets SET owner_id = 'user-9', issued_at = 50
                 WHERE raffle_id = ?1 AND number = 3",
                params![raffle.id],
            )?;
            Ok::<_, rusqlite::Error>(())
        })
        .unwrap();

    let done = registry.complete(raffle.id, 3, 100).unwrap();
    assert_eq!(done.status, RaffleStatus::Completed);
    assert_eq!(done.winner_number, Some(3));
    assert_eq!(done.winner_owner.as_deref(), Some("user-9"));
    assert_eq!(done.completed_at, Some(100));
}

#[test]
fn cancel_is_rejected_after_completion() {
    let (store, registry) = registry();
    let raffle = registry
        .create("bot-1", 10, 500, AllocationMode::Sequential, 0)
        .unwrap();
    store
        .with_tx(|tx| {
            tx.execute(
                "UPDATE tickets SET owner_id = 'user-1', issued_at = 1
                 WHERE raffle_id = ?1 AND number = 1",
                params![raffle.id],
            )?;
            Ok::<_, rusqlite::Error>(())
        })
        .unwrap();
    registry.complete(raffle.id, 1, 10).unwrap();

    let err = registry.cancel(raffle.id, "late cancel", 20).unwrap_err();
    assert!(matches!(
        err,
        RaffleError::InvalidTransition {
            from: RaffleStatus::Completed,
            attempted: "cancel",
            ..
        }
    ));
}

#[test]
fn resize_capacity_grows_and_shrinks() {
    let (_store, registry) = registry();
    let raffle = registry
        .create("bot-1", 5, 500, AllocationMode::Sequential, 0)
        .unwrap();

    let grown = registry.resize_capacity(raffle.id, 8).unwrap();
    assert_eq!(grown.total_slots, 8);
    assert_eq!(registry.stats(raffle.id).unwrap().tickets_available, 8);

    let shrunk = registry.resize_capacity(raffle.id, 4).unwrap();
    assert_eq!(shrunk.total_slots, 4);
    assert_eq!(registry.stats(raffle.id).unwrap().tickets_available, 4);
}

#[test]
fn reconcile_rewrites_cached_counters() {
    let (store, registry) = registry();
    let raffle = registry
        .create("bot-1", 10, 500, AllocationMode::Sequential, 0)
        .unwrap();

    // Corrupt the cached counter on purpose.
    store
        .with_tx(|tx| {
            tx.execute(
                "UPDATE raffles SET tickets_issued = 42 WHERE id = ?1",
                params![raffle.id],
            )?;
            Ok::<_, rusqlite::Error>(())
        })
        .unwrap();
    assert_eq!(registry.get(raffle.id).unwrap().tickets_issued, 42);

    let stats = registry.reconcile(raffle.id).unwrap();
    assert_eq!(stats.tickets_issued, 0);
    assert_eq!(registry.get(raffle.id).unwrap().tickets_issued, 0);
}

#[test]
fn get_unknown_raffle_fails() {
    let (_store, registry) = registry();
    assert!(matches!(
        registry.get(999).unwrap_err(),
        RaffleError::NotFound { raffle_id: 999 }
    ));
}
