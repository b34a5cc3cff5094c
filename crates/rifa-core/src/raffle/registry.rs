//! Raffle records and the lifecycle registry.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::{Connection, OptionalExtension, Row, ToSql, params};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::error::RaffleError;
use super::stats::{RaffleStats, refresh_counters};
use crate::store::Store;
use crate::ticket::{self, AllocationMode};

/// Lifecycle state of a raffle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RaffleStatus {
    /// Selling tickets; at most one per owning bot.
    Active,
    /// Temporarily not selling; can be reactivated.
    Paused,
    /// Finished with a recorded winner. Terminal.
    Completed,
    /// Cancelled with a reason. Terminal.
    Cancelled,
}

impl RaffleStatus {
    /// Returns the canonical string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Returns `true` for states that never transition again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

impl fmt::Display for RaffleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RaffleStatus {
    type Err = RaffleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "paused" => Ok(Self::Paused),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(RaffleError::InvalidStatus {
                value: other.to_string(),
            }),
        }
    }
}

impl ToSql for RaffleStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for RaffleStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: RaffleError| FromSqlError::Other(Box::new(e)))
    }
}

/// One running instance of the game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raffle {
    /// Surrogate ID.
    pub id: i64,
    /// The owning bot.
    pub bot_id: String,
    /// Configured capacity.
    pub total_slots: u32,
    /// Price of one ticket, in cents.
    pub unit_price_cents: i64,
    /// How ticket claims order the free numbers.
    pub mode: AllocationMode,
    /// Lifecycle state.
    pub status: RaffleStatus,
    /// Cached copy of [`RaffleStats::tickets_issued`].
    pub tickets_issued: u32,
    /// Cached copy of [`RaffleStats::total_participants`].
    pub total_participants: u32,
    /// Cached copy of [`RaffleStats::total_revenue_cents`].
    pub total_revenue_cents: i64,
    /// Cached copy of [`RaffleStats::receipts_count`].
    pub receipts_count: u32,
    /// Winning ticket number, once completed.
    pub winner_number: Option<u32>,
    /// Winning ticket's owner, once completed.
    pub winner_owner: Option<String>,
    /// Reason recorded on cancellation.
    pub cancel_reason: Option<String>,
    /// Creation time, unix seconds.
    pub created_at: i64,
    /// Completion time, unix seconds.
    pub completed_at: Option<i64>,
    /// Cancellation time, unix seconds.
    pub cancelled_at: Option<i64>,
}

const RAFFLE_COLUMNS: &str = "id, bot_id, total_slots, unit_price_cents, mode, status, \
     tickets_issued, total_participants, total_revenue_cents, receipts_count, \
     winner_number, winner_owner, cancel_reason, created_at, completed_at, cancelled_at";

fn row_to_raffle(row: &Row<'_>) -> rusqlite::Result<Raffle> {
    Ok(Raffle {
        id: row.get(0)?,
        bot_id: row.get(1)?,
        total_slots: row.get(2)?,
        unit_price_cents: row.get(3)?,
        mode: row.get(4)?,
        status: row.get(5)?,
        tickets_issued: row.get(6)?,
        total_participants: row.get(7)?,
        total_revenue_cents: row.get(8)?,
        receipts_count: row.get(9)?,
        winner_number: row.get(10)?,
        winner_owner: row.get(11)?,
        cancel_reason: row.get(12)?,
        created_at: row.get(13)?,
        completed_at: row.get(14)?,
        cancelled_at: row.get(15)?,
    })
}

/// Fetches a raffle row, `None` if absent. Shared with the order engine.
pub(crate) fn find_raffle(conn: &Connection, raffle_id: i64) -> rusqlite::Result<Option<Raffle>> {
    let sql = format!("SELECT {RAFFLE_COLUMNS} FROM raffles WHERE id = ?1");
    conn.query_row(&sql, params![raffle_id], row_to_raffle)
        .optional()
}

pub(crate) fn get_raffle(conn: &Connection, raffle_id: i64) -> Result<Raffle, RaffleError> {
    find_raffle(conn, raffle_id)?.ok_or(RaffleError::NotFound { raffle_id })
}

/// Manages raffle lifecycle and capacity.
#[derive(Clone)]
pub struct RaffleRegistry {
    store: Arc<Store>,
}

impl RaffleRegistry {
    /// Creates a registry over the shared store.
    #[must_use]
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Creates a raffle in `active` state and initializes its ticket pool.
    ///
    /// Any sibling raffle that is currently active for the same bot is
    /// paused first, preserving the one-active-per-bot invariant.
    ///
    /// # Errors
    ///
    /// Returns [`TicketError::InvalidCapacity`](crate::ticket::TicketError)
    /// for a zero capacity, or a database error.
    pub fn create(
        &self,
        bot_id: &str,
        total_slots: u32,
        unit_price_cents: i64,
        mode: AllocationMode,
        now: i64,
    ) -> Result<Raffle, RaffleError> {
        self.store.with_tx(|tx| {
            tx.execute(
                "UPDATE raffles SET status = 'paused' WHERE bot_id = ?1 AND status = 'active'",
                params![bot_id],
            )?;

            tx.execute(
                "INSERT INTO raffles
                 (bot_id, total_slots, unit_price_cents, mode, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, 'active', ?5)",
                params![bot_id, total_slots, unit_price_cents, mode, now],
            )?;
            let raffle_id = tx.last_insert_rowid();

            ticket::initialize(tx, raffle_id, total_slots)?;

            info!(raffle_id, bot_id, total_slots, "raffle created");
            get_raffle(tx, raffle_id)
        })
    }

    /// Fetches a raffle by ID.
    ///
    /// # Errors
    ///
    /// Returns [`RaffleError::NotFound`] if no such raffle exists.
    pub fn get(&self, raffle_id: i64) -> Result<Raffle, RaffleError> {
        self.store.read(|conn| get_raffle(conn, raffle_id))
    }

    /// Finds the bot's active raffle, if one exists.
    ///
    /// This is a derived lookup backed by the partial unique index; no
    /// cached "current raffle" pointer exists anywhere.
    ///
    /// # Errors
    ///
    /// Returns a database error if the query fails.
    pub fn find_active(&self, bot_id: &str) -> Result<Option<Raffle>, RaffleError> {
        self.store.read(|conn| {
            let sql =
                format!("SELECT {RAFFLE_COLUMNS} FROM raffles WHERE bot_id = ?1 AND status = 'active'");
            Ok(conn
                .query_row(&sql, params![bot_id], row_to_raffle)
                .optional()?)
        })
    }

    /// Pauses an active raffle.
    ///
    /// # Errors
    ///
    /// Returns [`RaffleError::InvalidTransition`] unless the raffle is
    /// active.
    pub fn pause(&self, raffle_id: i64) -> Result<Raffle, RaffleError> {
        self.store.with_tx(|tx| {
            let raffle = get_raffle(tx, raffle_id)?;
            if raffle.status != RaffleStatus::Active {
                return Err(RaffleError::InvalidTransition {
                    raffle_id,
                    from: raffle.status,
                    attempted: "pause",
                });
            }
            tx.execute(
                "UPDATE raffles SET status = 'paused' WHERE id = ?1",
                params![raffle_id],
            )?;
            info!(raffle_id, "raffle paused");
            get_raffle(tx, raffle_id)
        })
    }

    /// Reactivates a paused raffle, pausing any active sibling first.
    ///
    /// # Errors
    ///
    /// Returns [`RaffleError::InvalidTransition`] unless the raffle is
    /// paused.
    pub fn reactivate(&self, raffle_id: i64) -> Result<Raffle, RaffleError> {
        self.store.with_tx(|tx| {
            let raffle = get_raffle(tx, raffle_id)?;
            if raffle.status != RaffleStatus::Paused {
                return Err(RaffleError::InvalidTransition {
                    raffle_id,
                    from: raffle.status,
                    attempted: "reactivate",
                });
            }
            tx.execute(
                "UPDATE raffles SET status = 'paused' WHERE bot_id = ?1 AND status = 'active'",
                params![raffle.bot_id],
            )?;
            tx.execute(
                "UPDATE raffles SET status = 'active' WHERE id = ?1",
                params![raffle_id],
            )?;
            info!(raffle_id, "raffle reactivated");
            get_raffle(tx, raffle_id)
        })
    }

    /// Completes a raffle by recording the winning ticket.
    ///
    /// The winner's owner is resolved from the ticket table; the ticket
    /// must have been issued.
    ///
    /// # Errors
    ///
    /// Returns [`RaffleError::WinnerNotIssued`] if the ticket has no
    /// owner, or [`RaffleError::InvalidTransition`] from a terminal state.
    pub fn complete(
        &self,
        raffle_id: i64,
        winner_number: u32,
        now: i64,
    ) -> Result<Raffle, RaffleError> {
        self.store.with_tx(|tx| {
            let raffle = get_raffle(tx, raffle_id)?;
            if raffle.status.is_terminal() {
                return Err(RaffleError::InvalidTransition {
                    raffle_id,
                    from: raffle.status,
                    attempted: "complete",
                });
            }

            let owner = ticket::owner_of(tx, raffle_id, winner_number)?.ok_or(
                RaffleError::WinnerNotIssued {
                    raffle_id,
                    number: winner_number,
                },
            )?;

            tx.execute(
                "UPDATE raffles
                 SET status = 'completed', winner_number = ?1, winner_owner = ?2,
                     completed_at = ?3
                 WHERE id = ?4",
                params![winner_number, owner, now, raffle_id],
            )?;
            refresh_counters(tx, raffle_id)?;

            info!(raffle_id, winner_number, winner_owner = %owner, "raffle completed");
            get_raffle(tx, raffle_id)
        })
    }

    /// Cancels a raffle with a reason.
    ///
    /// # Errors
    ///
    /// Returns [`RaffleError::InvalidTransition`] from a terminal state.
    pub fn cancel(&self, raffle_id: i64, reason: &str, now: i64) -> Result<Raffle, RaffleError> {
        self.store.with_tx(|tx| {
            let raffle = get_raffle(tx, raffle_id)?;
            if raffle.status.is_terminal() {
                return Err(RaffleError::InvalidTransition {
                    raffle_id,
                    from: raffle.status,
                    attempted: "cancel",
                });
            }
            tx.execute(
                "UPDATE raffles
                 SET status = 'cancelled', cancel_reason = ?1, cancelled_at = ?2
                 WHERE id = ?3",
                params![reason, now, raffle_id],
            )?;
            info!(raffle_id, reason, "raffle cancelled");
            get_raffle(tx, raffle_id)
        })
    }

    /// Changes a raffle's capacity.
    ///
    /// Growing creates the missing numbers; shrinking deletes only free
    /// tickets above the new capacity and retains any already committed.
    ///
    /// # Errors
    ///
    /// Returns a ticket pool error or a database error.
    pub fn resize_capacity(&self, raffle_id: i64, new_total: u32) -> Result<Raffle, RaffleError> {
        self.store.with_tx(|tx| {
            let raffle = get_raffle(tx, raffle_id)?;

            if new_total > raffle.total_slots {
                ticket::initialize(tx, raffle_id, new_total)?;
            } else if new_total < raffle.total_slots {
                let outcome = ticket::shrink(tx, raffle_id, new_total)?;
                info!(
                    raffle_id,
                    new_total,
                    removed = outcome.removed,
                    retained = outcome.retained,
                    "raffle capacity shrunk"
                );
            }

            tx.execute(
                "UPDATE raffles SET total_slots = ?1 WHERE id = ?2",
                params![new_total, raffle_id],
            )?;
            refresh_counters(tx, raffle_id)?;
            get_raffle(tx, raffle_id)
        })
    }

    /// Derives current statistics without touching the cached columns.
    ///
    /// # Errors
    ///
    /// Returns [`RaffleError::NotFound`] if no such raffle exists.
    pub fn stats(&self, raffle_id: i64) -> Result<RaffleStats, RaffleError> {
        self.store.read(|conn| {
            get_raffle(conn, raffle_id)?;
            Ok(RaffleStats::compute(conn, raffle_id)?)
        })
    }

    /// Recomputes statistics and rewrites the cached counter columns.
    ///
    /// Intended for external reconciliation/diagnostic jobs; the engine
    /// already refreshes counters inside each of its own transactions.
    ///
    /// # Errors
    ///
    /// Returns [`RaffleError::NotFound`] if no such raffle exists.
    pub fn reconcile(&self, raffle_id: i64) -> Result<RaffleStats, RaffleError> {
        self.store.with_tx(|tx| {
            get_raffle(tx, raffle_id)?;
            Ok(refresh_counters(tx, raffle_id)?)
        })
    }
}
