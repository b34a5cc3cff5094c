//! Pool operations: allocate, release, and account for numbered tickets.

#![allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]

use std::fmt;
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::{Connection, OptionalExtension, ToSql, params};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::TicketError;

/// How [`claim`] orders the free tickets it selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllocationMode {
    /// Lowest free numbers first.
    Sequential,
    /// Arbitrary, non-deterministic order.
    Random,
}

impl AllocationMode {
    /// Returns the canonical string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Random => "random",
        }
    }
}

impl fmt::Display for AllocationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AllocationMode {
    type Err = TicketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sequential" => Ok(Self::Sequential),
            "random" => Ok(Self::Random),
            other => Err(TicketError::InvalidMode {
                value: other.to_string(),
            }),
        }
    }
}

impl ToSql for AllocationMode {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for AllocationMode {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: TicketError| FromSqlError::Other(Box::new(e)))
    }
}

/// Live counts for one raffle's pool, derived by querying current linkage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Total tickets that exist for the raffle.
    pub total: u32,
    /// Tickets with an owner stamped.
    pub issued: u32,
    /// Tickets with no owner and no order link.
    pub available: u32,
    /// Tickets linked to an order in `reserved` status.
    pub reserved: u32,
    /// Tickets linked to an order in `review` status.
    pub under_review: u32,
}

/// Result of a [`shrink`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShrinkOutcome {
    /// Free tickets above the new capacity that were deleted.
    pub removed: u32,
    /// Tickets above the new capacity that were retained because they are
    /// already linked to an owner or order.
    pub retained: u32,
}

/// Ensures tickets numbered `1..=total_slots` exist for the raffle.
///
/// Existing numbers are never reassigned or deleted; calling this again
/// with the same or a smaller capacity is a no-op. Returns the number of
/// tickets created.
///
/// # Errors
///
/// Returns [`TicketError::InvalidCapacity`] for a zero capacity, or a
/// database error.
pub fn initialize(conn: &Connection, raffle_id: i64, total_slots: u32) -> Result<u32, TicketError> {
    if total_slots == 0 {
        return Err(TicketError::InvalidCapacity { value: 0 });
    }

    let mut stmt = conn.prepare(
        "INSERT OR IGNORE INTO tickets (raffle_id, number) VALUES (?1, ?2)",
    )?;

    let mut created = 0u32;
    for number in 1..=total_slots {
        created += stmt.execute(params![raffle_id, number])? as u32;
    }

    debug!(raffle_id, total_slots, created, "ticket pool initialized");
    Ok(created)
}

/// Deletes free tickets numbered above `new_total`.
///
/// Tickets already linked to an owner or order are retained — capacity can
/// never be reduced below the count already committed. Returns how many
/// tickets were removed and how many were kept despite being above the new
/// capacity.
///
/// # Errors
///
/// Returns [`TicketError::InvalidCapacity`] for a zero capacity, or a
/// database error.
pub fn shrink(conn: &Connection, raffle_id: i64, new_total: u32) -> Result<ShrinkOutcome, TicketError> {
    if new_total == 0 {
        return Err(TicketError::InvalidCapacity { value: 0 });
    }

    let removed = conn.execute(
        "DELETE FROM tickets
         WHERE raffle_id = ?1 AND number > ?2
           AND owner_id IS NULL AND order_id IS NULL",
        params![raffle_id, new_total],
    )? as u32;

    let retained: i64 = conn.query_row(
        "SELECT COUNT(*) FROM tickets WHERE raffle_id = ?1 AND number > ?2",
        params![raffle_id, new_total],
        |row| row.get(0),
    )?;

    debug!(raffle_id, new_total, removed, retained, "ticket pool shrunk");
    Ok(ShrinkOutcome {
        removed,
        retained: retained as u32,
    })
}

/// Claims `quantity` free tickets and links them to `order_id`.
///
/// Selection order follows `mode`: ascending numbers for
/// [`AllocationMode::Sequential`], arbitrary for
/// [`AllocationMode::Random`]. Never partially allocates. Must run inside
/// the caller's write transaction; the transaction is what prevents two
/// concurrent claims from selecting the same ticket.
///
/// Returns the claimed ticket numbers in selection order.
///
/// # Errors
///
/// Returns [`TicketError::InsufficientCapacity`] if fewer than `quantity`
/// free tickets exist at lock time.
pub fn claim(
    conn: &Connection,
    raffle_id: i64,
    quantity: u32,
    order_id: i64,
    mode: AllocationMode,
) -> Result<Vec<u32>, TicketError> {
    let sql = match mode {
        AllocationMode::Sequential => {
            "SELECT number FROM tickets
             WHERE raffle_id = ?1 AND owner_id IS NULL AND order_id IS NULL
             ORDER BY number ASC LIMIT ?2"
        }
        AllocationMode::Random => {
            "SELECT number FROM tickets
             WHERE raffle_id = ?1 AND owner_id IS NULL AND order_id IS NULL
             ORDER BY RANDOM() LIMIT ?2"
        }
    };

    let mut stmt = conn.prepare(sql)?;
    let numbers = stmt
        .query_map(params![raffle_id, quantity], |row| row.get::<_, u32>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    if numbers.len() < quantity as usize {
        return Err(TicketError::InsufficientCapacity {
            raffle_id,
            requested: quantity,
            available: numbers.len() as u32,
        });
    }

    let mut update = conn.prepare(
        "UPDATE tickets SET order_id = ?1
         WHERE raffle_id = ?2 AND number = ?3
           AND owner_id IS NULL AND order_id IS NULL",
    )?;
    for number in &numbers {
        // Within one write transaction the selected rows cannot change
        // underneath us; a zero row count here means the snapshot lied.
        if update.execute(params![order_id, raffle_id, number])? != 1 {
            return Err(TicketError::InsufficientCapacity {
                raffle_id,
                requested: quantity,
                available: numbers.len() as u32 - 1,
            });
        }
    }

    debug!(raffle_id, order_id, quantity, ?numbers, "tickets claimed");
    Ok(numbers)
}

/// Clears order link and owner on all tickets tied to `order_id`.
///
/// Returns the count released.
///
/// # Errors
///
/// Returns a database error if the update fails.
pub fn release(conn: &Connection, order_id: i64) -> Result<u32, TicketError> {
    let released = conn.execute(
        "UPDATE tickets SET order_id = NULL, owner_id = NULL, issued_at = NULL
         WHERE order_id = ?1",
        params![order_id],
    )? as u32;

    debug!(order_id, released, "tickets released");
    Ok(released)
}

/// Releases the `count` highest-numbered tickets linked to `order_id`.
///
/// Used when an order is resized downward during review.
///
/// # Errors
///
/// Returns [`TicketError::TicketCountMismatch`] if fewer than `count`
/// linked tickets exist — the caller's quantity bookkeeping is wrong and
/// the transaction must roll back.
pub fn release_partial(conn: &Connection, order_id: i64, count: u32) -> Result<u32, TicketError> {
    let released = conn.execute(
        "UPDATE tickets SET order_id = NULL
         WHERE order_id = ?1 AND number IN (
             SELECT number FROM tickets WHERE order_id = ?1
             ORDER BY number DESC LIMIT ?2
         )",
        params![order_id, count],
    )? as u32;

    if released != count {
        return Err(TicketError::TicketCountMismatch {
            order_id,
            expected: count,
            actual: released,
        });
    }

    debug!(order_id, released, "tickets partially released");
    Ok(released)
}

/// Stamps owner and issued timestamp on all tickets linked to `order_id`
/// and clears the order link.
///
/// `expected` is the order's recorded quantity; if the linked-ticket count
/// differs the operation fails and the surrounding transaction must roll
/// back. Returns the issued ticket numbers in ascending order.
///
/// # Errors
///
/// Returns [`TicketError::TicketCountMismatch`] on a linked-count
/// mismatch, or a database error.
pub fn issue(
    conn: &Connection,
    order_id: i64,
    owner_id: &str,
    expected: u32,
    now: i64,
) -> Result<Vec<u32>, TicketError> {
    let mut stmt = conn.prepare(
        "SELECT number FROM tickets WHERE order_id = ?1 ORDER BY number ASC",
    )?;
    let numbers = stmt
        .query_map(params![order_id], |row| row.get::<_, u32>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    if numbers.len() != expected as usize {
        return Err(TicketError::TicketCountMismatch {
            order_id,
            expected,
            actual: numbers.len() as u32,
        });
    }

    let stamped = conn.execute(
        "UPDATE tickets SET owner_id = ?1, issued_at = ?2, order_id = NULL
         WHERE order_id = ?3",
        params![owner_id, now, order_id],
    )? as u32;

    if stamped != expected {
        return Err(TicketError::TicketCountMismatch {
            order_id,
            expected,
            actual: stamped,
        });
    }

    debug!(order_id, owner_id, ?numbers, "tickets issued");
    Ok(numbers)
}

/// Derives live pool counts for a raffle by querying current linkage.
///
/// Nothing here is cached; this is the authority the raffle's counter
/// columns are refreshed from.
///
/// # Errors
///
/// Returns a database error if any count query fails.
pub fn stats(conn: &Connection, raffle_id: i64) -> Result<PoolStats, TicketError> {
    let total: i64 = conn.query_row(
        "SELECT COUNT(*) FROM tickets WHERE raffle_id = ?1",
        params![raffle_id],
        |row| row.get(0),
    )?;

    let issued: i64 = conn.query_row(
        "SELECT COUNT(*) FROM tickets WHERE raffle_id = ?1 AND owner_id IS NOT NULL",
        params![raffle_id],
        |row| row.get(0),
    )?;

    let available: i64 = conn.query_row(
        "SELECT COUNT(*) FROM tickets
         WHERE raffle_id = ?1 AND owner_id IS NULL AND order_id IS NULL",
        params![raffle_id],
        |row| row.get(0),
    )?;

    let by_status = |status: &str| -> rusqlite::Result<i64> {
        conn.query_row(
            "SELECT COUNT(*) FROM tickets t
             JOIN orders o ON o.id = t.order_id
             WHERE t.raffle_id = ?1 AND o.status = ?2",
            params![raffle_id, status],
            |row| row.get(0),
        )
    };
    let reserved = by_status("reserved")?;
    let under_review = by_status("review")?;

    Ok(PoolStats {
        total: total as u32,
        issued: issued as u32,
        available: available as u32,
        reserved: reserved as u32,
        under_review: under_review as u32,
    })
}

/// Looks up the owner of one ticket, if issued.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub(crate) fn owner_of(
    conn: &Connection,
    raffle_id: i64,
    number: u32,
) -> Result<Option<String>, TicketError> {
    let owner: Option<Option<String>> = conn
        .query_row(
            "SELECT owner_id FROM tickets WHERE raffle_id = ?1 AND number = ?2",
            params![raffle_id, number],
            |row| row.get(0),
        )
        .optional()?;

    Ok(owner.flatten())
}
