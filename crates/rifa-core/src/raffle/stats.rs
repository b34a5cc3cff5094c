//! Derived raffle statistics.

#![allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]

use rusqlite::{Connection, params};
use serde::Serialize;

/// Statistics derived from the current ticket/order snapshot.
///
/// This is a pure function over source tables, callable both from the
/// engine (inside its transactions) and from an external reconciliation or
/// diagnostic job. The counter columns on the raffle row are refreshed
/// from this and never trusted on their own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RaffleStats {
    /// Tickets with an owner stamped.
    pub tickets_issued: u32,
    /// Tickets currently linked to a live (reserved/review) order.
    pub tickets_reserved: u32,
    /// Tickets with no owner and no order link.
    pub tickets_available: u32,
    /// Distinct owners across issued tickets.
    pub total_participants: u32,
    /// Sum of `amount_cents` across sold orders.
    pub total_revenue_cents: i64,
    /// Accepted receipt fingerprints recorded for the raffle.
    pub receipts_count: u32,
}

impl RaffleStats {
    /// Computes the statistics for `raffle_id` from the source tables.
    ///
    /// # Errors
    ///
    /// Returns a database error if any count query fails.
    pub fn compute(conn: &Connection, raffle_id: i64) -> rusqlite::Result<Self> {
        let tickets_issued: i64 = conn.query_row(
            "SELECT COUNT(*) FROM tickets WHERE raffle_id = ?1 AND owner_id IS NOT NULL",
            params![raffle_id],
            |row| row.get(0),
        )?;

        let tickets_reserved: i64 = conn.query_row(
            "SELECT COUNT(*) FROM tickets WHERE raffle_id = ?1 AND order_id IS NOT NULL",
            params![raffle_id],
            |row| row.get(0),
        )?;

        let tickets_available: i64 = conn.query_row(
            "SELECT COUNT(*) FROM tickets
             WHERE raffle_id = ?1 AND owner_id IS NULL AND order_id IS NULL",
            params![raffle_id],
            |row| row.get(0),
        )?;

        let total_participants: i64 = conn.query_row(
            "SELECT COUNT(DISTINCT owner_id) FROM tickets
             WHERE raffle_id = ?1 AND owner_id IS NOT NULL",
            params![raffle_id],
            |row| row.get(0),
        )?;

        let total_revenue_cents: i64 = conn.query_row(
            "SELECT COALESCE(SUM(amount_cents), 0) FROM orders
             WHERE raffle_id = ?1 AND status = 'sold'",
            params![raffle_id],
            |row| row.get(0),
        )?;

        let receipts_count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM receipt_fingerprints
             WHERE raffle_id = ?1 AND status = 'accepted'",
            params![raffle_id],
            |row| row.get(0),
        )?;

        Ok(Self {
            tickets_issued: tickets_issued as u32,
            tickets_reserved: tickets_reserved as u32,
            tickets_available: tickets_available as u32,
            total_participants: total_participants as u32,
            total_revenue_cents,
            receipts_count: receipts_count as u32,
        })
    }
}

/// Recomputes the statistics and writes them onto the raffle row.
///
/// Called inside every mutating engine transaction so the cached columns
/// are only ever a read-through copy of the derived values.
pub(crate) fn refresh_counters(conn: &Connection, raffle_id: i64) -> rusqlite::Result<RaffleStats> {
    let stats = RaffleStats::compute(conn, raffle_id)?;
    conn.execute(
        "UPDATE raffles
         SET tickets_issued = ?1, total_participants = ?2,
             total_revenue_cents = ?3, receipts_count = ?4
         WHERE id = ?5",
        params![
            stats.tickets_issued,
            stats.total_participants,
            stats.total_revenue_cents,
            stats.receipts_count,
            raffle_id,
        ],
    )?;
    Ok(stats)
}
