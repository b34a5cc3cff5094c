//! The order state machine and its persistence.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::{Connection, OptionalExtension, Row, ToSql, params};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::error::OrderError;
use crate::notify::{Notifier, NotifyError};
use crate::raffle::{Raffle, RaffleStatus, find_raffle, refresh_counters};
use crate::store::Store;
use crate::ticket;

/// Lifecycle state of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Tickets are held; waiting for a receipt until the deadline.
    Reserved,
    /// A receipt arrived; waiting for a human decision. No timeout.
    Review,
    /// Approved; tickets were issued to the requester. Terminal.
    Sold,
    /// Rejected by a reviewer; tickets were released. Terminal.
    Rejected,
    /// Deadline elapsed with no receipt; tickets were released. Terminal.
    Expired,
}

impl OrderStatus {
    /// Returns the canonical string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reserved => "reserved",
            Self::Review => "review",
            Self::Sold => "sold",
            Self::Rejected => "rejected",
            Self::Expired => "expired",
        }
    }

    /// Returns `true` for states that never transition again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Sold | Self::Rejected | Self::Expired)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reserved" => Ok(Self::Reserved),
            "review" => Ok(Self::Review),
            "sold" => Ok(Self::Sold),
            "rejected" => Ok(Self::Rejected),
            "expired" => Ok(Self::Expired),
            other => Err(OrderError::InvalidStatus {
                value: other.to_string(),
            }),
        }
    }
}

impl ToSql for OrderStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for OrderStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: OrderError| FromSqlError::Other(Box::new(e)))
    }
}

/// A reservation of N tickets pending payment proof and review.
///
/// Orders are never deleted; terminal orders are retained for audit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    /// Surrogate ID.
    pub id: i64,
    /// The raffle reserved against.
    pub raffle_id: i64,
    /// The requester holding the reservation.
    pub requester_id: String,
    /// Lifecycle state.
    pub status: OrderStatus,
    /// Reservation deadline, unix seconds. Present only while `Reserved`.
    pub deadline: Option<i64>,
    /// How many tickets the order reserves.
    pub quantity: u32,
    /// Agreed amount, in cents.
    pub amount_cents: i64,
    /// Ticket numbers recorded at approval; empty before `Sold`.
    pub ticket_numbers: Vec<u32>,
    /// The reviewer who approved or rejected.
    pub reviewer_id: Option<String>,
    /// When the review decision was made, unix seconds.
    pub reviewed_at: Option<i64>,
    /// Reason recorded on rejection.
    pub reject_reason: Option<String>,
    /// Creation time, unix seconds.
    pub created_at: i64,
}

const ORDER_COLUMNS: &str = "id, raffle_id, requester_id, status, deadline, quantity, \
     amount_cents, ticket_numbers, reviewer_id, reviewed_at, reject_reason, created_at";

fn row_to_order(row: &Row<'_>) -> rusqlite::Result<Order> {
    let raw_numbers: Option<String> = row.get(7)?;
    let ticket_numbers = match raw_numbers {
        Some(json) => serde_json::from_str(&json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
        })?,
        None => Vec::new(),
    };

    Ok(Order {
        id: row.get(0)?,
        raffle_id: row.get(1)?,
        requester_id: row.get(2)?,
        status: row.get(3)?,
        deadline: row.get(4)?,
        quantity: row.get(5)?,
        amount_cents: row.get(6)?,
        ticket_numbers,
        reviewer_id: row.get(8)?,
        reviewed_at: row.get(9)?,
        reject_reason: row.get(10)?,
        created_at: row.get(11)?,
    })
}

fn get_order(conn: &Connection, order_id: i64) -> Result<Order, OrderError> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1");
    conn.query_row(&sql, params![order_id], row_to_order)
        .optional()?
        .ok_or(OrderError::NotFound { order_id })
}

fn load_active_raffle(conn: &Connection, raffle_id: i64) -> Result<Raffle, OrderError> {
    let raffle =
        find_raffle(conn, raffle_id)?.ok_or(OrderError::RaffleNotFound { raffle_id })?;
    if raffle.status != RaffleStatus::Active {
        return Err(OrderError::RaffleNotActive {
            raffle_id,
            status: raffle.status,
        });
    }
    Ok(raffle)
}

#[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
fn free_capacity(conn: &Connection, raffle_id: i64) -> rusqlite::Result<u32> {
    let free: i64 = conn.query_row(
        "SELECT COUNT(*) FROM tickets
         WHERE raffle_id = ?1 AND owner_id IS NULL AND order_id IS NULL",
        params![raffle_id],
        |row| row.get(0),
    )?;
    Ok(free as u32)
}

/// Drives orders through the reservation state machine.
///
/// Every mutating method runs one write transaction: order row, ticket
/// rows, and raffle counters commit together or not at all. Notifications
/// fire only after the commit and never affect the outcome.
#[derive(Clone)]
pub struct OrderEngine {
    store: Arc<Store>,
    notifier: Arc<dyn Notifier>,
}

impl OrderEngine {
    /// Creates an engine over the shared store and notification seam.
    #[must_use]
    pub fn new(store: Arc<Store>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    /// Reserves `quantity` tickets on the raffle and starts the deadline.
    ///
    /// The amount is `quantity × unit_price`. The capacity check and the
    /// claim happen in one write transaction, so two simultaneous requests
    /// cannot both succeed when only one has room: the loser observes
    /// fewer free tickets and fails with
    /// [`OrderError::CapacityExceeded`].
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::RaffleNotActive`] if the raffle is not
    /// selling, [`OrderError::CapacityExceeded`] if fewer than `quantity`
    /// tickets are free, or [`OrderError::InvalidQuantity`] for zero.
    pub fn create(
        &self,
        raffle_id: i64,
        requester_id: &str,
        quantity: u32,
        ttl_secs: i64,
        now: i64,
    ) -> Result<Order, OrderError> {
        if quantity == 0 {
            return Err(OrderError::InvalidQuantity { value: 0 });
        }

        let order = self.store.with_tx(|tx| {
            let raffle = load_active_raffle(tx, raffle_id)?;

            let available = free_capacity(tx, raffle_id)?;
            if available < quantity {
                return Err(OrderError::CapacityExceeded {
                    raffle_id,
                    requested: quantity,
                    available,
                });
            }

            let deadline = now + ttl_secs;
            let amount_cents = i64::from(quantity) * raffle.unit_price_cents;
            tx.execute(
                "INSERT INTO orders
                 (raffle_id, requester_id, status, deadline, quantity, amount_cents, created_at)
                 VALUES (?1, ?2, 'reserved', ?3, ?4, ?5, ?6)",
                params![raffle_id, requester_id, deadline, quantity, amount_cents, now],
            )?;
            let order_id = tx.last_insert_rowid();

            ticket::claim(tx, raffle_id, quantity, order_id, raffle.mode)?;
            refresh_counters(tx, raffle_id)?;

            info!(order_id, raffle_id, requester_id, quantity, deadline, "order reserved");
            get_order(tx, order_id)
        })?;

        if let Some(deadline) = order.deadline {
            self.report(
                order.id,
                self.notifier.reservation_created(
                    &order.requester_id,
                    order.id,
                    order.quantity,
                    deadline,
                ),
            );
        }
        Ok(order)
    }

    /// Moves a reserved order to review when its receipt arrives.
    ///
    /// The deadline is cleared: the review step has no automatic timeout,
    /// only human action resolves it.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::InvalidTransition`] unless the order is
    /// `Reserved`.
    pub fn attach_receipt(&self, order_id: i64) -> Result<Order, OrderError> {
        let order = self.store.with_tx(|tx| {
            let order = get_order(tx, order_id)?;
            if order.status != OrderStatus::Reserved {
                return Err(OrderError::InvalidTransition {
                    order_id,
                    from: order.status,
                    attempted: "attach a receipt to",
                });
            }
            tx.execute(
                "UPDATE orders SET status = 'review', deadline = NULL WHERE id = ?1",
                params![order_id],
            )?;
            info!(order_id, "order moved to review");
            get_order(tx, order_id)
        })?;

        self.report(
            order.id,
            self.notifier
                .receipt_under_review(&order.requester_id, order.id),
        );
        Ok(order)
    }

    /// Approves an order under review: issues its tickets and marks it sold.
    ///
    /// `final_ticket_numbers`, if supplied, overrides the recorded list on
    /// the order (administrative correction) without changing which
    /// physical ticket rows were stamped.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::InvalidTransition`] unless the order is in
    /// `Review`; a [`TicketError::TicketCountMismatch`]
    /// (via [`OrderError::Ticket`]) aborts the whole transaction.
    ///
    /// [`TicketError::TicketCountMismatch`]: crate::ticket::TicketError::TicketCountMismatch
    pub fn approve(
        &self,
        order_id: i64,
        reviewer_id: &str,
        final_ticket_numbers: Option<Vec<u32>>,
        now: i64,
    ) -> Result<Order, OrderError> {
        let order = self.store.with_tx(|tx| {
            let order = get_order(tx, order_id)?;
            if order.status != OrderStatus::Review {
                return Err(OrderError::InvalidTransition {
                    order_id,
                    from: order.status,
                    attempted: "approve",
                });
            }

            let issued =
                ticket::issue(tx, order_id, &order.requester_id, order.quantity, now)?;
            let recorded = final_ticket_numbers.unwrap_or(issued);
            let numbers_json = serde_json::to_string(&recorded)
                .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;

            tx.execute(
                "UPDATE orders
                 SET status = 'sold', ticket_numbers = ?1, reviewer_id = ?2, reviewed_at = ?3
                 WHERE id = ?4",
                params![numbers_json, reviewer_id, now, order_id],
            )?;
            refresh_counters(tx, order.raffle_id)?;

            info!(order_id, reviewer_id, ?recorded, "order approved");
            get_order(tx, order_id)
        })?;

        self.report(
            order.id,
            self.notifier
                .order_approved(&order.requester_id, order.id, &order.ticket_numbers),
        );
        Ok(order)
    }

    /// Rejects an order under review and releases its tickets.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::InvalidTransition`] unless the order is in
    /// `Review`.
    pub fn reject(
        &self,
        order_id: i64,
        reviewer_id: &str,
        reason: &str,
        now: i64,
    ) -> Result<Order, OrderError> {
        let order = self.store.with_tx(|tx| {
            let order = get_order(tx, order_id)?;
            if order.status != OrderStatus::Review {
                return Err(OrderError::InvalidTransition {
                    order_id,
                    from: order.status,
                    attempted: "reject",
                });
            }

            ticket::release(tx, order_id)?;
            tx.execute(
                "UPDATE orders
                 SET status = 'rejected', reviewer_id = ?1, reviewed_at = ?2, reject_reason = ?3
                 WHERE id = ?4",
                params![reviewer_id, now, reason, order_id],
            )?;
            refresh_counters(tx, order.raffle_id)?;

            info!(order_id, reviewer_id, reason, "order rejected");
            get_order(tx, order_id)
        })?;

        if let Some(reason) = &order.reject_reason {
            self.report(
                order.id,
                self.notifier
                    .order_rejected(&order.requester_id, order.id, reason),
            );
        }
        Ok(order)
    }

    /// Expires a reserved order whose deadline has passed.
    ///
    /// Calling this on a non-reserved or not-yet-overdue order is a no-op,
    /// not an error — safe to call speculatively, and idempotent. Returns
    /// `true` if the order was reclaimed by this call.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::NotFound`] for an unknown order, or a
    /// database error.
    pub fn expire_if_overdue(&self, order_id: i64, now: i64) -> Result<bool, OrderError> {
        let expired = self.store.with_tx(|tx| -> Result<Option<String>, OrderError> {
            let order = get_order(tx, order_id)?;
            if order.status != OrderStatus::Reserved {
                return Ok(None);
            }
            match order.deadline {
                Some(deadline) if deadline < now => {}
                _ => return Ok(None),
            }

            ticket::release(tx, order_id)?;
            tx.execute(
                "UPDATE orders SET status = 'expired', deadline = NULL WHERE id = ?1",
                params![order_id],
            )?;
            refresh_counters(tx, order.raffle_id)?;

            info!(order_id, raffle_id = order.raffle_id, "order expired, tickets reclaimed");
            Ok(Some(order.requester_id))
        })?;

        match expired {
            Some(requester_id) => {
                self.report(order_id, self.notifier.order_expired(&requester_id, order_id));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Changes the quantity and agreed amount of an order under review.
    ///
    /// Increasing claims the delta from the pool atomically; on
    /// [`InsufficientCapacity`](crate::ticket::TicketError::InsufficientCapacity)
    /// the order is left untouched. Decreasing releases the delta back.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::InvalidTransition`] unless the order is in
    /// `Review`, or [`OrderError::InvalidQuantity`] for zero.
    pub fn resize(
        &self,
        order_id: i64,
        new_quantity: u32,
        new_amount_cents: i64,
    ) -> Result<Order, OrderError> {
        if new_quantity == 0 {
            return Err(OrderError::InvalidQuantity { value: 0 });
        }

        self.store.with_tx(|tx| {
            let order = get_order(tx, order_id)?;
            if order.status != OrderStatus::Review {
                return Err(OrderError::InvalidTransition {
                    order_id,
                    from: order.status,
                    attempted: "resize",
                });
            }

            if new_quantity > order.quantity {
                let raffle = find_raffle(tx, order.raffle_id)?
                    .ok_or(OrderError::RaffleNotFound { raffle_id: order.raffle_id })?;
                ticket::claim(
                    tx,
                    order.raffle_id,
                    new_quantity - order.quantity,
                    order_id,
                    raffle.mode,
                )?;
            } else if new_quantity < order.quantity {
                ticket::release_partial(tx, order_id, order.quantity - new_quantity)?;
            }

            tx.execute(
                "UPDATE orders SET quantity = ?1, amount_cents = ?2 WHERE id = ?3",
                params![new_quantity, new_amount_cents, order_id],
            )?;
            refresh_counters(tx, order.raffle_id)?;

            info!(order_id, new_quantity, new_amount_cents, "order resized");
            get_order(tx, order_id)
        })
    }

    /// Fetches an order by ID.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::NotFound`] if no such order exists.
    pub fn get(&self, order_id: i64) -> Result<Order, OrderError> {
        self.store.read(|conn| get_order(conn, order_id))
    }

    /// Lists IDs of reserved orders whose deadline has passed.
    ///
    /// # Errors
    ///
    /// Returns a database error if the query fails.
    pub fn list_overdue(&self, now: i64) -> Result<Vec<i64>, OrderError> {
        self.store.read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id FROM orders
                 WHERE status = 'reserved' AND deadline < ?1
                 ORDER BY id ASC",
            )?;
            let ids = stmt
                .query_map(params![now], |row| row.get(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ids)
        })
    }

    /// Logs a failed notification; delivery never affects engine state.
    fn report(&self, order_id: i64, result: Result<(), NotifyError>) {
        if let Err(err) = result {
            warn!(order_id, %err, "notification delivery failed");
        }
    }
}
