//! `SQLite`-backed store for the reservation engine.
//!
//! This module owns the single database connection and the transaction
//! discipline every other module builds on. The schema lives in
//! `schema.sql` and is applied on open.
//!
//! # Locking contract
//!
//! All mutating engine operations run inside one IMMEDIATE (write)
//! transaction obtained through [`Store::with_tx`]. `SQLite` serializes
//! writers, so the first transaction to start wins and a losing concurrent
//! claim re-reads availability after the winner commits. This is the
//! engine's substitute for per-row locks: either the full set of row
//! changes (order + tickets + raffle counters) commits, or all roll back.

// SQLite returns i64 for row IDs and counts, but they're always
// non-negative in this schema. Mutex poisoning indicates a panic in
// another thread, which is unrecoverable.
#![allow(
    clippy::cast_sign_loss,
    clippy::cast_possible_truncation,
    clippy::missing_panics_doc
)]

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::{Connection, OpenFlags, Transaction, TransactionBehavior};
use thiserror::Error;

/// Schema SQL embedded at compile time.
const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Errors raised by the store itself (open/initialize).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// Database error from `SQLite`.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O error during database operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The shared `SQLite` store.
///
/// One connection guarded by a mutex; WAL mode is enabled so external
/// read-only connections can observe the database while writes are in
/// progress. Engine components hold the store behind an [`Arc`].
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Opens or creates a store at the specified path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or the schema
    /// cannot be applied.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open_with_flags(
            path.as_ref(),
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        Self::initialize_connection(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Creates an in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be applied.
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_connection(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Initialize the connection with schema and pragmas.
    fn initialize_connection(conn: &Connection) -> Result<(), StoreError> {
        // Schema includes PRAGMA statements.
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    /// Runs `f` inside an IMMEDIATE (write) transaction.
    ///
    /// The write lock is taken up front, so concurrent `with_tx` calls are
    /// serialized; this is the locking contract every mutating engine
    /// operation relies on. If `f` returns an error the transaction is
    /// rolled back and no partial state is left behind.
    ///
    /// # Errors
    ///
    /// Propagates the closure's error, or the underlying database error
    /// from beginning/committing the transaction.
    pub fn with_tx<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, E>,
        E: From<rusqlite::Error>,
    {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Runs `f` with the connection for read-only access.
    ///
    /// No transaction is opened; callers must not mutate.
    ///
    /// # Errors
    ///
    /// Propagates the closure's error.
    pub fn read<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Connection) -> Result<T, E>,
    {
        let conn = self.conn.lock().unwrap();
        f(&conn)
    }

    /// Verifies that WAL mode is enabled.
    ///
    /// # Errors
    ///
    /// Returns an error if the journal mode cannot be queried.
    pub fn verify_wal_mode(&self) -> Result<bool, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mode: String = conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))?;
        Ok(mode.eq_ignore_ascii_case("wal"))
    }
}
