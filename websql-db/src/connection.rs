//! Safe wrapper around a `SQLite` database connection.

use std::path::Path;

use rusqlite::OpenFlags;

use super::error::{DbError, DbResult};
use super::statement::{self, QueryRows};
use super::value::Value;

/// A `SQLite` database connection.
///
/// Closed when dropped, or explicitly through [`close`](Self::close) when the
/// caller wants to observe release errors. It is `Send` but not `Sync`: all
/// access must come from one thread at a time.
pub struct Connection {
    conn: rusqlite::Connection,
}

impl Connection {
    /// Opens (or creates) a database at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    pub fn open(path: &Path) -> DbResult<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
        let conn = rusqlite::Connection::open_with_flags(path, flags)?;
        Ok(Self { conn })
    }

    /// Opens an in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot allocate the database.
    pub fn open_in_memory() -> DbResult<Self> {
        Ok(Self {
            conn: rusqlite::Connection::open_in_memory()?,
        })
    }

    /// Closes the connection, reporting any release failure.
    ///
    /// # Errors
    ///
    /// Returns the engine error if the handle could not be released cleanly.
    /// The handle is dropped either way.
    pub fn close(self) -> DbResult<()> {
        self.conn.close().map_err(|(_, err)| DbError::from(err))
    }

    /// Executes one or more SQL statements separated by semicolons.
    ///
    /// No result rows are returned.
    ///
    /// # Errors
    ///
    /// Returns the first engine error encountered.
    pub fn execute_batch(&self, sql: &str) -> DbResult<()> {
        Ok(self.conn.execute_batch(sql)?)
    }

    /// Runs a single statement with positional `args`, collecting every row
    /// it yields.
    ///
    /// # Errors
    ///
    /// Returns an error if the statement fails to prepare, bind or step.
    pub fn query(&self, sql: &str, args: &[Value]) -> DbResult<QueryRows> {
        statement::run(&self.conn, sql, args)
    }

    // ── Schema version ──────────────────────────────────────────────────

    /// Reads the schema-version counter (`PRAGMA user_version`).
    ///
    /// # Errors
    ///
    /// Returns an error if the pragma cannot be read.
    pub fn user_version(&self) -> DbResult<i64> {
        Ok(self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?)
    }

    /// Writes the schema-version counter. Inside an open transaction the
    /// write only becomes durable on commit.
    ///
    /// # Errors
    ///
    /// Returns an error if the pragma cannot be written.
    pub fn set_user_version(&self, version: i64) -> DbResult<()> {
        Ok(self.conn.pragma_update(None, "user_version", version)?)
    }

    // ── Transactions ────────────────────────────────────────────────────

    /// Opens a deferred transaction.
    ///
    /// Bridge transactions span several calls (one per batch plus a terminal
    /// boundary), so there is no RAII guard: the engine's own in-transaction
    /// flag is the source of truth.
    ///
    /// # Errors
    ///
    /// Returns an error if `BEGIN` fails (e.g. a transaction is already open).
    pub fn begin(&self) -> DbResult<()> {
        self.execute_batch("BEGIN DEFERRED")
    }

    /// Commits the open transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if `COMMIT` fails.
    pub fn commit(&self) -> DbResult<()> {
        self.execute_batch("COMMIT")
    }

    /// Rolls back the open transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if `ROLLBACK` fails.
    pub fn rollback(&self) -> DbResult<()> {
        self.execute_batch("ROLLBACK")
    }

    /// Returns `true` while the engine is inside an explicit transaction.
    #[must_use]
    pub fn is_in_transaction(&self) -> bool {
        !self.conn.is_autocommit()
    }

    // ── Counters ────────────────────────────────────────────────────────

    /// Returns the rowid of the most recent successful INSERT.
    #[must_use]
    pub fn last_insert_rowid(&self) -> i64 {
        self.conn.last_insert_rowid()
    }

    /// Returns the number of rows changed by the most recent statement.
    #[must_use]
    pub fn changes(&self) -> u64 {
        self.conn.changes()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("path", &self.conn.path())
            .field("in_transaction", &self.is_in_transaction())
            .finish()
    }
}
