//! Minimal safe `SQLite` wrapper for the WebSQL bridge.
//!
//! This crate provides the small slice of the engine the bridge relies on:
//!
//! * running a single statement with positional arguments and collecting the
//!   produced rows together with their column names,
//! * reading and writing the schema-version counter (`PRAGMA user_version`),
//! * explicit `BEGIN` / `COMMIT` / `ROLLBACK` that may span several calls,
//!   plus the engine's own view of whether a transaction is open,
//! * rows-affected and last-insert-id counters.
//!
//! The engine itself is `SQLite`, compiled in through `rusqlite`'s bundled
//! build. Consumer code uses only the types defined here.

mod connection;
pub mod error;
mod statement;
pub mod value;

pub use connection::Connection;
pub use error::{DbError, DbErrorCode, DbResult};
pub use statement::{QueryRows, Row};
pub use value::Value;
