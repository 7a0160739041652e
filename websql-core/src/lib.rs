#![deny(clippy::all, clippy::pedantic, clippy::nursery)]
//! WebSQL-style transactions over a single-flight bridge to an embedded
//! SQLite host.
//!
//! The [`client`] half queues transactions per database, runs each user
//! action once to collect statements, and sends them in batches through the
//! [`channel`] to the [`native`] half, which executes them inside one engine
//! transaction and commits or rolls back at the end.

mod error;
pub use error::*;

pub mod channel;
pub mod client;
pub mod logger;
pub mod native;
pub mod protocol;
pub mod version;

mod paths;
pub use paths::StoragePaths;

pub use client::{
    ActionResult, Bridge, Completion, Database, ErrorDisposition, ResultSet, SqlTransaction,
    TransactionRequest,
};
pub use websql_db::{params, Row, Value};
