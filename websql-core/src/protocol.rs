//! Request and response messages exchanged between the client and native
//! halves of the bridge.
//!
//! Field names serialise in camelCase, matching what a script host would send
//! over a JSON transport.

use serde::{Deserialize, Serialize};
use websql_db::{Row, Value};

/// Arguments of `open`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenArgs {
    /// Database name.
    pub name: String,
    /// Requested schema version (×100); `None` means "no check".
    pub version: Option<i64>,
}

/// Reply to a successful `open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenResult {
    /// Live schema version (×100).
    pub version: i64,
}

/// Arguments of `close`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseArgs {
    /// Database name.
    pub name: String,
}

/// One statement of a batch as sent over the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementArgs {
    /// SQL text.
    pub sql: String,
    /// Positional arguments.
    #[serde(default)]
    pub args: Vec<Value>,
}

impl StatementArgs {
    /// Creates a statement with the given SQL and arguments.
    #[must_use]
    pub fn new(sql: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            args,
        }
    }
}

/// Arguments of `runBatch`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(clippy::struct_excessive_bools)]
pub struct RunBatchArgs {
    /// Database name.
    pub name: String,
    /// Owning transaction id, for diagnostics.
    pub transaction_id: String,
    /// `true` only for the first batch of a transaction; opens the engine
    /// transaction.
    pub is_first_batch: bool,
    /// Schema version that must be live before the first batch runs.
    pub required_version: Option<i64>,
    /// Leave the transaction open if the last statement fails.
    pub may_recover_from_error: bool,
    /// Do not commit after this batch.
    pub may_not_be_last_batch: bool,
    /// Statements to run, in order.
    pub statements: Vec<StatementArgs>,
}

/// Result set captured for the final statement of a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeResultSet {
    /// Rows produced by the statement.
    pub rows: Vec<Row>,
    /// Rows changed by the statement.
    pub rows_affected: u64,
    /// Rowid of the most recent insert on the connection.
    pub insert_id: i64,
}

/// Reply to a successful `runBatch`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    /// Result of the batch's final statement.
    pub result_set: NativeResultSet,
    /// Whether the engine transaction is still open.
    pub is_in_transaction: bool,
}

/// Arguments of `forceEndTransaction`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndTransactionArgs {
    /// Database name.
    pub name: String,
    /// Owning transaction id, for diagnostics.
    pub transaction_id: String,
    /// Commit if `true`, roll back otherwise.
    pub is_commit: bool,
    /// Schema version to write as part of the commit.
    pub new_version: Option<i64>,
}

/// A request to the native side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "args", rename_all = "camelCase")]
pub enum Request {
    /// Open (or create) a database.
    Open(OpenArgs),
    /// Close a database.
    Close(CloseArgs),
    /// Run one batch of statements.
    RunBatch(RunBatchArgs),
    /// Commit or roll back the open transaction.
    ForceEndTransaction(EndTransactionArgs),
}

impl Request {
    /// Name of the database the request targets.
    #[must_use]
    pub fn database_name(&self) -> &str {
        match self {
            Self::Open(args) => &args.name,
            Self::Close(args) => &args.name,
            Self::RunBatch(args) => &args.name,
            Self::ForceEndTransaction(args) => &args.name,
        }
    }

    /// Wire name of the request.
    #[must_use]
    pub const fn method(&self) -> &'static str {
        match self {
            Self::Open(_) => "open",
            Self::Close(_) => "close",
            Self::RunBatch(_) => "runBatch",
            Self::ForceEndTransaction(_) => "forceEndTransaction",
        }
    }
}

/// A successful reply from the native side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "result", rename_all = "camelCase")]
pub enum Response {
    /// Reply to [`Request::Open`].
    Open(OpenResult),
    /// Reply to [`Request::Close`].
    Close,
    /// Reply to [`Request::RunBatch`].
    RunBatch(BatchResult),
    /// Reply to [`Request::ForceEndTransaction`].
    ForceEndTransaction,
}
