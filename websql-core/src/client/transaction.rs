//! Caller-facing transaction types: the request builder, the `execute_sql`
//! capability handed to actions and callbacks, and result sets.

use std::collections::VecDeque;
use std::error::Error;
use std::fmt;

use tokio::sync::oneshot;
use websql_db::{Row, Value};

use crate::error::{BridgeError, SqlError, TransactionError};
use crate::protocol::{NativeResultSet, StatementArgs};

/// What a transaction action returns. An `Err` fails the transaction
/// without contacting the native side.
pub type ActionResult = Result<(), Box<dyn Error + Send + Sync>>;

pub(crate) type Action = Box<dyn FnOnce(&mut SqlTransaction) -> ActionResult + Send>;
pub(crate) type DataCallback = Box<dyn FnOnce(&mut SqlTransaction, &ResultSet) + Send>;
pub(crate) type StatementErrorCallback =
    Box<dyn FnOnce(&mut SqlTransaction, &SqlError) -> ErrorDisposition + Send>;
pub(crate) type SuccessCallback = Box<dyn FnOnce() + Send>;
pub(crate) type FailureCallback = Box<dyn FnOnce(&TransactionError) + Send>;

/// Decision returned by a statement error callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorDisposition {
    /// Treat the failure as a success with no rows and keep going.
    Recovered,
    /// End the transaction with a rollback.
    Propagate,
}

#[derive(Default)]
pub(crate) struct StatementCallbacks {
    pub(crate) on_data: Option<DataCallback>,
    pub(crate) on_error: Option<StatementErrorCallback>,
}

impl StatementCallbacks {
    /// `true` if either callback is set; such a statement ends its batch.
    pub(crate) const fn is_set(&self) -> bool {
        self.on_data.is_some() || self.on_error.is_some()
    }
}

pub(crate) struct Statement {
    args: StatementArgs,
    callbacks: StatementCallbacks,
}

impl Statement {
    pub(crate) fn into_parts(self) -> (StatementArgs, StatementCallbacks) {
        (self.args, self.callbacks)
    }
}

/// Capability passed to a transaction's action and statement callbacks.
///
/// Its only operation is [`SqlTransaction::execute_sql`], which queues a
/// statement; nothing runs until the action or callback returns.
pub struct SqlTransaction {
    pub(crate) statements: VecDeque<Statement>,
}

impl fmt::Debug for SqlTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlTransaction")
            .field("queued", &self.statements.len())
            .finish()
    }
}

impl SqlTransaction {
    pub(crate) const fn new() -> Self {
        Self {
            statements: VecDeque::new(),
        }
    }

    /// Queues `sql` with positional `args`.
    ///
    /// Attach callbacks through the returned [`QueuedStatement`]:
    ///
    /// ```rust,ignore
    /// tx.execute_sql("SELECT * FROM notes WHERE id = ?", params![id])
    ///     .on_data(|_tx, rs| println!("{} rows", rs.rows.len()));
    /// ```
    pub fn execute_sql(&mut self, sql: impl Into<String>, args: Vec<Value>) -> QueuedStatement<'_> {
        let idx = self.statements.len();
        self.statements.push_back(Statement {
            args: StatementArgs::new(sql, args),
            callbacks: StatementCallbacks::default(),
        });
        QueuedStatement {
            statement: &mut self.statements[idx],
        }
    }
}

/// A statement that has just been queued; used to attach callbacks.
pub struct QueuedStatement<'a> {
    statement: &'a mut Statement,
}

impl QueuedStatement<'_> {
    /// Called with the statement's result set if it succeeds.
    pub fn on_data(
        &mut self,
        callback: impl FnOnce(&mut SqlTransaction, &ResultSet) + Send + 'static,
    ) -> &mut Self {
        self.statement.callbacks.on_data = Some(Box::new(callback));
        self
    }

    /// Called if the batch ending at this statement fails, whether the
    /// statement itself failed or the batch was refused before running (a
    /// version mismatch, for one). Returning [`ErrorDisposition::Recovered`]
    /// keeps the transaction going.
    pub fn on_error(
        &mut self,
        callback: impl FnOnce(&mut SqlTransaction, &SqlError) -> ErrorDisposition + Send + 'static,
    ) -> &mut Self {
        self.statement.callbacks.on_error = Some(Box::new(callback));
        self
    }
}

/// A transaction waiting to be enqueued on a
/// [`Database`](crate::client::Database).
pub struct TransactionRequest {
    pub(crate) action: Action,
    pub(crate) from_version: Option<i64>,
    pub(crate) to_version: Option<i64>,
    pub(crate) on_success: Option<SuccessCallback>,
    pub(crate) on_error: Option<FailureCallback>,
}

impl fmt::Debug for TransactionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionRequest")
            .field("from_version", &self.from_version)
            .field("to_version", &self.to_version)
            .finish_non_exhaustive()
    }
}

impl TransactionRequest {
    /// Creates a request around `action`, which is run exactly once to queue
    /// the transaction's statements.
    #[must_use]
    pub fn new(
        action: impl FnOnce(&mut SqlTransaction) -> ActionResult + Send + 'static,
    ) -> Self {
        Self {
            action: Box::new(action),
            from_version: None,
            to_version: None,
            on_success: None,
            on_error: None,
        }
    }

    /// Called once after a successful commit.
    #[must_use]
    pub fn on_success(mut self, callback: impl FnOnce() + Send + 'static) -> Self {
        self.on_success = Some(Box::new(callback));
        self
    }

    /// Called once if the transaction fails.
    #[must_use]
    pub fn on_error(mut self, callback: impl FnOnce(&TransactionError) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(callback));
        self
    }

    pub(crate) const fn with_versions(mut self, from: Option<i64>, to: Option<i64>) -> Self {
        self.from_version = from;
        self.to_version = to;
        self
    }
}

/// Rows of a [`ResultSet`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rows(Vec<Row>);

impl Rows {
    /// Row at `idx`, if any.
    #[must_use]
    pub fn item(&self, idx: usize) -> Option<&Row> {
        self.0.get(idx)
    }

    /// Number of rows.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if there are no rows.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the rows in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.0.iter()
    }
}

impl<'a> IntoIterator for &'a Rows {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Result of the statement a data callback is attached to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    /// Rows in result order; each maps column name to value.
    pub rows: Rows,
    /// Rows changed by the statement.
    pub rows_affected: u64,
    /// Rowid of the most recent insert on the connection.
    pub insert_id: i64,
}

impl From<NativeResultSet> for ResultSet {
    fn from(native: NativeResultSet) -> Self {
        Self {
            rows: Rows(native.rows),
            rows_affected: native.rows_affected,
            insert_id: native.insert_id,
        }
    }
}

/// Resolves once an enqueued transaction has finished and its callback has
/// run.
#[derive(Debug)]
pub struct Completion {
    receiver: oneshot::Receiver<Result<(), TransactionError>>,
}

impl Completion {
    pub(crate) fn channel() -> (oneshot::Sender<Result<(), TransactionError>>, Self) {
        let (sender, receiver) = oneshot::channel();
        (sender, Self { receiver })
    }

    /// Waits for the transaction's outcome.
    ///
    /// # Errors
    ///
    /// Returns the transaction's failure. If the runner was torn down before
    /// finishing (runtime shutdown or a panicking callback) the cause is
    /// [`BridgeError::ChannelClosed`].
    pub async fn wait(self) -> Result<(), TransactionError> {
        self.receiver
            .await
            .unwrap_or_else(|_| Err(TransactionError::new(BridgeError::ChannelClosed)))
    }
}

#[cfg(test)]
mod tests {
    use websql_db::params;

    use super::*;

    #[test]
    fn test_execute_sql_only_queues() {
        let mut tx = SqlTransaction::new();
        tx.execute_sql("CREATE TABLE t (x)", Vec::new());
        tx.execute_sql("INSERT INTO t VALUES (?)", params![1])
            .on_data(|_, _| {});
        tx.execute_sql("SELECT * FROM t", Vec::new())
            .on_error(|_, _| ErrorDisposition::Propagate);

        assert_eq!(tx.statements.len(), 3);
        let flags: Vec<bool> = tx.statements.iter().map(|s| s.callbacks.is_set()).collect();
        assert_eq!(flags, vec![false, true, true]);
        assert_eq!(tx.statements[1].args.args, vec![Value::Integer(1)]);
    }

    #[test]
    fn test_result_set_from_native() {
        let conn = websql_db::Connection::open_in_memory().expect("open");
        let rows = conn
            .query("SELECT 1 AS a UNION ALL SELECT 2", &[])
            .expect("query")
            .rows;
        let rs = ResultSet::from(NativeResultSet {
            rows,
            rows_affected: 0,
            insert_id: 0,
        });
        assert_eq!(rs.rows.len(), 2);
        assert_eq!(rs.rows.item(1).and_then(|row| row.get("a")), Some(&Value::Integer(2)));
        assert!(rs.rows.item(2).is_none());
    }

    #[tokio::test]
    async fn test_dropped_completion_reports_closed() {
        let (sender, completion) = Completion::channel();
        drop(sender);
        let err = completion.wait().await.expect_err("dropped");
        assert_eq!(err.cause, BridgeError::ChannelClosed);
    }
}
