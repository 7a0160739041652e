//! Executes one batch of statements inside the connection's open engine
//! transaction.

use websql_db::{Connection, Row};

use super::workaround;
use crate::error::{BridgeError, BridgeResult};
use crate::protocol::{NativeResultSet, RunBatchArgs, StatementArgs};

/// Runs `args.statements` on `conn` and returns the result set of the final
/// statement.
///
/// The first batch of a transaction checks the required schema version and
/// opens the engine transaction. A failing statement rolls the transaction
/// back unless it is the last one and the caller may recover from it, in
/// which case the transaction is left open. A batch declared final commits
/// before returning.
pub(crate) fn run(conn: &Connection, args: &RunBatchArgs) -> BridgeResult<NativeResultSet> {
    if args.is_first_batch {
        if conn.is_in_transaction() {
            return Err(BridgeError::AlreadyInTransaction {
                name: args.name.clone(),
            });
        }
        if let Some(required) = args.required_version {
            let actual = conn.user_version()?;
            if actual != required {
                return Err(BridgeError::VersionMismatch {
                    name: args.name.clone(),
                    expected: required,
                    actual,
                });
            }
        }
        conn.begin()?;
    }

    if !conn.is_in_transaction() {
        return Err(BridgeError::NotInTransaction {
            name: args.name.clone(),
        });
    }

    let last = args.statements.len().saturating_sub(1);
    let mut result_set = NativeResultSet::default();
    for (idx, statement) in args.statements.iter().enumerate() {
        let is_last = idx == last;
        match execute(conn, statement) {
            Ok(rows) if is_last => {
                result_set = NativeResultSet {
                    rows,
                    rows_affected: conn.changes(),
                    insert_id: conn.last_insert_rowid(),
                };
            }
            Ok(_) => {}
            Err(err) => {
                if !is_last || !args.may_recover_from_error {
                    rollback_after_failure(conn, args);
                }
                return Err(err.into());
            }
        }
    }

    if !args.may_not_be_last_batch {
        conn.commit()?;
    }

    Ok(result_set)
}

fn execute(conn: &Connection, statement: &StatementArgs) -> websql_db::DbResult<Vec<Row>> {
    match workaround::rewrite_drop_table(&statement.sql) {
        Some(steps) => {
            log::debug!("rewriting '{}' as {} statements", statement.sql, steps.len());
            for step in &steps {
                conn.query(step, &[])?;
            }
            Ok(Vec::new())
        }
        None => Ok(conn.query(&statement.sql, &statement.args)?.rows),
    }
}

fn rollback_after_failure(conn: &Connection, args: &RunBatchArgs) {
    if !conn.is_in_transaction() {
        return;
    }
    if let Err(err) = conn.rollback() {
        log::error!(
            "rollback of {} on '{}' failed after statement error: {err}",
            args.transaction_id,
            args.name
        );
    }
}
