//! Terminal commit/rollback of a bridge transaction.

use websql_db::Connection;

use crate::error::{BridgeError, BridgeResult};
use crate::protocol::EndTransactionArgs;

/// Commits or rolls back the open transaction on `conn`.
///
/// When committing with a new version, the version is written and read back
/// inside the transaction first; if it does not stick the transaction is
/// rolled back and [`BridgeError::VersionWriteFailed`] is returned. A commit
/// or rollback that leaves the engine inside the transaction (a deferred
/// constraint failing at `COMMIT`, for one) is reported as
/// [`BridgeError::EndTransactionFailed`].
pub(crate) fn end(conn: &Connection, args: &EndTransactionArgs) -> BridgeResult<()> {
    if !conn.is_in_transaction() {
        return Err(BridgeError::NotInTransaction {
            name: args.name.clone(),
        });
    }

    let ended = if args.is_commit {
        if let Some(version) = args.new_version {
            if let Err(err) = write_version(conn, &args.name, version) {
                if let Err(rollback_err) = conn.rollback() {
                    log::error!(
                        "rollback of {} on '{}' failed after version write error: {rollback_err}",
                        args.transaction_id,
                        args.name
                    );
                }
                return Err(err);
            }
        }
        conn.commit()
    } else {
        conn.rollback()
    };

    if conn.is_in_transaction() {
        if let Err(err) = ended {
            log::warn!(
                "{} on '{}' is still in a transaction: {err}",
                args.transaction_id,
                args.name
            );
        }
        return Err(BridgeError::EndTransactionFailed {
            name: args.name.clone(),
        });
    }
    ended?;
    Ok(())
}

fn write_version(conn: &Connection, name: &str, version: i64) -> BridgeResult<()> {
    let failed = |reason: String| BridgeError::VersionWriteFailed {
        name: name.to_string(),
        requested: version,
        reason,
    };
    conn.set_user_version(version)
        .map_err(|err| failed(err.message))?;
    let actual = conn.user_version().map_err(|err| failed(err.message))?;
    if actual != version {
        return Err(failed(format!("it is {actual}")));
    }
    Ok(())
}
