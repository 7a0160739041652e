//! Common test utilities shared across integration tests.

use std::sync::{Arc, Mutex};

use tempfile::TempDir;
use websql_core::{Bridge, Database, Row, StoragePaths, TransactionRequest};

/// Routes `log` records into a `tracing` subscriber filtered by `RUST_LOG`.
#[allow(dead_code, reason = "used in tests")]
pub fn init_logging() {
    let _ = tracing_log::LogTracer::init();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// A bridge rooted in a fresh temporary directory. Keep the directory alive
/// for the duration of the test.
#[allow(dead_code, reason = "used in tests")]
pub fn bridge() -> (TempDir, Bridge) {
    init_logging();
    let dir = tempfile::tempdir().expect("tempdir");
    let bridge = Bridge::new(StoragePaths::new(dir.path())).expect("spawn bridge");
    (dir, bridge)
}

/// Runs `sql` in its own transaction and returns its rows.
#[allow(dead_code, reason = "used in tests")]
pub async fn query(db: &Database, sql: &str) -> Vec<Row> {
    let rows = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&rows);
    let sql = sql.to_string();
    db.transaction(TransactionRequest::new(move |tx| {
        tx.execute_sql(sql, Vec::new()).on_data(move |_, rs| {
            sink.lock().unwrap().extend(rs.rows.iter().cloned());
        });
        Ok(())
    }))
    .expect("enqueue")
    .wait()
    .await
    .expect("query");
    let collected = rows.lock().unwrap().clone();
    collected
}

/// Runs each statement of `statements` in one transaction.
#[allow(dead_code, reason = "used in tests")]
pub async fn execute(db: &Database, statements: &[&str]) {
    let statements: Vec<String> = statements.iter().map(ToString::to_string).collect();
    db.transaction(TransactionRequest::new(move |tx| {
        for sql in statements {
            tx.execute_sql(sql, Vec::new());
        }
        Ok(())
    }))
    .expect("enqueue")
    .wait()
    .await
    .expect("execute");
}

/// `true` if `table` exists in the database.
#[allow(dead_code, reason = "used in tests")]
pub async fn table_exists(db: &Database, table: &str) -> bool {
    let rows = query(
        db,
        &format!("SELECT name FROM sqlite_master WHERE type = 'table' AND name = '{table}'"),
    )
    .await;
    !rows.is_empty()
}
