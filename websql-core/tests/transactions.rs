//! Integration tests for transaction batching, callbacks and ordering.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use common::{bridge, execute, query, table_exists};
use websql_core::{params, BridgeError, ErrorDisposition, TransactionRequest, Value};

#[tokio::test]
async fn test_commit_fires_success_once() {
    let (_dir, bridge) = bridge();
    let db = bridge.open_database("d", "").await.expect("open");

    let successes = Arc::new(AtomicUsize::new(0));
    let failures = Arc::new(AtomicUsize::new(0));
    let (s, f) = (Arc::clone(&successes), Arc::clone(&failures));
    db.transaction(
        TransactionRequest::new(|tx| {
            tx.execute_sql("CREATE TABLE t (x INTEGER)", Vec::new());
            tx.execute_sql("INSERT INTO t VALUES (?)", params![1]);
            tx.execute_sql("INSERT INTO t VALUES (?)", params![2]);
            Ok(())
        })
        .on_success(move || {
            s.fetch_add(1, Ordering::SeqCst);
        })
        .on_error(move |_| {
            f.fetch_add(1, Ordering::SeqCst);
        }),
    )
    .expect("enqueue")
    .wait()
    .await
    .expect("commit");

    assert_eq!(successes.load(Ordering::SeqCst), 1);
    assert_eq!(failures.load(Ordering::SeqCst), 0);
    assert_eq!(query(&db, "SELECT x FROM t").await.len(), 2);
    assert!(db.used());
}

#[tokio::test]
async fn test_result_set_reports_counters() {
    let (_dir, bridge) = bridge();
    let db = bridge.open_database("d", "").await.expect("open");
    execute(&db, &["CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT)"]).await;

    let seen = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&seen);
    db.transaction(TransactionRequest::new(move |tx| {
        tx.execute_sql("INSERT INTO t (v) VALUES (?)", params!["a"]);
        tx.execute_sql("INSERT INTO t (v) VALUES (?)", params!["b"])
            .on_data(move |_, rs| {
                *sink.lock().unwrap() = Some((rs.rows_affected, rs.insert_id, rs.rows.len()));
            });
        Ok(())
    }))
    .expect("enqueue")
    .wait()
    .await
    .expect("insert");

    assert_eq!(*seen.lock().unwrap(), Some((1, 2, 0)));
    let rows = query(&db, "SELECT v FROM t ORDER BY id").await;
    assert_eq!(rows[1].get("v"), Some(&Value::Text("b".to_string())));
}

#[tokio::test]
async fn test_data_callback_can_queue_more_statements() {
    let (_dir, bridge) = bridge();
    let db = bridge.open_database("d", "").await.expect("open");
    execute(&db, &["CREATE TABLE t (x INTEGER)"]).await;

    db.transaction(TransactionRequest::new(|tx| {
        tx.execute_sql("SELECT 41 AS n", Vec::new())
            .on_data(|tx, rs| {
                let n = rs
                    .rows
                    .item(0)
                    .and_then(|row| row.get("n"))
                    .and_then(Value::as_i64)
                    .unwrap();
                tx.execute_sql("INSERT INTO t VALUES (?)", params![n + 1]);
            });
        Ok(())
    }))
    .expect("enqueue")
    .wait()
    .await
    .expect("commit");

    let rows = query(&db, "SELECT x FROM t").await;
    assert_eq!(rows[0].get("x"), Some(&Value::Integer(42)));
}

#[tokio::test]
async fn test_recovered_error_keeps_transaction_open() {
    let (_dir, bridge) = bridge();
    let db = bridge.open_database("d", "").await.expect("open");
    execute(&db, &["CREATE TABLE t (id INTEGER PRIMARY KEY)"]).await;

    let offered = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&offered);
    db.transaction(TransactionRequest::new(move |tx| {
        tx.execute_sql("INSERT INTO t VALUES (1)", Vec::new());
        tx.execute_sql("INSERT INTO t VALUES (1)", Vec::new())
            .on_error(move |_, err| {
                assert!(err.is_in_transaction);
                assert!(err.is_statement_failure());
                counter.fetch_add(1, Ordering::SeqCst);
                ErrorDisposition::Recovered
            });
        tx.execute_sql("INSERT INTO t VALUES (2)", Vec::new());
        Ok(())
    }))
    .expect("enqueue")
    .wait()
    .await
    .expect("recovered transaction commits");

    assert_eq!(offered.load(Ordering::SeqCst), 1);
    let ids: Vec<_> = query(&db, "SELECT id FROM t ORDER BY id")
        .await
        .iter()
        .map(|row| row.get("id").cloned())
        .collect();
    assert_eq!(ids, vec![Some(Value::Integer(1)), Some(Value::Integer(2))]);
}

#[tokio::test]
async fn test_recovered_error_as_last_statement_commits() {
    let (_dir, bridge) = bridge();
    let db = bridge.open_database("d", "").await.expect("open");
    execute(&db, &["CREATE TABLE t (id INTEGER PRIMARY KEY)"]).await;

    db.transaction(TransactionRequest::new(|tx| {
        tx.execute_sql("INSERT INTO t VALUES (7)", Vec::new());
        tx.execute_sql("SELECT * FROM missing", Vec::new())
            .on_error(|_, _| ErrorDisposition::Recovered);
        Ok(())
    }))
    .expect("enqueue")
    .wait()
    .await
    .expect("commit as though nothing failed");

    assert_eq!(query(&db, "SELECT id FROM t").await.len(), 1);
}

#[tokio::test]
async fn test_propagated_error_rolls_back() {
    let (_dir, bridge) = bridge();
    let db = bridge.open_database("d", "").await.expect("open");
    execute(&db, &["CREATE TABLE t (id INTEGER PRIMARY KEY)"]).await;

    let reported = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&reported);
    let err = db
        .transaction(
            TransactionRequest::new(|tx| {
                tx.execute_sql("INSERT INTO t VALUES (1)", Vec::new());
                tx.execute_sql("INSERT INTO t VALUES (1)", Vec::new())
                    .on_error(|_, _| ErrorDisposition::Propagate);
                Ok(())
            })
            .on_error(move |err| {
                *sink.lock().unwrap() = Some(err.clone());
            }),
        )
        .expect("enqueue")
        .wait()
        .await
        .expect_err("propagated");

    assert!(matches!(err.cause, BridgeError::StatementFailed(_)));
    assert!(!err.is_inconsistent());
    assert_eq!(reported.lock().unwrap().as_ref(), Some(&err));
    assert!(query(&db, "SELECT id FROM t").await.is_empty());
}

#[tokio::test]
async fn test_error_without_callback_rolls_back() {
    let (_dir, bridge) = bridge();
    let db = bridge.open_database("d", "").await.expect("open");
    execute(&db, &["CREATE TABLE t (id INTEGER PRIMARY KEY)"]).await;

    let err = db
        .transaction(TransactionRequest::new(|tx| {
            tx.execute_sql("INSERT INTO t VALUES (1)", Vec::new());
            tx.execute_sql("INSERT INTO nowhere VALUES (1)", Vec::new());
            Ok(())
        }))
        .expect("enqueue")
        .wait()
        .await
        .expect_err("missing table");

    match err.cause {
        BridgeError::StatementFailed(db_err) => assert!(db_err.message.contains("no such table")),
        other => panic!("unexpected cause {other:?}"),
    }
    assert!(query(&db, "SELECT id FROM t").await.is_empty());
}

#[tokio::test]
async fn test_failed_action_never_reaches_native_side() {
    let (_dir, bridge) = bridge();
    let db = bridge.open_database("d", "").await.expect("open");

    let err = db
        .transaction(TransactionRequest::new(|tx| {
            tx.execute_sql("CREATE TABLE t (x INTEGER)", Vec::new());
            Err("changed my mind".into())
        }))
        .expect("enqueue")
        .wait()
        .await
        .expect_err("action failed");

    assert_eq!(
        err.cause,
        BridgeError::ActionFailed("changed my mind".to_string())
    );
    assert!(!db.used());
    assert!(!table_exists(&db, "t").await);
}

#[tokio::test]
async fn test_empty_transaction_succeeds_without_round_trip() {
    let (_dir, bridge) = bridge();
    let db = bridge.open_database("d", "").await.expect("open");

    db.transaction(TransactionRequest::new(|_| Ok(())))
        .expect("enqueue")
        .wait()
        .await
        .expect("empty");
    assert!(!db.used());
}

#[tokio::test]
async fn test_recovery_after_native_rollback_reports_boundary_failure() {
    let (_dir, bridge) = bridge();
    let db = bridge.open_database("d", "").await.expect("open");

    // the failing statement is not the last of its batch, so the native side
    // rolls back even though the callback recovers
    let err = db
        .transaction(TransactionRequest::new(|tx| {
            tx.execute_sql("INSERT INTO missing VALUES (1)", Vec::new());
            tx.execute_sql("SELECT 1", Vec::new())
                .on_error(|_, err| {
                    assert!(!err.is_in_transaction);
                    ErrorDisposition::Recovered
                });
            Ok(())
        }))
        .expect("enqueue")
        .wait()
        .await
        .expect_err("boundary failure");

    assert!(err.is_inconsistent());
    assert_eq!(
        err.boundary_failure,
        Some(BridgeError::NotInTransaction {
            name: "d".to_string()
        })
    );
}

#[tokio::test]
async fn test_same_database_runs_in_enqueue_order() {
    let (_dir, bridge) = bridge();
    let db = bridge.open_database("d", "").await.expect("open");
    execute(&db, &["CREATE TABLE log (seq INTEGER PRIMARY KEY, n INTEGER)"]).await;

    let order = Arc::new(Mutex::new(Vec::new()));
    let completions: Vec<_> = (0..5)
        .map(|n| {
            let started = Arc::clone(&order);
            let finished = Arc::clone(&order);
            db.transaction(
                TransactionRequest::new(move |tx| {
                    started.lock().unwrap().push(format!("start {n}"));
                    tx.execute_sql("INSERT INTO log (n) VALUES (?)", params![n]);
                    Ok(())
                })
                .on_success(move || finished.lock().unwrap().push(format!("end {n}"))),
            )
            .expect("enqueue")
        })
        .collect();
    for completion in completions {
        completion.wait().await.expect("commit");
    }

    let expected: Vec<String> = (0..5)
        .flat_map(|n| [format!("start {n}"), format!("end {n}")])
        .collect();
    assert_eq!(*order.lock().unwrap(), expected);

    let logged: Vec<_> = query(&db, "SELECT n FROM log ORDER BY seq")
        .await
        .iter()
        .filter_map(|row| row.get("n").and_then(Value::as_i64))
        .collect();
    assert_eq!(logged, vec![0, 1, 2, 3, 4]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_databases_share_the_channel() {
    let (_dir, bridge) = bridge();
    let first = bridge.open_database("a", "").await.expect("open a");
    let second = bridge.open_database("b", "").await.expect("open b");

    let mut completions = Vec::new();
    for n in 0..10_i64 {
        for db in [&first, &second] {
            completions.push(
                db.transaction(TransactionRequest::new(move |tx| {
                    tx.execute_sql("CREATE TABLE IF NOT EXISTS t (x INTEGER)", Vec::new());
                    tx.execute_sql("INSERT INTO t VALUES (?)", params![n]);
                    Ok(())
                }))
                .expect("enqueue"),
            );
        }
    }
    for completion in completions {
        completion.wait().await.expect("commit");
    }

    assert_eq!(query(&first, "SELECT x FROM t").await.len(), 10);
    assert_eq!(query(&second, "SELECT x FROM t").await.len(), 10);
}

#[tokio::test]
async fn test_drop_table_hides_table() {
    let (_dir, bridge) = bridge();
    let db = bridge.open_database("d", "").await.expect("open");
    execute(&db, &["CREATE TABLE t (x INTEGER)", "INSERT INTO t VALUES (1)"]).await;

    execute(&db, &["DROP TABLE t"]).await;
    assert!(!table_exists(&db, "t").await);

    execute(&db, &["DROP TABLE IF EXISTS t", "CREATE TABLE t (y TEXT)"]).await;
    assert!(table_exists(&db, "t").await);
    assert!(query(&db, "SELECT y FROM t").await.is_empty());

    let hidden = query(
        &db,
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name LIKE '\\_DEL\\_t\\_%' ESCAPE '\\'",
    )
    .await;
    assert_eq!(hidden.len(), 2);
}
