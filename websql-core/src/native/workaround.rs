//! `DROP TABLE` rewrite.
//!
//! Dropping a table inside the bridge's long-lived transactions is not safe
//! on the target engine, so a drop is turned into "empty it, then rename it
//! out of the way". The renamed table keeps a `_DEL_` prefix.
//!
//! Table names may be bare, schema-qualified, or quoted with `"…"`, `` `…` ``
//! or `[…]`; quoted names may contain spaces.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::LazyLock;
use std::time::{SystemTime, UNIX_EPOCH};

use regex::Regex;

static DROP_TABLE: LazyLock<Regex> = LazyLock::new(|| {
    let ident = r#"(?:"(?:[^"]|"")+"|`[^`]+`|\[[^\]]+\]|[^\s;."`\[]+)"#;
    Regex::new(&format!(
        r"(?i)^\s*DROP\s+TABLE\s+(?P<if_exists>IF\s+EXISTS\s+)?(?P<table>(?:{ident}\.)?{ident})"
    ))
    .expect("static drop table pattern")
});

static LAST_STAMP: AtomicU64 = AtomicU64::new(0);

/// Returns the replacement sequence for a `DROP TABLE` statement, or `None`
/// if `sql` is not one.
///
/// `DROP TABLE IF EXISTS t` becomes
/// `CREATE TABLE IF NOT EXISTS t (x INTEGER)`, `DELETE FROM t`,
/// `ALTER TABLE t RENAME TO _DEL_t_<stamp>`; a plain drop skips the create.
pub(crate) fn rewrite_drop_table(sql: &str) -> Option<Vec<String>> {
    let captures = DROP_TABLE.captures(sql)?;
    let table = captures.name("table")?.as_str();

    let mut statements = Vec::with_capacity(3);
    if captures.name("if_exists").is_some() {
        statements.push(format!("CREATE TABLE IF NOT EXISTS {table} (x INTEGER)"));
    }
    statements.push(format!("DELETE FROM {table}"));
    statements.push(format!(
        "ALTER TABLE {table} RENAME TO _DEL_{}_{}",
        bare_identifier(table),
        deletion_stamp()
    ));
    Some(statements)
}

/// Strips identifier quoting so the name can be embedded in a new, unquoted
/// one; anything else outside `[A-Za-z0-9_]` becomes `_`.
fn bare_identifier(table: &str) -> String {
    table
        .chars()
        .filter(|c| !matches!(c, '"' | '`' | '[' | ']'))
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Microseconds since the epoch, strictly increasing across calls.
fn deletion_stamp() -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| {
            u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX)
        });
    let previous = LAST_STAMP
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
            Some(now.max(last.saturating_add(1)))
        })
        .unwrap_or_else(|last| last);
    now.max(previous.saturating_add(1))
}
