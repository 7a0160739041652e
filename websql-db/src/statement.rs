//! Single-statement execution and the rows it produces.

use rusqlite::params_from_iter;
use serde::{Deserialize, Serialize};

use super::error::DbResult;
use super::value::Value;

/// One named column of a result row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name as reported by the engine.
    pub key: String,
    /// Column value.
    pub value: Value,
}

/// A result row: column name to value, in the order the engine reported
/// the columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    /// Columns of this row.
    pub columns: Vec<Column>,
}

impl Row {
    /// Returns the value of the first column named `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|column| column.key == key)
            .map(|column| &column.value)
    }

    /// Iterates `(name, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .map(|column| (column.key.as_str(), &column.value))
    }

    /// Number of columns.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns `true` if the row has no columns.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Rows produced by one statement. Empty for statements that return no
/// result columns (DDL, `INSERT`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryRows {
    /// Collected rows.
    pub rows: Vec<Row>,
}

/// Prepares `sql`, binds `args` positionally and steps it to completion.
pub(super) fn run(
    conn: &rusqlite::Connection,
    sql: &str,
    args: &[Value],
) -> DbResult<QueryRows> {
    let mut stmt = conn.prepare(sql)?;
    let names: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect();

    let mut rows = stmt.query(params_from_iter(args.iter()))?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut columns = Vec::with_capacity(names.len());
        for (idx, key) in names.iter().enumerate() {
            columns.push(Column {
                key: key.clone(),
                value: Value::from(row.get_ref(idx)?),
            });
        }
        out.push(Row { columns });
    }
    Ok(QueryRows { rows: out })
}
