//! Database error types for the safe `SQLite` wrapper.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Result code returned by `SQLite` operations (extended code when available).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbErrorCode(pub i32);

impl DbErrorCode {
    /// Generic `SQLITE_ERROR`, used when the engine did not report a code.
    pub const GENERIC: Self = Self(rusqlite::ffi::SQLITE_ERROR);
}

impl fmt::Display for DbErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error returned by database operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("sqlite error {code}: {message}")]
pub struct DbError {
    /// `SQLite` result code.
    pub code: DbErrorCode,
    /// Human-readable error message (from `sqlite3_errmsg` when available).
    pub message: String,
}

impl DbError {
    /// Creates a new database error.
    #[must_use]
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code: DbErrorCode(code),
            message: message.into(),
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(failure, Some(message)) => {
                Self::new(failure.extended_code, message.clone())
            }
            rusqlite::Error::SqliteFailure(failure, None) => {
                Self::new(failure.extended_code, failure.to_string())
            }
            _ => Self {
                code: DbErrorCode::GENERIC,
                message: err.to_string(),
            },
        }
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;
