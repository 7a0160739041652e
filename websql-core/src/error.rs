use serde::{Deserialize, Serialize};
use thiserror::Error;
use websql_db::DbError;

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors raised on either side of the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BridgeError {
    /// A database with this name is already open (or being opened).
    #[error("database '{name}' is already open")]
    AlreadyOpen {
        /// Database name.
        name: String,
    },

    /// No open database with this name.
    #[error("database '{name}' is not open")]
    NotOpen {
        /// Database name.
        name: String,
    },

    /// The live schema version differs from the one the caller required.
    #[error("version mismatch for '{name}': expected {expected}, found {actual}")]
    VersionMismatch {
        /// Database name.
        name: String,
        /// Version the caller required (×100 encoding).
        expected: i64,
        /// Live schema version (×100 encoding).
        actual: i64,
    },

    /// The version string is not in the accepted format.
    #[error("invalid version format: '{0}'")]
    InvalidVersion(String),

    /// The database name is empty or is not a plain file name.
    #[error("database name must be a non-empty file name")]
    InvalidName,

    /// A first batch found the connection already inside a transaction.
    #[error("database '{name}' is already in a transaction")]
    AlreadyInTransaction {
        /// Database name.
        name: String,
    },

    /// A batch or boundary found no open transaction.
    #[error("database '{name}' is not in a transaction")]
    NotInTransaction {
        /// Database name.
        name: String,
    },

    /// Writing the new schema version did not stick; the transaction was
    /// rolled back.
    #[error("could not set version to {requested} for '{name}': {reason}")]
    VersionWriteFailed {
        /// Database name.
        name: String,
        /// Version that should have been written.
        requested: i64,
        /// What went wrong.
        reason: String,
    },

    /// The connection still reports an open transaction after commit or
    /// rollback.
    #[error("failed to end transaction on '{name}'")]
    EndTransactionFailed {
        /// Database name.
        name: String,
    },

    /// The engine rejected a statement (or a transaction control command).
    #[error("statement failed: {0}")]
    StatementFailed(DbError),

    /// The handle is no longer the registered database for its name.
    #[error("database '{name}' connection closed, open it again first")]
    StaleHandle {
        /// Database name.
        name: String,
    },

    /// `close` was called while transactions are running or queued.
    #[error("database '{name}' has a transaction in progress")]
    TransactionInProgress {
        /// Database name.
        name: String,
    },

    /// The transaction's action returned an error before anything was sent.
    #[error("transaction action failed: {0}")]
    ActionFailed(String),

    /// The native dispatcher is gone.
    #[error("bridge channel closed")]
    ChannelClosed,

    /// The native side answered with a reply for a different method.
    #[error("unexpected reply to {method}")]
    UnexpectedResponse {
        /// Method of the request that got the wrong reply.
        method: String,
    },
}

impl From<DbError> for BridgeError {
    fn from(error: DbError) -> Self {
        Self::StatementFailed(error)
    }
}

/// Failure reported by the native side: the error plus the connection state
/// at the moment it was raised.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[error("{error}")]
pub struct SqlError {
    /// What went wrong.
    pub error: BridgeError,
    /// Whether the connection is still inside an engine transaction.
    pub is_in_transaction: bool,
    /// Whether the named database was open when the failure occurred.
    pub has_database: bool,
}

impl SqlError {
    /// A failure raised before any connection was resolved.
    #[must_use]
    pub const fn detached(error: BridgeError) -> Self {
        Self {
            error,
            is_in_transaction: false,
            has_database: false,
        }
    }

    /// Returns `true` if the failure came from executing a statement, as
    /// opposed to a precondition of the batch (version mismatch, transaction
    /// state). Statement error callbacks are offered both kinds.
    #[must_use]
    pub const fn is_statement_failure(&self) -> bool {
        matches!(self.error, BridgeError::StatementFailed(_))
    }
}

/// Terminal failure of a transaction, as delivered to its error callback and
/// completion.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{cause}")]
pub struct TransactionError {
    /// The error that ended the transaction.
    pub cause: BridgeError,
    /// Set when the terminal commit/rollback itself failed. Engine state may
    /// not match what the callbacks observed.
    pub boundary_failure: Option<BridgeError>,
}

impl TransactionError {
    pub(crate) const fn new(cause: BridgeError) -> Self {
        Self {
            cause,
            boundary_failure: None,
        }
    }

    /// Returns `true` if the terminal boundary request failed.
    #[must_use]
    pub const fn is_inconsistent(&self) -> bool {
        self.boundary_failure.is_some()
    }
}

impl From<BridgeError> for TransactionError {
    fn from(cause: BridgeError) -> Self {
        Self::new(cause)
    }
}
