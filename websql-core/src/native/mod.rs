//! Native half of the bridge: owns the engine connections and answers
//! requests one at a time.
//!
//! Every request is executed synchronously to completion. Failures are
//! reported as [`SqlError`]s carrying the connection's transaction state so
//! the client can decide how to end the transaction.

mod batch;
mod boundary;
mod registry;
mod workaround;

pub use registry::ConnectionRegistry;

use crate::error::{BridgeError, SqlError};
use crate::paths::StoragePaths;
use crate::protocol::{
    BatchResult, CloseArgs, EndTransactionArgs, OpenArgs, OpenResult, Request, Response,
    RunBatchArgs,
};

/// Request handler for the native side.
#[derive(Debug)]
pub struct NativeHost {
    paths: StoragePaths,
    registry: ConnectionRegistry,
}

impl NativeHost {
    /// Creates a host storing databases under `paths`.
    #[must_use]
    pub fn new(paths: StoragePaths) -> Self {
        Self {
            paths,
            registry: ConnectionRegistry::new(),
        }
    }

    /// Dispatches one request.
    ///
    /// # Errors
    ///
    /// Returns the failure of the underlying operation.
    pub fn handle(&mut self, request: Request) -> Result<Response, SqlError> {
        log::trace!(
            "native request {}",
            serde_json::to_string(&request).unwrap_or_else(|err| err.to_string())
        );
        let method = request.method();
        let result = match request {
            Request::Open(args) => self.open(&args).map(Response::Open),
            Request::Close(args) => self.close(&args).map(|()| Response::Close),
            Request::RunBatch(args) => self.run_batch(&args).map(Response::RunBatch),
            Request::ForceEndTransaction(args) => self
                .force_end_transaction(&args)
                .map(|()| Response::ForceEndTransaction),
        };
        if let Err(err) = &result {
            log::debug!(
                "native {method} failed: {err} (in transaction: {}, has database: {})",
                err.is_in_transaction,
                err.has_database
            );
        }
        result
    }

    /// Opens a database; see [`ConnectionRegistry::open`].
    ///
    /// # Errors
    ///
    /// Returns the registry's failure.
    pub fn open(&mut self, args: &OpenArgs) -> Result<OpenResult, SqlError> {
        self.registry
            .open(&self.paths, &args.name, args.version)
            .map(|version| OpenResult { version })
            .map_err(SqlError::detached)
    }

    /// Closes a database; see [`ConnectionRegistry::close`].
    ///
    /// # Errors
    ///
    /// Fails only if the database is not open.
    pub fn close(&mut self, args: &CloseArgs) -> Result<(), SqlError> {
        self.registry.close(&args.name).map_err(SqlError::detached)
    }

    /// Runs one batch of statements.
    ///
    /// # Errors
    ///
    /// Returns the batch failure together with the connection's transaction
    /// state after any rollback.
    pub fn run_batch(&self, args: &RunBatchArgs) -> Result<BatchResult, SqlError> {
        let conn = self.registry.get(&args.name).ok_or_else(|| {
            SqlError::detached(BridgeError::NotOpen {
                name: args.name.clone(),
            })
        })?;
        match batch::run(conn, args) {
            Ok(result_set) => Ok(BatchResult {
                result_set,
                is_in_transaction: conn.is_in_transaction(),
            }),
            Err(error) => Err(SqlError {
                error,
                is_in_transaction: conn.is_in_transaction(),
                has_database: true,
            }),
        }
    }

    /// Commits or rolls back the open transaction, optionally writing a new
    /// schema version as part of the commit.
    ///
    /// # Errors
    ///
    /// Fails if the database is not open, no transaction is open, the version
    /// write did not stick, or the engine still reports a transaction
    /// afterwards.
    pub fn force_end_transaction(&self, args: &EndTransactionArgs) -> Result<(), SqlError> {
        let conn = self.registry.get(&args.name).ok_or_else(|| {
            SqlError::detached(BridgeError::NotOpen {
                name: args.name.clone(),
            })
        })?;
        boundary::end(conn, args).map_err(|error| SqlError {
            error,
            is_in_transaction: conn.is_in_transaction(),
            has_database: true,
        })
    }

    /// Returns `true` if `name` has an open connection.
    #[must_use]
    pub fn is_open(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    /// Returns whether `name`'s connection is inside a transaction, or `None`
    /// if it is not open.
    #[must_use]
    pub fn is_in_transaction(&self, name: &str) -> Option<bool> {
        self.registry.get(name).map(websql_db::Connection::is_in_transaction)
    }
}
