//! Drives one transaction from its action to the terminal commit or
//! rollback.
//!
//! The runner is a state machine: each round-trip result is an event
//! handled by the runner, which decides the next request or
//! the final outcome.
//!
//! ```text
//! Created -> ActionRunning -> BatchInFlight* -> AwaitingBoundary -> Committed
//!                                                                 -> RolledBack
//!                                                                 -> Failed
//! ```

use std::sync::Arc;

use tokio::sync::oneshot;

use super::database::DatabaseInner;
use super::transaction::{
    ActionResult, ErrorDisposition, FailureCallback, ResultSet, SqlTransaction,
    StatementCallbacks, SuccessCallback, TransactionRequest,
};
use crate::channel::ChannelHandle;
use crate::error::{BridgeError, SqlError, TransactionError};
use crate::protocol::{BatchResult, EndTransactionArgs, RunBatchArgs};
use crate::version;

/// A transaction waiting in a database's queue.
pub(crate) struct Transaction {
    pub(crate) id: String,
    pub(crate) request: TransactionRequest,
    pub(crate) completion: oneshot::Sender<Result<(), TransactionError>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Created,
    ActionRunning,
    BatchInFlight,
    AwaitingBoundary,
    Committed,
    RolledBack,
    Failed,
}

enum Event {
    ActionReturned(ActionResult),
    BatchResult(Result<BatchResult, SqlError>),
    BoundaryResult(Result<(), SqlError>),
}

enum Next {
    Batch(RunBatchArgs),
    Boundary(EndTransactionArgs),
    Finished(Result<(), TransactionError>),
}

pub(crate) struct TransactionRunner {
    id: String,
    database: Arc<DatabaseInner>,
    channel: ChannelHandle,
    state: State,
    from_version: Option<i64>,
    to_version: Option<i64>,
    started: bool,
    tx: SqlTransaction,
    in_flight: StatementCallbacks,
    carried: Option<BridgeError>,
    on_success: Option<SuccessCallback>,
    on_error: Option<FailureCallback>,
    completion: Option<oneshot::Sender<Result<(), TransactionError>>>,
}

impl TransactionRunner {
    /// Runs `transaction` to completion and fires its callbacks.
    pub(crate) async fn run(database: Arc<DatabaseInner>, transaction: Transaction) {
        let Transaction {
            id,
            request,
            completion,
        } = transaction;
        let TransactionRequest {
            action,
            from_version,
            to_version,
            on_success,
            on_error,
        } = request;
        let mut runner = Self {
            id,
            channel: database.channel.clone(),
            database,
            state: State::Created,
            from_version,
            to_version,
            started: false,
            tx: SqlTransaction::new(),
            in_flight: StatementCallbacks::default(),
            carried: None,
            on_success,
            on_error,
            completion: Some(completion),
        };

        runner.state = State::ActionRunning;
        let result = action(&mut runner.tx);
        let mut next = runner.handle(Event::ActionReturned(result));
        let outcome = loop {
            next = match next {
                Next::Batch(args) => {
                    let result = runner.channel.run_batch(args).await;
                    runner.handle(Event::BatchResult(result))
                }
                Next::Boundary(args) => {
                    let result = runner.channel.end_transaction(args).await;
                    runner.handle(Event::BoundaryResult(result))
                }
                Next::Finished(outcome) => break outcome,
            };
        };
        runner.notify(outcome);
    }

    fn handle(&mut self, event: Event) -> Next {
        match event {
            Event::ActionReturned(result) => self.on_action_returned(result),
            Event::BatchResult(result) => self.on_batch_result(result),
            Event::BoundaryResult(result) => self.on_boundary_result(result),
        }
    }

    fn on_action_returned(&mut self, result: ActionResult) -> Next {
        debug_assert_eq!(self.state, State::ActionRunning);
        if let Err(err) = result {
            log::warn!("{} action on '{}' failed: {err}", self.id, self.database.name);
            return self.end(false, Some(BridgeError::ActionFailed(err.to_string())));
        }
        if self.tx.statements.is_empty() {
            if self.to_version.is_none() {
                return self.end(false, None);
            }
            // the version is only written by a commit, which needs a transaction
            self.tx.execute_sql("SELECT 1", Vec::new());
        }
        self.next_batch()
    }

    fn next_batch(&mut self) -> Next {
        let mut statements = Vec::new();
        let mut callbacks = StatementCallbacks::default();
        while let Some(statement) = self.tx.statements.pop_front() {
            let (args, statement_callbacks) = statement.into_parts();
            statements.push(args);
            if statement_callbacks.is_set() {
                callbacks = statement_callbacks;
                break;
            }
        }

        let args = RunBatchArgs {
            name: self.database.name.clone(),
            transaction_id: self.id.clone(),
            is_first_batch: !self.started,
            required_version: self.from_version,
            may_recover_from_error: callbacks.on_error.is_some(),
            may_not_be_last_batch: callbacks.is_set() || self.to_version.is_some(),
            statements,
        };
        log::debug!(
            "{} sending {} statement(s) to '{}' (first: {})",
            self.id,
            args.statements.len(),
            args.name,
            args.is_first_batch
        );

        self.started = true;
        self.database.mark_used();
        self.in_flight = callbacks;
        self.state = State::BatchInFlight;
        Next::Batch(args)
    }

    fn on_batch_result(&mut self, result: Result<BatchResult, SqlError>) -> Next {
        debug_assert_eq!(self.state, State::BatchInFlight);
        let callbacks = std::mem::take(&mut self.in_flight);
        match result {
            Ok(batch) => {
                if let Some(on_data) = callbacks.on_data {
                    on_data(&mut self.tx, &ResultSet::from(batch.result_set));
                }
                self.after_batch(batch.is_in_transaction)
            }
            Err(err) => {
                if let Some(on_error) = callbacks.on_error {
                    if on_error(&mut self.tx, &err) == ErrorDisposition::Recovered {
                        log::debug!("{} recovered from: {err}", self.id);
                        return self.after_batch(true);
                    }
                }
                self.end(err.is_in_transaction, Some(err.error))
            }
        }
    }

    fn after_batch(&mut self, is_in_transaction: bool) -> Next {
        if self.tx.statements.is_empty() {
            self.end(is_in_transaction, None)
        } else {
            self.next_batch()
        }
    }

    fn end(&mut self, is_in_transaction: bool, error: Option<BridgeError>) -> Next {
        if is_in_transaction {
            let args = EndTransactionArgs {
                name: self.database.name.clone(),
                transaction_id: self.id.clone(),
                is_commit: error.is_none(),
                new_version: self.to_version,
            };
            self.carried = error;
            self.state = State::AwaitingBoundary;
            return Next::Boundary(args);
        }
        match error {
            None => self.finish(State::Committed, Ok(())),
            Some(cause) => self.finish(State::RolledBack, Err(TransactionError::new(cause))),
        }
    }

    fn on_boundary_result(&mut self, result: Result<(), SqlError>) -> Next {
        debug_assert_eq!(self.state, State::AwaitingBoundary);
        let carried = self.carried.take();
        match (result, carried) {
            (Ok(()), None) => {
                if let Some(version) = self.to_version {
                    self.database.set_version(version::format(version));
                }
                self.finish(State::Committed, Ok(()))
            }
            (Ok(()), Some(cause)) => {
                self.finish(State::RolledBack, Err(TransactionError::new(cause)))
            }
            (Err(err), carried) => {
                log::error!(
                    "{} could not end transaction on '{}', state may be inconsistent: {err}",
                    self.id,
                    self.database.name
                );
                let cause = carried.unwrap_or_else(|| err.error.clone());
                self.finish(
                    State::Failed,
                    Err(TransactionError {
                        cause,
                        boundary_failure: Some(err.error),
                    }),
                )
            }
        }
    }

    fn finish(&mut self, state: State, outcome: Result<(), TransactionError>) -> Next {
        log::debug!("{} on '{}' finished as {state:?}", self.id, self.database.name);
        self.state = state;
        Next::Finished(outcome)
    }

    fn notify(&mut self, outcome: Result<(), TransactionError>) {
        match &outcome {
            Ok(()) => {
                if let Some(on_success) = self.on_success.take() {
                    on_success();
                }
            }
            Err(err) => {
                if let Some(on_error) = self.on_error.take() {
                    on_error(err);
                }
            }
        }
        if let Some(completion) = self.completion.take() {
            if completion.send(outcome).is_err() {
                log::trace!("{} completion dropped", self.id);
            }
        }
    }
}
