//! Per-database FIFO of transactions, at most one running.

use std::collections::VecDeque;
use std::sync::Arc;

use super::database::DatabaseInner;
use super::lock;
use super::runner::{Transaction, TransactionRunner};

#[derive(Default)]
pub(crate) struct TransactionQueue {
    pending: VecDeque<Transaction>,
    running: bool,
}

impl TransactionQueue {
    pub(crate) fn push(&mut self, transaction: Transaction) {
        self.pending.push_back(transaction);
    }

    /// `true` if nothing is running or waiting.
    pub(crate) fn is_idle(&self) -> bool {
        !self.running && self.pending.is_empty()
    }
}

/// Starts the head of `database`'s queue unless a transaction is already
/// running.
///
/// The runner is spawned on the database's runtime. When it finishes, or is
/// dropped without finishing, the running slot is cleared and the queue
/// advances again.
pub(crate) fn advance(database: &Arc<DatabaseInner>) {
    let transaction = {
        let mut queue = lock(&database.queue);
        if queue.running {
            return;
        }
        let Some(transaction) = queue.pending.pop_front() else {
            return;
        };
        queue.running = true;
        transaction
    };

    log::trace!("starting {} on '{}'", transaction.id, database.name);
    let slot = RunningSlot(Arc::clone(database));
    database.runtime.spawn(async move {
        TransactionRunner::run(Arc::clone(&slot.0), transaction).await;
    });
}

/// Holds a database's running slot for the lifetime of one runner task.
struct RunningSlot(Arc<DatabaseInner>);

impl Drop for RunningSlot {
    fn drop(&mut self) {
        lock(&self.0.queue).running = false;
        advance(&self.0);
    }
}
