use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::runtime::Handle;

use super::runner::Transaction;
use super::scheduler::{self, TransactionQueue};
use super::transaction::{Completion, TransactionRequest};
use super::{lock, Shared, Slot};
use crate::channel::ChannelHandle;
use crate::error::{BridgeError, BridgeResult};
use crate::protocol::CloseArgs;
use crate::version;

pub(crate) struct DatabaseInner {
    pub(crate) name: String,
    version: Mutex<String>,
    used: AtomicBool,
    pub(crate) queue: Mutex<TransactionQueue>,
    pub(crate) channel: ChannelHandle,
    pub(crate) runtime: Handle,
}

impl DatabaseInner {
    pub(crate) fn new(name: String, version: String, channel: ChannelHandle, runtime: Handle) -> Self {
        Self {
            name,
            version: Mutex::new(version),
            used: AtomicBool::new(false),
            queue: Mutex::new(TransactionQueue::default()),
            channel,
            runtime,
        }
    }

    pub(crate) fn set_version(&self, version: String) {
        log::debug!("'{}' is now at version {version}", self.name);
        *lock(&self.version) = version;
    }

    pub(crate) fn mark_used(&self) {
        self.used.store(true, Ordering::Release);
    }
}

/// Handle to an open database.
///
/// Cloning the handle is cheap; all clones share the same queue. Once the
/// database is closed every clone becomes stale.
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
    shared: Arc<Shared>,
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.inner.name)
            .field("version", &self.version())
            .field("used", &self.used())
            .finish_non_exhaustive()
    }
}

impl Database {
    pub(crate) const fn new(inner: Arc<DatabaseInner>, shared: Arc<Shared>) -> Self {
        Self { inner, shared }
    }

    /// Database name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Schema version as last confirmed by the native side, e.g. `"1.0"`.
    #[must_use]
    pub fn version(&self) -> String {
        lock(&self.inner.version).clone()
    }

    /// `true` once any transaction has sent a batch.
    #[must_use]
    pub fn used(&self) -> bool {
        self.inner.used.load(Ordering::Acquire)
    }

    /// Enqueues a transaction with no version check and no version change.
    ///
    /// # Errors
    ///
    /// [`BridgeError::StaleHandle`] if this handle has been closed. The
    /// request's callbacks are not invoked in that case.
    pub fn transaction(&self, request: TransactionRequest) -> BridgeResult<Completion> {
        self.enqueue(request)
    }

    /// Enqueues a transaction that requires the live schema version to be
    /// `old_version` and writes `new_version` as part of its commit.
    ///
    /// An empty `old_version` skips the check; an empty `new_version` leaves
    /// the version unchanged.
    ///
    /// # Errors
    ///
    /// [`BridgeError::InvalidVersion`] for a malformed version, or
    /// [`BridgeError::StaleHandle`] if this handle has been closed.
    pub fn change_version(
        &self,
        old_version: &str,
        new_version: &str,
        request: TransactionRequest,
    ) -> BridgeResult<Completion> {
        let from = version::parse(old_version)?;
        let to = version::parse(new_version)?;
        self.enqueue(request.with_versions(from, to))
    }

    fn enqueue(&self, request: TransactionRequest) -> BridgeResult<Completion> {
        let (sender, completion) = Completion::channel();
        {
            let databases = lock(&self.shared.databases);
            self.ensure_current(&databases)?;
            let transaction = Transaction {
                id: self.shared.next_transaction_id(),
                request,
                completion: sender,
            };
            log::debug!("queued {} on '{}'", transaction.id, self.inner.name);
            lock(&self.inner.queue).push(transaction);
            drop(databases);
        }
        scheduler::advance(&self.inner);
        Ok(completion)
    }

    /// Closes the database.
    ///
    /// The handle is unregistered before the native side is asked to close,
    /// so it is stale even if that request fails.
    ///
    /// # Errors
    ///
    /// [`BridgeError::TransactionInProgress`] if a transaction is running or
    /// queued, [`BridgeError::StaleHandle`] if this handle was already closed,
    /// or the native close failure.
    pub async fn close(&self) -> BridgeResult<()> {
        {
            let mut databases = lock(&self.shared.databases);
            self.ensure_current(&databases)?;
            if !lock(&self.inner.queue).is_idle() {
                return Err(BridgeError::TransactionInProgress {
                    name: self.inner.name.clone(),
                });
            }
            databases.remove(&self.inner.name);
        }
        log::debug!("closing '{}'", self.inner.name);
        self.shared
            .channel
            .close(CloseArgs {
                name: self.inner.name.clone(),
            })
            .await
            .map_err(|err| err.error)
    }

    fn ensure_current(&self, databases: &std::collections::HashMap<String, Slot>) -> BridgeResult<()> {
        match databases.get(&self.inner.name) {
            Some(Slot::Open(current)) if Arc::ptr_eq(current, &self.inner) => Ok(()),
            _ => Err(BridgeError::StaleHandle {
                name: self.inner.name.clone(),
            }),
        }
    }
}
