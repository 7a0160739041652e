//! Client half of the bridge: the WebSQL-style surface.
//!
//! ```rust,ignore
//! let bridge = Bridge::new(StoragePaths::new(dir))?;
//! let db = bridge.open_database("notes", "").await?;
//! db.transaction(TransactionRequest::new(|tx| {
//!     tx.execute_sql("CREATE TABLE IF NOT EXISTS notes (body TEXT)", Vec::new());
//!     Ok(())
//! }))?
//! .wait()
//! .await?;
//! ```

mod database;
mod runner;
mod scheduler;
mod transaction;

pub use database::Database;
pub use transaction::{
    ActionResult, Completion, ErrorDisposition, QueuedStatement, ResultSet, Rows, SqlTransaction,
    TransactionRequest,
};

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::runtime::Handle;

use crate::channel::{self, ChannelHandle};
use crate::error::{BridgeError, BridgeResult};
use crate::native::NativeHost;
use crate::paths::StoragePaths;
use crate::protocol::{CloseArgs, OpenArgs};
use crate::version;

use database::DatabaseInner;

/// Locks `mutex`, recovering the data if a callback panicked while it was
/// held. Every critical section leaves the data consistent.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) enum Slot {
    /// Name reserved while the native open is in flight.
    Opening,
    Open(Arc<DatabaseInner>),
}

pub(crate) struct Shared {
    channel: ChannelHandle,
    databases: Mutex<HashMap<String, Slot>>,
    transaction_seed: AtomicU64,
}

impl Shared {
    fn next_transaction_id(&self) -> String {
        format!("tx{}", self.transaction_seed.fetch_add(1, Ordering::Relaxed))
    }
}

/// Entry point: owns the native dispatcher and the registry of open
/// databases.
pub struct Bridge {
    shared: Arc<Shared>,
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let open: Vec<String> = lock(&self.shared.databases).keys().cloned().collect();
        f.debug_struct("Bridge").field("databases", &open).finish()
    }
}

impl Bridge {
    /// Starts a native host storing databases under `paths`.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the dispatcher thread cannot be spawned.
    pub fn new(paths: StoragePaths) -> io::Result<Self> {
        let channel = channel::spawn(NativeHost::new(paths))?;
        Ok(Self {
            shared: Arc::new(Shared {
                channel,
                databases: Mutex::new(HashMap::new()),
                transaction_seed: AtomicU64::new(0),
            }),
        })
    }

    /// Opens (or creates) the database `name`.
    ///
    /// `version` is the required schema version, e.g. `"1.0"`; an empty
    /// string skips the check. A new database is created at that version.
    ///
    /// Transactions on the returned handle run on the tokio runtime this is
    /// called from.
    ///
    /// # Errors
    ///
    /// [`BridgeError::InvalidName`] (see [`StoragePaths::is_valid_name`]) or
    /// [`BridgeError::InvalidVersion`] before any round trip, [`BridgeError::AlreadyOpen`] if the name is open or
    /// being opened, or the native open failure.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    ///
    /// # Cancellation
    ///
    /// Dropping the future after the request was sent releases the name and
    /// queues a native close behind the open, so the name can be opened
    /// again.
    pub async fn open_database(&self, name: &str, version: &str) -> BridgeResult<Database> {
        if !StoragePaths::is_valid_name(name) {
            return Err(BridgeError::InvalidName);
        }
        let requested = version::parse(version)?;
        let runtime = Handle::current();

        let mut reservation = Reservation::new(&self.shared, name)?;
        reservation.open_in_flight = true;
        let opened = self
            .shared
            .channel
            .open(OpenArgs {
                name: name.to_string(),
                version: requested,
            })
            .await;
        reservation.open_in_flight = false;
        let opened = opened.map_err(|err| err.error)?;

        let inner = Arc::new(DatabaseInner::new(
            name.to_string(),
            version::format(opened.version),
            self.shared.channel.clone(),
            runtime,
        ));
        reservation.commit(Arc::clone(&inner));
        log::debug!("'{name}' open at version {}", opened.version);
        Ok(Database::new(inner, Arc::clone(&self.shared)))
    }

    /// Returns `true` if `name` is open or being opened.
    #[must_use]
    pub fn is_open(&self, name: &str) -> bool {
        lock(&self.shared.databases).contains_key(name)
    }
}

/// Claims a name for the duration of an open; released on drop unless
/// committed.
struct Reservation<'a> {
    shared: &'a Shared,
    name: &'a str,
    /// Set while the native open has been sent but not answered.
    open_in_flight: bool,
    committed: bool,
}

impl<'a> Reservation<'a> {
    fn new(shared: &'a Shared, name: &'a str) -> BridgeResult<Self> {
        let mut databases = lock(&shared.databases);
        if databases.contains_key(name) {
            return Err(BridgeError::AlreadyOpen {
                name: name.to_string(),
            });
        }
        databases.insert(name.to_string(), Slot::Opening);
        drop(databases);
        Ok(Self {
            shared,
            name,
            open_in_flight: false,
            committed: false,
        })
    }

    fn commit(mut self, database: Arc<DatabaseInner>) {
        lock(&self.shared.databases).insert(self.name.to_string(), Slot::Open(database));
        self.committed = true;
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        if self.open_in_flight {
            log::debug!("open of '{}' abandoned, closing it natively", self.name);
            self.shared.channel.close_detached(CloseArgs {
                name: self.name.to_string(),
            });
        }
        lock(&self.shared.databases).remove(self.name);
    }
}
