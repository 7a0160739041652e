//! Open connections keyed by database name.

use std::collections::HashMap;

use websql_db::Connection;

use crate::error::{BridgeError, BridgeResult};
use crate::paths::StoragePaths;

/// Maps a database name to its single open engine connection.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<String, Connection>,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens `name` under `paths`, creating the file if needed, and returns
    /// the live schema version.
    ///
    /// A brand-new file receives `requested` as its schema version. If a
    /// version was requested and the live one differs, the connection is
    /// released and the open fails.
    ///
    /// # Errors
    ///
    /// [`BridgeError::InvalidName`] if `name` does not fit under the storage
    /// root, [`BridgeError::AlreadyOpen`] if `name` is registered,
    /// [`BridgeError::VersionMismatch`] on a version conflict, or
    /// [`BridgeError::StatementFailed`] for engine errors.
    pub fn open(
        &mut self,
        paths: &StoragePaths,
        name: &str,
        requested: Option<i64>,
    ) -> BridgeResult<i64> {
        if self.connections.contains_key(name) {
            return Err(BridgeError::AlreadyOpen {
                name: name.to_string(),
            });
        }

        let path = paths
            .database_path(name)
            .ok_or(BridgeError::InvalidName)?;
        let is_new = !path.exists();
        let conn = Connection::open(&path)?;

        if is_new {
            if let Some(version) = requested {
                conn.set_user_version(version)?;
            }
        }

        let existing = conn.user_version()?;
        if let Some(version) = requested {
            if version != existing {
                log::warn!(
                    "wrong version for {} database '{name}': requested {version}, existing {existing}",
                    if is_new { "new" } else { "existing" },
                );
                release(name, conn);
                return Err(BridgeError::VersionMismatch {
                    name: name.to_string(),
                    expected: version,
                    actual: existing,
                });
            }
        }

        log::debug!("opened '{name}' at version {existing} (new: {is_new})");
        self.connections.insert(name.to_string(), conn);
        Ok(existing)
    }

    /// Removes `name` and releases its connection.
    ///
    /// Release failures are logged and swallowed; once the entry is removed
    /// the close is reported as successful.
    ///
    /// # Errors
    ///
    /// [`BridgeError::NotOpen`] if `name` is not registered.
    pub fn close(&mut self, name: &str) -> BridgeResult<()> {
        let conn = self
            .connections
            .remove(name)
            .ok_or_else(|| BridgeError::NotOpen {
                name: name.to_string(),
            })?;
        release(name, conn);
        Ok(())
    }

    /// Returns the connection registered for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Connection> {
        self.connections.get(name)
    }

    /// Returns `true` if `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.connections.contains_key(name)
    }

    /// Number of open connections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Returns `true` if nothing is open.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

fn release(name: &str, conn: Connection) {
    if let Err(err) = conn.close() {
        log::warn!("ignoring error while releasing '{name}': {err}");
    }
}
