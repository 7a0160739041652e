//! Storage path helpers.

use std::path::{Path, PathBuf};

/// Location of database files on the native side. A database named `name`
/// lives at `<root>/<name>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePaths {
    root: PathBuf,
}

impl StoragePaths {
    /// Builds storage paths rooted at `root`.
    #[must_use]
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Returns `true` if `name` names a file directly under the root: it is
    /// not empty, not `.` or `..`, and has no path separator.
    #[must_use]
    pub fn is_valid_name(name: &str) -> bool {
        !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\', '\0'])
    }

    /// Returns the path of the database file for `name`, or `None` if the
    /// name would leave the root.
    #[must_use]
    pub fn database_path(&self, name: &str) -> Option<PathBuf> {
        Self::is_valid_name(name).then(|| self.root.join(name))
    }
}
