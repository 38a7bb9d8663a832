//! Store configuration.

use std::path::{Path, PathBuf};

/// Where the commit log lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    /// Process memory. Data survives close/reopen of the same
    /// [`crate::Datastore`] but not the process.
    Memory,
    /// A log file on disk.
    File(PathBuf),
    /// No persistent backend exists in this environment; every open fails
    /// with [`crate::StoreError::Unavailable`].
    Unavailable,
}

/// Configuration for opening a [`crate::Datastore`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Backend location.
    pub location: StoreLocation,

    /// Whether to sync the log on every commit (safer but slower).
    pub sync_on_commit: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            location: StoreLocation::Memory,
            sync_on_commit: true,
        }
    }
}

impl StoreConfig {
    /// Creates a configuration with default values (in memory).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration for a log file at `path`.
    #[must_use]
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self::default().location(StoreLocation::File(path.as_ref().to_path_buf()))
    }

    /// Sets the backend location.
    #[must_use]
    pub fn location(mut self, location: StoreLocation) -> Self {
        self.location = location;
        self
    }

    /// Sets whether to sync the log on every commit.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }
}
