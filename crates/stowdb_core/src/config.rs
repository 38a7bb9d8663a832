//! Database configuration.

use std::path::Path;
use stowdb_store::{StoreConfig, StoreLocation};

/// Configuration for opening a [`crate::Database`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Backing store configuration.
    pub store: StoreConfig,

    /// Whether writes applied through the sync puller path notify listeners.
    pub notify_remote_writes: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            notify_remote_writes: true,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values (in memory).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an in-memory configuration.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Creates a configuration backed by a log file at `path`.
    #[must_use]
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self {
            store: StoreConfig::file(path),
            ..Self::default()
        }
    }

    /// Sets the backend location.
    #[must_use]
    pub fn location(mut self, location: StoreLocation) -> Self {
        self.store = self.store.location(location);
        self
    }

    /// Sets whether to sync the log on every commit.
    #[must_use]
    pub fn sync_on_commit(mut self, value: bool) -> Self {
        self.store = self.store.sync_on_commit(value);
        self
    }

    /// Sets whether sync-puller writes notify listeners.
    #[must_use]
    pub const fn notify_remote_writes(mut self, value: bool) -> Self {
        self.notify_remote_writes = value;
        self
    }
}
