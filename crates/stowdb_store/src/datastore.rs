//! Lazily opened, shareable store handle with close/reopen lifecycle.

use crate::backend::StorageBackend;
use crate::config::{StoreConfig, StoreLocation};
use crate::error::{StoreError, StoreResult};
use crate::file::FileBackend;
use crate::handle::StoreHandle;
use crate::memory::InMemoryBackend;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Owner of the single backing store handle.
///
/// The first call to [`handle`](Self::handle) opens the backend and replays
/// the log; every later call returns the same `Arc<StoreHandle>`. Callers
/// racing on the first open block on the same initialization rather than
/// running it twice. [`close`](Self::close) releases the handle, and the next
/// `handle()` performs a fresh open.
///
/// Transactions keep the `Arc` they started with, so a close never switches
/// the handle under an in-flight transaction: close waits for the active
/// writer to finish first. Until it does, `handle()` keeps returning the
/// handle being closed, so the writer can still read through it.
///
/// # Example
///
/// ```rust
/// use stowdb_store::{Datastore, TxMode};
///
/// let store = Datastore::in_memory();
/// let handle = store.handle().unwrap();
/// let mut txn = handle.begin(TxMode::ReadOnly).unwrap();
/// assert!(txn.get("db.c$1").unwrap().is_none());
/// ```
pub struct Datastore {
    config: StoreConfig,
    /// Backing buffer for `StoreLocation::Memory`, shared by every open.
    memory: InMemoryBackend,
    slot: Mutex<Option<Arc<StoreHandle>>>,
    opens: AtomicUsize,
}

impl Datastore {
    /// Creates a datastore; nothing is opened until the first `handle()`.
    #[must_use]
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            memory: InMemoryBackend::new(),
            slot: Mutex::new(None),
            opens: AtomicUsize::new(0),
        }
    }

    /// Creates an in-memory datastore.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(StoreConfig::default())
    }

    /// Returns the open handle, opening the backend on first use.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the configured backend cannot
    /// be provided. A failed open is not memoized; the next call retries.
    pub fn handle(&self) -> StoreResult<Arc<StoreHandle>> {
        let mut slot = self.slot.lock();
        if let Some(handle) = slot.as_ref() {
            if !handle.is_closed() {
                return Ok(Arc::clone(handle));
            }
        }

        let handle = Arc::new(self.open_handle()?);
        *slot = Some(Arc::clone(&handle));
        Ok(handle)
    }

    /// Closes the current handle, if one is open.
    ///
    /// Blocks until the in-flight read-write transaction, if any, finishes.
    /// The slot stays unlocked meanwhile, since that writer may itself call
    /// [`handle`](Self::handle) before it can finish.
    pub fn close(&self) -> StoreResult<()> {
        let Some(handle) = self.slot.lock().clone() else {
            return Ok(());
        };
        handle.close()?;

        let mut slot = self.slot.lock();
        // a racing handle() may already have reopened
        if slot.as_ref().is_some_and(|current| Arc::ptr_eq(current, &handle)) {
            *slot = None;
        }
        Ok(())
    }

    /// Returns true if a handle is currently open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.slot
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_closed())
    }

    /// Returns how many times the backend has been opened.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn open_handle(&self) -> StoreResult<StoreHandle> {
        let backend: Box<dyn StorageBackend> = match &self.config.location {
            StoreLocation::Memory => Box::new(self.memory.clone()),
            StoreLocation::File(path) => {
                let backend = FileBackend::open(path).map_err(|e| match e {
                    StoreError::Unavailable { .. } => e,
                    other => StoreError::unavailable(format!(
                        "cannot open {}: {other}",
                        path.display()
                    )),
                })?;
                Box::new(backend)
            }
            StoreLocation::Unavailable => {
                return Err(StoreError::unavailable(
                    "no persistent store backend in this environment",
                ))
            }
        };

        self.opens.fetch_add(1, Ordering::SeqCst);
        tracing::info!(location = ?self.config.location, "opening store");
        StoreHandle::open(backend, self.config.sync_on_commit)
    }
}

impl std::fmt::Debug for Datastore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Datastore")
            .field("location", &self.config.location)
            .field("open", &self.is_open())
            .field("opens", &self.open_count())
            .finish_non_exhaustive()
    }
}
