//! Open store handle and commit log replay.

use crate::backend::{read_all, StorageBackend};
use crate::error::{StoreError, StoreResult};
use crate::frame::{self, CommitBatch, Frame, LogOp};
use crate::memory::InMemoryBackend;
use crate::table::Table;
use crate::transaction::{Transaction, TxMode};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// An open record store.
///
/// The handle owns the log backend and the committed table rebuilt from it.
/// It is shared by reference (usually behind an `Arc`) across transactions.
///
/// ## Single-Writer Guarantee
///
/// Read-write transactions hold the writer lock from `begin` until they
/// commit, abort, or are dropped. Read-only transactions never wait on the
/// writer.
///
/// ## Snapshots
///
/// The committed table sits behind an `Arc`. `begin` clones the `Arc`, and
/// a commit copies the table only while some transaction still holds the
/// previous version.
pub struct StoreHandle {
    backend: Mutex<Option<Box<dyn StorageBackend>>>,
    table: RwLock<Arc<Table>>,
    writer: Mutex<()>,
    sequence: AtomicU64,
    sync_on_commit: bool,
    closed: AtomicBool,
}

impl StoreHandle {
    /// Opens a handle over `backend`, replaying every committed batch.
    ///
    /// A torn tail batch left by an interrupted commit is truncated away.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corrupted`] if any complete frame fails its
    /// magic or checksum test or cannot be decoded. The log is left exactly
    /// as it was found.
    pub fn open(mut backend: Box<dyn StorageBackend>, sync_on_commit: bool) -> StoreResult<Self> {
        let bytes = read_all(backend.as_ref())?;
        let mut table = Table::default();
        let mut sequence = 0u64;
        let mut batches = 0usize;
        let mut offset = 0usize;

        while offset < bytes.len() {
            let decoded = frame::decode(&bytes[offset..]).inspect_err(|e| {
                tracing::error!(offset, error = %e, "commit log is corrupted");
            })?;
            match decoded {
                Frame::Batch(batch, used) => {
                    sequence = sequence.max(batch.sequence);
                    table.apply(&batch);
                    offset += used;
                    batches += 1;
                }
                Frame::Torn(reason) => {
                    tracing::warn!(offset, %reason, "truncating torn commit log tail");
                    backend.truncate(offset as u64)?;
                    backend.sync()?;
                    break;
                }
            }
        }

        tracing::debug!(batches, records = table.len(), sequence, "replayed commit log");

        Ok(Self {
            backend: Mutex::new(Some(backend)),
            table: RwLock::new(Arc::new(table)),
            writer: Mutex::new(()),
            sequence: AtomicU64::new(sequence),
            sync_on_commit,
            closed: AtomicBool::new(false),
        })
    }

    /// Opens a fresh, empty in-memory handle.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::open(Box::new(InMemoryBackend::new()), false)
    }

    /// Begins a transaction.
    ///
    /// A read-write transaction blocks until the previous writer finishes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Closed`] if the handle has been closed, or was
    /// retired after a commit it could not roll back.
    pub fn begin(&self, mode: TxMode) -> StoreResult<Transaction<'_>> {
        self.ensure_open()?;
        let writer = match mode {
            TxMode::ReadOnly => None,
            TxMode::ReadWrite => {
                let guard = self.writer.lock();
                // close() may have won the lock while we waited
                self.ensure_open()?;
                Some(guard)
            }
        };
        let snapshot = Arc::clone(&*self.table.read());
        Ok(Transaction::new(self, mode, snapshot, writer))
    }

    /// Runs `f` inside a transaction.
    ///
    /// If `f` returns `Ok`, the transaction commits; if it returns `Err`, or
    /// the commit fails, nothing is applied. The outcome is reported once, as
    /// the return value.
    pub fn transact<T, E, F>(&self, mode: TxMode, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Transaction<'_>) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut txn = self.begin(mode)?;
        match f(&mut txn) {
            Ok(value) => {
                txn.commit()?;
                Ok(value)
            }
            Err(e) => {
                txn.abort();
                Err(e)
            }
        }
    }

    /// Returns the sequence number of the last committed batch.
    #[must_use]
    pub fn committed_sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    /// Returns the number of committed records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.read().len()
    }

    /// Returns true if no records are committed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true once [`close`](Self::close) has run, or once a failed
    /// commit could not be rolled back.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Closes the handle.
    ///
    /// Waits for the in-flight writer, if any, to finish against this handle,
    /// then syncs and releases the backend. Idempotent.
    pub fn close(&self) -> StoreResult<()> {
        let _writer = self.writer.lock();
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if let Some(mut backend) = self.backend.lock().take() {
            backend.sync()?;
        }
        tracing::info!(
            records = self.len(),
            sequence = self.committed_sequence(),
            "store handle closed"
        );
        Ok(())
    }

    /// Appends `ops` as one batch and applies it to the committed table.
    ///
    /// Called with the writer lock held by the committing transaction.
    pub(crate) fn commit_ops(&self, ops: Vec<LogOp>) -> StoreResult<u64> {
        let sequence = self.committed_sequence() + 1;
        let batch = CommitBatch { sequence, ops };
        let bytes = frame::encode(&batch)?;

        {
            let mut slot = self.backend.lock();
            let backend = slot.as_mut().ok_or(StoreError::Closed)?;
            let start = backend.size()?;
            let written = match backend.append(&bytes) {
                Ok(_) if self.sync_on_commit => backend.sync(),
                Ok(_) => Ok(()),
                Err(e) => Err(e),
            };
            if let Err(e) = written {
                // a partial batch must never have a later commit behind it
                if let Err(rollback) = backend.truncate(start) {
                    tracing::error!(
                        sequence,
                        offset = start,
                        error = %rollback,
                        "could not roll back failed commit, retiring store handle"
                    );
                    self.closed.store(true, Ordering::SeqCst);
                    drop(slot.take());
                }
                return Err(e);
            }
        }

        Arc::make_mut(&mut self.table.write()).apply(&batch);
        self.sequence.store(sequence, Ordering::SeqCst);
        tracing::debug!(sequence, ops = batch.ops.len(), "committed batch");
        Ok(sequence)
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.is_closed() {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }
}

impl std::fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreHandle")
            .field("records", &self.len())
            .field("sequence", &self.committed_sequence())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
