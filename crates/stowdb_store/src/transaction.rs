//! Scoped transactions over the record space.

use crate::error::{StoreError, StoreResult};
use crate::frame::LogOp;
use crate::handle::StoreHandle;
use crate::record::{index_key, Record};
use crate::table::Table;
use parking_lot::MutexGuard;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Access mode of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxMode {
    /// Reads only; never blocks writers.
    ReadOnly,
    /// Reads and writes; read-write transactions run one at a time.
    ReadWrite,
}

/// Lifecycle state of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    /// Operations may still be issued.
    Active,
    /// All writes were applied.
    Committed,
    /// No writes were applied.
    Aborted,
}

/// Which records a scan yields.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanFilter {
    /// Every record, by composite key ascending.
    All,
    /// Records with `lower <= key < upper`, by composite key ascending.
    Range {
        /// Inclusive lower bound.
        lower: String,
        /// Exclusive upper bound.
        upper: String,
    },
    /// Records whose document `_id` equals the value, in index order.
    Id(Value),
}

impl ScanFilter {
    /// Creates a half-open key range filter.
    pub fn range(lower: impl Into<String>, upper: impl Into<String>) -> Self {
        Self::Range {
            lower: lower.into(),
            upper: upper.into(),
        }
    }

    fn matches(&self, key: &str, record: &Record) -> bool {
        match self {
            Self::All => true,
            Self::Range { lower, upper } => lower.as_str() <= key && key < upper.as_str(),
            Self::Id(value) => record.index_key().as_deref() == Some(index_key(value).as_str()),
        }
    }
}

/// A transaction against one [`StoreHandle`].
///
/// Writes are buffered and become visible to other transactions only on
/// [`commit`](Self::commit), as a single atomic batch. If any operation
/// fails, the transaction is poisoned: later operations fail and `commit`
/// returns [`StoreError::TransactionAborted`] without applying anything.
/// Dropping a transaction that was never committed aborts it.
///
/// Every read goes against the committed table as it stood at `begin`,
/// so a transaction never observes a commit that lands while it runs.
///
/// A read-write transaction holds the handle's writer lock for its whole
/// lifetime, so read-write transactions serialize against each other.
pub struct Transaction<'h> {
    handle: &'h StoreHandle,
    mode: TxMode,
    state: TxState,
    snapshot: Arc<Table>,
    /// Pending writes by composite key, tagged with the write sequence
    /// that orders the commit batch; `None` is a delete.
    writes: BTreeMap<String, (u64, Option<Record>)>,
    next_write: u64,
    failure: Option<String>,
    _writer: Option<MutexGuard<'h, ()>>,
}

impl<'h> Transaction<'h> {
    pub(crate) fn new(
        handle: &'h StoreHandle,
        mode: TxMode,
        snapshot: Arc<Table>,
        writer: Option<MutexGuard<'h, ()>>,
    ) -> Self {
        Self {
            handle,
            mode,
            state: TxState::Active,
            snapshot,
            writes: BTreeMap::new(),
            next_write: 0,
            failure: None,
            _writer: writer,
        }
    }

    /// Returns the access mode.
    #[must_use]
    pub fn mode(&self) -> TxMode {
        self.mode
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> TxState {
        self.state
    }

    /// Reads the record at `key`, including this transaction's own writes.
    pub fn get(&mut self, key: &str) -> StoreResult<Option<Record>> {
        self.check(false)?;
        if let Some((_, pending)) = self.writes.get(key) {
            return Ok(pending.clone());
        }
        Ok(self.snapshot.get(key).cloned())
    }

    /// Inserts or overwrites the record at `key`.
    pub fn put(&mut self, key: impl Into<String>, record: Record) -> StoreResult<()> {
        self.check(true)?;
        self.stage(key.into(), Some(record));
        Ok(())
    }

    /// Deletes the record at `key`. Deleting an absent key is not an error.
    pub fn delete(&mut self, key: impl Into<String>) -> StoreResult<()> {
        self.check(true)?;
        self.stage(key.into(), None);
        Ok(())
    }

    /// Returns the records matching `filter`, with this transaction's own
    /// writes applied.
    ///
    /// Every call produces a fresh sequence.
    pub fn scan(&mut self, filter: &ScanFilter) -> StoreResult<Vec<Record>> {
        self.check(false)?;
        let table = &self.snapshot;
        let committed: Box<dyn Iterator<Item = (&String, &Record)> + '_> = match filter {
            ScanFilter::All => Box::new(table.iter()),
            ScanFilter::Range { lower, upper } => table.range(lower, upper),
            ScanFilter::Id(value) => Box::new(table.by_index(&index_key(value))),
        };
        let mut found: BTreeMap<String, Record> = committed
            .map(|(k, r)| (k.clone(), r.clone()))
            .collect();

        for (key, (_, pending)) in &self.writes {
            found.remove(key);
            if let Some(record) = pending {
                if filter.matches(key, record) {
                    found.insert(key.clone(), record.clone());
                }
            }
        }

        Ok(found.into_values().collect())
    }

    /// Counts the records matching `filter`.
    pub fn count(&mut self, filter: &ScanFilter) -> StoreResult<usize> {
        Ok(self.scan(filter)?.len())
    }

    /// Marks the transaction as failed so that it can no longer commit.
    pub fn poison(&mut self, reason: impl Into<String>) {
        if self.failure.is_none() {
            self.failure = Some(reason.into());
        }
    }

    /// Commits all pending writes atomically and returns the commit sequence.
    ///
    /// Read-only transactions and transactions without writes commit
    /// without touching the log.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::TransactionAborted`] if an earlier operation
    /// failed or the batch could not be made durable. Nothing is applied in
    /// either case.
    pub fn commit(mut self) -> StoreResult<u64> {
        if let Some(reason) = self.failure.take() {
            self.state = TxState::Aborted;
            return Err(StoreError::transaction_aborted(reason));
        }
        if self.state != TxState::Active {
            return Err(StoreError::invalid_operation("transaction not active"));
        }

        if self.writes.is_empty() {
            self.state = TxState::Committed;
            return Ok(self.handle.committed_sequence());
        }

        let mut staged: Vec<_> = std::mem::take(&mut self.writes).into_iter().collect();
        staged.sort_unstable_by_key(|(_, (seq, _))| *seq);
        let ops = staged
            .into_iter()
            .map(|(key, (_, pending))| match pending {
                Some(record) => LogOp::Put { key, record },
                None => LogOp::Delete { key },
            })
            .collect();

        match self.handle.commit_ops(ops) {
            Ok(sequence) => {
                self.state = TxState::Committed;
                Ok(sequence)
            }
            Err(e) => {
                self.state = TxState::Aborted;
                Err(StoreError::transaction_aborted(e.to_string()))
            }
        }
    }

    /// Discards all pending writes.
    pub fn abort(mut self) {
        self.discard();
    }

    fn discard(&mut self) {
        if self.state == TxState::Active {
            if !self.writes.is_empty() {
                tracing::debug!(pending = self.writes.len(), "aborting transaction");
            }
            self.writes.clear();
            self.state = TxState::Aborted;
        }
    }

    /// Rewriting a key moves it to the end of the commit order.
    fn stage(&mut self, key: String, pending: Option<Record>) {
        self.next_write += 1;
        self.writes.insert(key, (self.next_write, pending));
    }

    fn check(&mut self, write: bool) -> StoreResult<()> {
        if let Some(reason) = &self.failure {
            return Err(StoreError::transaction_aborted(reason.clone()));
        }
        let outcome = if self.state != TxState::Active {
            Err(StoreError::invalid_operation("transaction not active"))
        } else if self.handle.is_closed() {
            Err(StoreError::Closed)
        } else if write && self.mode == TxMode::ReadOnly {
            Err(StoreError::invalid_operation(
                "write issued in a read-only transaction",
            ))
        } else {
            Ok(())
        };

        if let Err(e) = &outcome {
            self.poison(e.to_string());
        }
        outcome
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        self.discard();
    }
}

impl std::fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("mode", &self.mode)
            .field("state", &self.state)
            .field("writes", &self.writes.len())
            .field("failure", &self.failure)
            .finish()
    }
}
