//! Local change tracking for the sync pusher.
//!
//! The first local write to a key since the last acknowledged push records
//! the document as it looked before that write (its pre-image). Later writes
//! leave the pre-image alone, so the entry always describes the last state
//! the server is known to have.
//!
//! Each entry is its own record at `$metadata$<composite key>`, so tracking
//! a write costs one small record no matter how many keys are dirty.

use crate::error::CoreResult;
use crate::key;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use stowdb_store::{Document, Record, ScanFilter, Transaction};

/// Key prefix of the change entries.
///
/// It has an empty namespace, so no collection scan ever returns an entry.
pub const METADATA_KEY: &str = "$metadata";

/// Whether a write is recorded in the change set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tracking {
    /// Local write: the pre-image is recorded if the key is not yet dirty.
    #[default]
    Tracked,
    /// Write coming from the sync puller: nothing is recorded.
    Untracked,
}

/// The change set, assembled from every stored change entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    /// Pre-images by composite key. An empty document means the key did not exist.
    #[serde(default)]
    pub changes: BTreeMap<String, Document>,
}

impl MetadataRecord {
    /// Returns true if `key` has an unacknowledged local change.
    #[must_use]
    pub fn is_dirty(&self, key: &str) -> bool {
        self.changes.contains_key(key)
    }
}

/// One stored change entry.
#[derive(Debug, Serialize, Deserialize)]
struct ChangeEntry {
    key: String,
    before: Document,
}

fn entry_key(storage_key: &str) -> String {
    key::make_key(METADATA_KEY, storage_key)
}

/// Records pre-images inside the caller's transaction.
pub struct ChangeTracker<'t, 'h> {
    txn: &'t mut Transaction<'h>,
}

impl<'t, 'h> ChangeTracker<'t, 'h> {
    /// Wraps a transaction.
    pub fn new(txn: &'t mut Transaction<'h>) -> Self {
        Self { txn }
    }

    /// Collects every change entry, or an empty set if there are none.
    pub fn load(&mut self) -> CoreResult<MetadataRecord> {
        let (lower, upper) = key::namespace_range(METADATA_KEY);
        let mut changes = BTreeMap::new();
        for record in self.txn.scan(&ScanFilter::range(lower, upper))? {
            let entry: ChangeEntry =
                serde_json::from_value(serde_json::Value::Object(record.document))?;
            changes.insert(entry.key, entry.before);
        }
        Ok(MetadataRecord { changes })
    }

    /// Returns true if `key` has an unacknowledged local change.
    pub fn is_dirty(&mut self, storage_key: &str) -> CoreResult<bool> {
        Ok(self.txn.get(&entry_key(storage_key))?.is_some())
    }

    /// Records the current state of `key` unless it is already dirty.
    ///
    /// Must run before the write it tracks, in the same transaction.
    /// Returns true if a pre-image was recorded by this call.
    pub fn track(&mut self, storage_key: &str) -> CoreResult<bool> {
        if self.is_dirty(storage_key)? {
            return Ok(false);
        }

        let before = self
            .txn
            .get(storage_key)?
            .map(|r| r.document)
            .unwrap_or_default();
        let entry = ChangeEntry {
            key: storage_key.to_string(),
            before,
        };
        let document = match serde_json::to_value(&entry)? {
            serde_json::Value::Object(map) => map,
            _ => Document::new(),
        };

        let entry_key = entry_key(storage_key);
        let (namespace, id) = key::split_key(&entry_key).unwrap_or(("", storage_key));
        let record = Record::new(namespace, id, document);
        self.txn.put(entry_key, record)?;
        tracing::trace!(key = storage_key, "recorded pre-image");
        Ok(true)
    }

    /// Clears the change entry of `key` after a successful push.
    ///
    /// Returns false if the key was not dirty.
    pub fn acknowledge(&mut self, storage_key: &str) -> CoreResult<bool> {
        if !self.is_dirty(storage_key)? {
            return Ok(false);
        }
        self.txn.delete(entry_key(storage_key))?;
        Ok(true)
    }
}
