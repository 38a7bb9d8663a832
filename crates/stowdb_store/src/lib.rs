//! # StowDB Store
//!
//! Transactional record store for StowDB.
//!
//! This crate owns the composite-keyed record space that the document layer
//! is built on. It provides:
//! - [`Datastore`]: the lazily opened, memoized store handle with an explicit
//!   close/reopen lifecycle
//! - [`Transaction`]: scoped, all-or-nothing access with `get`, `put`,
//!   `delete`, and `scan`
//! - a secondary index on each document's `_id` field ([`ScanFilter::Id`])
//! - log backends ([`InMemoryBackend`], [`FileBackend`]) that hold one framed,
//!   checksummed batch per committed transaction
//!
//! ## Example
//!
//! ```rust
//! use serde_json::json;
//! use stowdb_store::{Datastore, Document, Record, ScanFilter, TxMode};
//!
//! let store = Datastore::in_memory();
//! let handle = store.handle().unwrap();
//!
//! let mut doc = Document::new();
//! doc.insert("_id".into(), json!("a1"));
//! handle
//!     .transact(TxMode::ReadWrite, |txn| {
//!         txn.put("db.users$a1", Record::new("db.users", "a1", doc))
//!     })
//!     .unwrap();
//!
//! let mut txn = handle.begin(TxMode::ReadOnly).unwrap();
//! let hits = txn.scan(&ScanFilter::Id(json!("a1"))).unwrap();
//! assert_eq!(hits.len(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod config;
mod datastore;
mod error;
mod file;
mod frame;
mod handle;
mod memory;
mod record;
mod table;
mod transaction;

pub use backend::StorageBackend;
pub use config::{StoreConfig, StoreLocation};
pub use datastore::Datastore;
pub use error::{StoreError, StoreResult};
pub use file::FileBackend;
pub use frame::{CommitBatch, LogOp, LOG_MAGIC, LOG_VERSION};
pub use handle::StoreHandle;
pub use memory::InMemoryBackend;
pub use record::{index_key, Document, Record, ID_FIELD};
pub use transaction::{ScanFilter, Transaction, TxMode, TxState};
