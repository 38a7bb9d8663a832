//! # StowDB Core
//!
//! Client-resident document store with local change tracking.
//!
//! Documents are JSON objects grouped into collections; a collection lives
//! in the namespace `db.collection`. On top of the transactional record
//! store this crate provides:
//! - [`Database`], [`Db`] and [`Collection`]: the document API
//! - [`DocumentRepository`]: document reads and writes inside a transaction
//! - [`ChangeTracker`]: pre-images of locally changed documents, for the
//!   sync pusher
//! - [`apply_update`]: `$set`/`$unset` and replacement updates
//! - [`NotificationHub`]: per-namespace change listeners and subscribers
//!
//! ## Example
//!
//! ```rust
//! use serde_json::json;
//! use stowdb_core::Database;
//!
//! let db = Database::open_in_memory().unwrap();
//! let todos = db.collection("app", "todos").unwrap();
//!
//! let todo = todos.insert(json!({"title": "write docs"})).unwrap();
//! let id = todo["_id"].as_str().unwrap();
//!
//! todos.update(id, json!({"$set": {"done": true}})).unwrap();
//! assert_eq!(todos.find_one(id).unwrap().unwrap()["done"], json!(true));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod collection;
mod config;
mod database;
mod document;
mod error;
mod key;
mod mutation;
mod notify;
mod repository;
mod tracker;

pub use collection::Collection;
pub use config::Config;
pub use database::{CollectionInfo, CollectionNames, CollectionNamesOptions, Database, Db};
pub use document::{document_id, ensure_id, generate_id, into_document};
pub use error::{CoreError, CoreResult};
pub use key::{make_key, namespace, namespace_range, split_key, SEPARATOR, SEPARATOR_SUCCESSOR};
pub use mutation::{apply_update, SET, UNSET};
pub use notify::{CollectionChanged, Listener, ListenerId, NotificationHub};
pub use repository::DocumentRepository;
pub use tracker::{ChangeTracker, MetadataRecord, Tracking, METADATA_KEY};

pub use stowdb_store::{Document, StoreConfig, StoreLocation, TxMode};
