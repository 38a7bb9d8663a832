//! Database facade.

use crate::collection::Collection;
use crate::config::Config;
use crate::document::{self, into_document};
use crate::error::{CoreError, CoreResult};
use crate::key;
use crate::mutation;
use crate::notify::NotificationHub;
use crate::repository::DocumentRepository;
use crate::tracker::{ChangeTracker, MetadataRecord, Tracking};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use stowdb_store::{Datastore, Document, StoreHandle, Transaction, TxMode, ID_FIELD};

/// The main database handle.
///
/// `Database` owns the lazily opened store, the change set used by the sync
/// pusher, and the notification hub. It is cheap to clone; clones share all
/// state.
///
/// Every document write runs as one read-write transaction that also records
/// the pre-image of the document for sync, so a write and its change entry
/// are applied together or not at all. Listeners of the namespace are
/// notified after the transaction commits.
///
/// ```rust
/// use serde_json::json;
/// use stowdb_core::Database;
///
/// let db = Database::open_in_memory().unwrap();
/// let users = db.collection("app", "users").unwrap();
///
/// let saved = users.insert(json!({"name": "ada"})).unwrap();
/// assert!(saved.contains_key("_id"));
/// assert_eq!(users.count().unwrap(), 1);
/// assert_eq!(db.pending_changes().unwrap().len(), 1);
/// ```
#[derive(Clone)]
pub struct Database {
    inner: Arc<Shared>,
}

struct Shared {
    config: Config,
    store: Datastore,
    hub: NotificationHub,
}

/// Which documents of a namespace an operation applies to.
pub(crate) enum Selector<'a> {
    /// The document with this id.
    Id(&'a str),
    /// Documents matching the predicate, in id order.
    Matching(&'a dyn Fn(&Document) -> bool),
}

impl Database {
    /// Creates a database without opening its store.
    ///
    /// The store opens on the first operation; an unavailable backend is
    /// reported by that operation.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let store = Datastore::new(config.store.clone());
        Self {
            inner: Arc::new(Shared {
                config,
                store,
                hub: NotificationHub::new(),
            }),
        }
    }

    /// Opens a database and its store.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::StoreUnavailable`] if the backend cannot be opened.
    pub fn open(config: Config) -> CoreResult<Self> {
        let db = Self::new(config);
        db.handle()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    pub fn open_in_memory() -> CoreResult<Self> {
        Self::open(Config::in_memory())
    }

    /// Returns the database named `name`.
    pub fn db(&self, name: &str) -> CoreResult<Db> {
        key::validate_name(name)?;
        Ok(Db {
            database: self.clone(),
            name: name.to_string(),
        })
    }

    /// Returns collection `collection` of database `db`.
    pub fn collection(&self, db: &str, collection: &str) -> CoreResult<Collection> {
        self.db(db)?.collection(collection)
    }

    /// Returns the configuration.
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Returns the notification hub.
    pub fn notifications(&self) -> &NotificationHub {
        &self.inner.hub
    }

    /// Returns true if the store is currently open.
    pub fn is_open(&self) -> bool {
        self.inner.store.is_open()
    }

    /// Closes the store.
    ///
    /// Waits for the in-flight write, if any. The next operation reopens the
    /// store. Listeners and subscribers stay registered.
    pub fn close(&self) -> CoreResult<()> {
        self.inner.store.close()?;
        tracing::info!("database closed");
        Ok(())
    }

    /// Runs `f` in a read-write transaction.
    ///
    /// Commits if `f` returns `Ok`, otherwise nothing is applied. Writes
    /// made directly through the transaction are neither tracked nor
    /// announced to listeners.
    ///
    /// `f` must not write through a [`Collection`] of this database: the
    /// collection would wait for the writer lock held by `f`. Reads such as
    /// [`pending_changes`](Self::pending_changes) are fine, even while a
    /// concurrent [`close`](Self::close) waits for `f` to finish.
    pub fn transact<T, F>(&self, f: F) -> CoreResult<T>
    where
        F: FnOnce(&mut Transaction<'_>) -> CoreResult<T>,
    {
        self.handle()?.transact(TxMode::ReadWrite, f)
    }

    /// Runs `f` in a read-only transaction.
    pub fn read<T, F>(&self, f: F) -> CoreResult<T>
    where
        F: FnOnce(&mut Transaction<'_>) -> CoreResult<T>,
    {
        self.handle()?.transact(TxMode::ReadOnly, f)
    }

    /// Returns the current change set.
    pub fn metadata(&self) -> CoreResult<MetadataRecord> {
        self.read(|txn| ChangeTracker::new(txn).load())
    }

    /// Returns the pre-images of every key changed locally since its last
    /// acknowledged push.
    pub fn pending_changes(&self) -> CoreResult<BTreeMap<String, Document>> {
        Ok(self.metadata()?.changes)
    }

    /// Clears the change entry of `storage_key` after the server accepted it.
    ///
    /// Returns false if the key had no pending change.
    pub fn acknowledge_change(&self, storage_key: &str) -> CoreResult<bool> {
        self.transact(|txn| ChangeTracker::new(txn).acknowledge(storage_key))
    }

    /// Stores a document received from the server.
    ///
    /// The write is not tracked. The document must carry an `_id`.
    pub fn apply_remote(&self, namespace: &str, doc: impl Into<Value>) -> CoreResult<Document> {
        let doc = into_document(doc.into())?;
        if doc.get(ID_FIELD).filter(|id| !id.is_null()).is_none() {
            return Err(CoreError::invalid_document("remote document has no _id"));
        }
        let mut saved = self.write_documents(namespace, vec![doc], Tracking::Untracked)?;
        saved
            .pop()
            .ok_or_else(|| CoreError::invalid_document("remote document was not stored"))
    }

    /// Removes a document deleted on the server. The removal is not tracked.
    ///
    /// Returns false if the document did not exist.
    pub fn remove_remote(&self, namespace: &str, id: &str) -> CoreResult<bool> {
        let removed = self.remove_documents(namespace, Selector::Id(id), Tracking::Untracked)?;
        Ok(removed > 0)
    }

    pub(crate) fn handle(&self) -> CoreResult<Arc<StoreHandle>> {
        Ok(self.inner.store.handle()?)
    }

    /// Saves `docs` in one transaction, assigning ids where missing.
    pub(crate) fn write_documents(
        &self,
        namespace: &str,
        docs: Vec<Document>,
        tracking: Tracking,
    ) -> CoreResult<Vec<Document>> {
        key::validate_name(namespace)?;
        let docs: Vec<(String, Document)> = docs
            .into_iter()
            .map(|mut doc| (document::ensure_id(&mut doc), doc))
            .collect();

        let saved = self.transact(|txn| {
            let mut saved = Vec::with_capacity(docs.len());
            for (id, doc) in docs {
                if tracking == Tracking::Tracked {
                    ChangeTracker::new(txn).track(&key::make_key(namespace, &id))?;
                }
                saved.push(DocumentRepository::new(txn).save(namespace, &id, doc)?);
            }
            Ok(saved)
        })?;

        tracing::debug!(namespace, count = saved.len(), ?tracking, "documents written");
        if !saved.is_empty() {
            self.announce(namespace, tracking);
        }
        Ok(saved)
    }

    /// Applies `update` to the first selected document.
    pub(crate) fn modify_document(
        &self,
        namespace: &str,
        selector: Selector<'_>,
        update: &Document,
    ) -> CoreResult<Option<Document>> {
        let modified = self.transact(|txn| {
            let Some((id, base)) = select(txn, namespace, &selector)?.into_iter().next() else {
                return Ok(None);
            };
            let next = mutation::apply_update(&base, update)?;
            ChangeTracker::new(txn).track(&key::make_key(namespace, &id))?;
            Ok(Some(DocumentRepository::new(txn).save(namespace, &id, next)?))
        })?;

        if modified.is_some() {
            tracing::debug!(namespace, "document modified");
            self.announce(namespace, Tracking::Tracked);
        }
        Ok(modified)
    }

    /// Removes every selected document and returns how many were removed.
    pub(crate) fn remove_documents(
        &self,
        namespace: &str,
        selector: Selector<'_>,
        tracking: Tracking,
    ) -> CoreResult<usize> {
        let removed = self.transact(|txn| {
            let targets = select(txn, namespace, &selector)?;
            for (id, _) in &targets {
                if tracking == Tracking::Tracked {
                    ChangeTracker::new(txn).track(&key::make_key(namespace, id))?;
                }
                DocumentRepository::new(txn).remove(namespace, id)?;
            }
            Ok(targets.len())
        })?;

        if removed > 0 {
            tracing::debug!(namespace, removed, ?tracking, "documents removed");
            self.announce(namespace, tracking);
        }
        Ok(removed)
    }

    /// Returns the selected documents of `namespace`.
    pub(crate) fn find_documents(
        &self,
        namespace: &str,
        selector: Selector<'_>,
    ) -> CoreResult<Vec<Document>> {
        self.read(|txn| {
            Ok(select(txn, namespace, &selector)?
                .into_iter()
                .map(|(_, doc)| doc)
                .collect())
        })
    }

    pub(crate) fn count_documents(&self, namespace: &str) -> CoreResult<usize> {
        self.read(|txn| DocumentRepository::new(txn).count_by_namespace(namespace))
    }

    fn announce(&self, namespace: &str, tracking: Tracking) {
        if tracking == Tracking::Tracked || self.inner.config.notify_remote_writes {
            self.inner.hub.notify(namespace);
        }
    }
}

fn select(
    txn: &mut Transaction<'_>,
    namespace: &str,
    selector: &Selector<'_>,
) -> CoreResult<Vec<(String, Document)>> {
    let mut repo = DocumentRepository::new(txn);
    match selector {
        Selector::Id(id) => Ok(repo
            .load(namespace, id)?
            .map(|doc| vec![((*id).to_string(), doc)])
            .unwrap_or_default()),
        Selector::Matching(predicate) => Ok(repo
            .scan_namespace(namespace)?
            .into_iter()
            .filter(|record| predicate(&record.document))
            .map(|record| (record.document_id, record.document))
            .collect()),
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("store", &self.inner.store)
            .field("hub", &self.inner.hub)
            .finish()
    }
}

/// Options for [`Db::collection_names`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionNamesOptions {
    /// Only report collections whose name starts with this string.
    pub collection_filter: Option<String>,
    /// Report bare names instead of [`CollectionInfo`] entries.
    pub names_only: bool,
}

impl CollectionNamesOptions {
    /// Creates options reporting every collection as [`CollectionInfo`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts the result to collections whose name starts with `prefix`.
    #[must_use]
    pub fn collection_filter(mut self, prefix: impl Into<String>) -> Self {
        self.collection_filter = Some(prefix.into());
        self
    }

    /// Reports bare names.
    #[must_use]
    pub const fn names_only(mut self, value: bool) -> Self {
        self.names_only = value;
        self
    }
}

/// Description of one collection.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct CollectionInfo {
    /// Collection name, without the database prefix.
    pub name: String,
}

/// Result of [`Db::collection_names`], sorted by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionNames {
    /// Bare names.
    Names(Vec<String>),
    /// One entry per collection.
    Infos(Vec<CollectionInfo>),
}

impl CollectionNames {
    /// Returns the names, whatever the representation.
    pub fn names(&self) -> Vec<&str> {
        match self {
            Self::Names(names) => names.iter().map(String::as_str).collect(),
            Self::Infos(infos) => infos.iter().map(|info| info.name.as_str()).collect(),
        }
    }

    /// Returns the number of collections.
    pub fn len(&self) -> usize {
        match self {
            Self::Names(names) => names.len(),
            Self::Infos(infos) => infos.len(),
        }
    }

    /// Returns true if there are no collections.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A named database: a group of collections sharing a namespace prefix.
#[derive(Debug, Clone)]
pub struct Db {
    database: Database,
    name: String,
}

impl Db {
    /// Returns the database name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns collection `name` of this database.
    pub fn collection(&self, name: &str) -> CoreResult<Collection> {
        key::validate_name(name)?;
        Ok(Collection::new(self.database.clone(), &self.name, name))
    }

    /// Lists the collections of this database that hold at least one document.
    pub fn collection_names(&self, options: &CollectionNamesOptions) -> CoreResult<CollectionNames> {
        let db_prefix = format!("{}.", self.name);
        let prefix = format!(
            "{db_prefix}{}",
            options.collection_filter.as_deref().unwrap_or_default()
        );

        let names: BTreeSet<String> = self.database.read(|txn| {
            Ok(DocumentRepository::new(txn)
                .scan_by_namespace_prefix(&prefix)?
                .into_iter()
                .filter_map(|record| {
                    record
                        .namespace
                        .strip_prefix(db_prefix.as_str())
                        .map(str::to_string)
                })
                .collect())
        })?;

        Ok(if options.names_only {
            CollectionNames::Names(names.into_iter().collect())
        } else {
            CollectionNames::Infos(
                names
                    .into_iter()
                    .map(|name| CollectionInfo { name })
                    .collect(),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stowdb_store::StoreLocation;

    #[test]
    fn unavailable_store_is_reported() {
        let config = Config::in_memory().location(StoreLocation::Unavailable);
        assert!(matches!(
            Database::open(config.clone()),
            Err(CoreError::StoreUnavailable { .. })
        ));

        let db = Database::new(config);
        let users = db.collection("app", "users").unwrap();
        assert!(matches!(
            users.insert(json!({"a": 1})),
            Err(CoreError::StoreUnavailable { .. })
        ));
    }

    #[test]
    fn invalid_names_are_rejected() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.db("a$b").is_err());
        assert!(db.collection("app", "").is_err());
    }

    #[test]
    fn collection_names_are_sorted_and_unique() {
        let db = Database::open_in_memory().unwrap();
        for coll in ["zeta", "alpha", "alpha", "beta"] {
            db.collection("app", coll)
                .unwrap()
                .insert(json!({"n": 1}))
                .unwrap();
        }
        db.collection("other", "gamma")
            .unwrap()
            .insert(json!({"n": 1}))
            .unwrap();

        let app = db.db("app").unwrap();
        let names = app
            .collection_names(&CollectionNamesOptions::new().names_only(true))
            .unwrap();
        assert_eq!(
            names,
            CollectionNames::Names(vec!["alpha".into(), "beta".into(), "zeta".into()])
        );

        let infos = app
            .collection_names(&CollectionNamesOptions::new().collection_filter("a"))
            .unwrap();
        assert_eq!(
            infos,
            CollectionNames::Infos(vec![CollectionInfo {
                name: "alpha".into()
            }])
        );
    }

    #[test]
    fn collection_names_ignore_prefix_sharing_databases() {
        let db = Database::open_in_memory().unwrap();
        db.collection("app", "a").unwrap().insert(json!({})).unwrap();
        db.collection("app2", "b").unwrap().insert(json!({})).unwrap();

        let names = db
            .db("app")
            .unwrap()
            .collection_names(&CollectionNamesOptions::new())
            .unwrap();
        assert_eq!(names.names(), vec!["a"]);
    }

    #[test]
    fn remote_writes_are_untracked() {
        let db = Database::open_in_memory().unwrap();
        db.apply_remote("app.users", json!({"_id": "u1", "n": 1}))
            .unwrap();
        assert!(db.pending_changes().unwrap().is_empty());

        assert!(db.remove_remote("app.users", "u1").unwrap());
        assert!(!db.remove_remote("app.users", "u1").unwrap());
        assert!(db.pending_changes().unwrap().is_empty());
    }

    #[test]
    fn remote_documents_need_an_id() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            db.apply_remote("app.users", json!({"n": 1})),
            Err(CoreError::InvalidDocument { .. })
        ));
    }

    #[test]
    fn remote_write_notifications_follow_config() {
        let db = Database::open(Config::in_memory().notify_remote_writes(false)).unwrap();
        let rx = db.notifications().subscribe("app.users");

        db.apply_remote("app.users", json!({"_id": "u1"})).unwrap();
        assert!(rx.try_recv().is_err());

        db.collection("app", "users")
            .unwrap()
            .insert(json!({"_id": "u2"}))
            .unwrap();
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn acknowledge_clears_entry() {
        let db = Database::open_in_memory().unwrap();
        db.collection("app", "users")
            .unwrap()
            .insert(json!({"_id": "u1"}))
            .unwrap();

        assert!(db.acknowledge_change("app.users$u1").unwrap());
        assert!(!db.acknowledge_change("app.users$u1").unwrap());
        assert!(db.pending_changes().unwrap().is_empty());
    }
}
