//! Collection handle.

use crate::database::{Database, Selector};
use crate::document::into_document;
use crate::error::CoreResult;
use crate::key;
use crate::notify::{CollectionChanged, ListenerId};
use crate::tracker::Tracking;
use serde_json::Value;
use std::sync::mpsc::Receiver;
use stowdb_store::Document;

/// A named collection inside a [`crate::Db`].
///
/// All documents of the collection share the namespace `db.collection`.
/// Writes are tracked for sync and announced to the collection's
/// listeners once committed.
#[derive(Debug, Clone)]
pub struct Collection {
    database: Database,
    db_name: String,
    name: String,
    namespace: String,
}

impl Collection {
    pub(crate) fn new(database: Database, db_name: &str, name: &str) -> Self {
        Self {
            database,
            db_name: db_name.to_string(),
            name: name.to_string(),
            namespace: key::namespace(db_name, name),
        }
    }

    /// Returns the collection name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the name of the owning database.
    pub fn db_name(&self) -> &str {
        &self.db_name
    }

    /// Returns the namespace, `db.collection`.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Inserts a document, generating an `_id` when it has none.
    ///
    /// A document with an existing `_id` replaces the stored one.
    /// Returns the stored document.
    pub fn insert(&self, doc: impl Into<Value>) -> CoreResult<Document> {
        let doc = into_document(doc.into())?;
        let mut saved = self
            .database
            .write_documents(&self.namespace, vec![doc], Tracking::Tracked)?;
        Ok(saved.pop().unwrap_or_default())
    }

    /// Inserts several documents in one transaction.
    ///
    /// Either all documents are stored or none is.
    pub fn insert_many<I>(&self, docs: I) -> CoreResult<Vec<Document>>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let docs = docs
            .into_iter()
            .map(|doc| into_document(doc.into()))
            .collect::<CoreResult<Vec<_>>>()?;
        self.database
            .write_documents(&self.namespace, docs, Tracking::Tracked)
    }

    /// Returns the document with id `id`.
    pub fn find_one(&self, id: &str) -> CoreResult<Option<Document>> {
        Ok(self
            .database
            .find_documents(&self.namespace, Selector::Id(id))?
            .pop())
    }

    /// Returns every document, in id order.
    pub fn find_all(&self) -> CoreResult<Vec<Document>> {
        self.find_where(|_| true)
    }

    /// Returns the documents matching `predicate`, in id order.
    pub fn find_where<P>(&self, predicate: P) -> CoreResult<Vec<Document>>
    where
        P: Fn(&Document) -> bool,
    {
        self.database
            .find_documents(&self.namespace, Selector::Matching(&predicate))
    }

    /// Counts the documents.
    pub fn count(&self) -> CoreResult<usize> {
        self.database.count_documents(&self.namespace)
    }

    /// Applies `update` to the document with id `id`.
    ///
    /// Returns the new document, or `None` if there is no such document.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::InvalidMutation`] for a malformed update;
    /// the stored document is left unchanged.
    pub fn update(&self, id: &str, update: impl Into<Value>) -> CoreResult<Option<Document>> {
        let update = into_document(update.into())?;
        self.database
            .modify_document(&self.namespace, Selector::Id(id), &update)
    }

    /// Applies `update` to the first document, in id order, matching `predicate`.
    pub fn find_and_modify<P>(
        &self,
        predicate: P,
        update: impl Into<Value>,
    ) -> CoreResult<Option<Document>>
    where
        P: Fn(&Document) -> bool,
    {
        let update = into_document(update.into())?;
        self.database
            .modify_document(&self.namespace, Selector::Matching(&predicate), &update)
    }

    /// Removes the document with id `id`. Returns the number removed (0 or 1).
    pub fn remove(&self, id: &str) -> CoreResult<usize> {
        self.database
            .remove_documents(&self.namespace, Selector::Id(id), Tracking::Tracked)
    }

    /// Removes every document matching `predicate` in one transaction.
    pub fn remove_where<P>(&self, predicate: P) -> CoreResult<usize>
    where
        P: Fn(&Document) -> bool,
    {
        self.database.remove_documents(
            &self.namespace,
            Selector::Matching(&predicate),
            Tracking::Tracked,
        )
    }

    /// Calls `listener` after every committed write to this collection.
    pub fn listen<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&CollectionChanged) + Send + Sync + 'static,
    {
        self.database
            .notifications()
            .listen(self.namespace.clone(), listener)
    }

    /// Removes a listener registered with [`listen`](Self::listen).
    pub fn unlisten(&self, id: ListenerId) -> bool {
        self.database.notifications().unlisten(id)
    }

    /// Returns a channel receiving an event after every committed write.
    pub fn subscribe(&self) -> Receiver<CollectionChanged> {
        self.database.notifications().subscribe(self.namespace.clone())
    }
}
