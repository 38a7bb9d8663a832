//! Document persistence on top of a store transaction.

use crate::error::CoreResult;
use crate::key;
use serde_json::Value;
use stowdb_store::{Document, Record, ScanFilter, Transaction};

/// Reads and writes documents through one transaction.
///
/// The repository borrows the transaction, so several repository and
/// tracker calls can share one atomic unit of work:
///
/// ```rust
/// use serde_json::json;
/// use stowdb_core::DocumentRepository;
/// use stowdb_store::{Datastore, TxMode};
///
/// let store = Datastore::in_memory();
/// let handle = store.handle().unwrap();
/// handle
///     .transact(TxMode::ReadWrite, |txn| {
///         let mut repo = DocumentRepository::new(txn);
///         let doc = json!({"_id": "a", "n": 1}).as_object().unwrap().clone();
///         repo.save("db.c", "a", doc)
///     })
///     .unwrap();
/// ```
pub struct DocumentRepository<'t, 'h> {
    txn: &'t mut Transaction<'h>,
}

impl<'t, 'h> DocumentRepository<'t, 'h> {
    /// Wraps a transaction.
    pub fn new(txn: &'t mut Transaction<'h>) -> Self {
        Self { txn }
    }

    /// Loads the document stored under `(namespace, id)`.
    pub fn load(&mut self, namespace: &str, id: &str) -> CoreResult<Option<Document>> {
        let record = self.txn.get(&key::make_key(namespace, id))?;
        Ok(record.map(|r| r.document))
    }

    /// Stores `doc` under `(namespace, id)`, replacing any previous document.
    ///
    /// Returns the stored document.
    pub fn save(&mut self, namespace: &str, id: &str, doc: Document) -> CoreResult<Document> {
        self.txn.put(
            key::make_key(namespace, id),
            Record::new(namespace, id, doc.clone()),
        )?;
        Ok(doc)
    }

    /// Deletes the document stored under `(namespace, id)`. Absent documents are ignored.
    pub fn remove(&mut self, namespace: &str, id: &str) -> CoreResult<()> {
        self.txn.delete(key::make_key(namespace, id))?;
        Ok(())
    }

    /// Returns every document record whose namespace starts with `prefix`.
    ///
    /// Change entries have an empty namespace and are never returned.
    pub fn scan_by_namespace_prefix(&mut self, prefix: &str) -> CoreResult<Vec<Record>> {
        let filter = match key::prefix_upper_bound(prefix) {
            Some(upper) => ScanFilter::range(prefix, upper),
            None => ScanFilter::All,
        };
        let records = self.txn.scan(&filter)?;
        Ok(records
            .into_iter()
            .filter(|r| !r.namespace.is_empty() && r.namespace.starts_with(prefix))
            .collect())
    }

    /// Returns the records of exactly one namespace, in document id order.
    pub fn scan_namespace(&mut self, namespace: &str) -> CoreResult<Vec<Record>> {
        let (lower, upper) = key::namespace_range(namespace);
        Ok(self.txn.scan(&ScanFilter::range(lower, upper))?)
    }

    /// Counts the records of exactly one namespace.
    ///
    /// Sibling namespaces that extend this one (`db.coll2` for `db.coll`)
    /// are not counted.
    pub fn count_by_namespace(&mut self, namespace: &str) -> CoreResult<usize> {
        let (lower, upper) = key::namespace_range(namespace);
        Ok(self.txn.count(&ScanFilter::range(lower, upper))?)
    }

    /// Returns every record, in any namespace, whose document `_id` equals `id`.
    pub fn find_by_id(&mut self, id: &Value) -> CoreResult<Vec<Record>> {
        Ok(self.txn.scan(&ScanFilter::Id(id.clone()))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::into_document;
    use serde_json::json;
    use stowdb_store::{StoreHandle, TxMode};

    fn doc(value: Value) -> Document {
        into_document(value).unwrap()
    }

    fn seeded() -> StoreHandle {
        let handle = StoreHandle::open_in_memory().unwrap();
        handle
            .transact(TxMode::ReadWrite, |txn| {
                let mut repo = DocumentRepository::new(txn);
                repo.save("db.coll", "1", doc(json!({"_id": "1"})))?;
                repo.save("db.coll", "2", doc(json!({"_id": "2"})))?;
                repo.save("db.coll2", "1", doc(json!({"_id": "1"})))?;
                repo.save("other.coll", "3", doc(json!({"_id": "3"})))?;
                txn.put(
                    "$metadata$db.coll$1",
                    Record::new(
                        "",
                        "metadata$db.coll$1",
                        doc(json!({"key": "db.coll$1", "before": {"_id": "1"}})),
                    ),
                )?;
                Ok::<_, crate::CoreError>(())
            })
            .unwrap();
        handle
    }

    #[test]
    fn load_save_remove() {
        let handle = seeded();
        let mut txn = handle.begin(TxMode::ReadWrite).unwrap();
        let mut repo = DocumentRepository::new(&mut txn);

        assert_eq!(repo.load("db.coll", "1").unwrap(), Some(doc(json!({"_id": "1"}))));
        assert_eq!(repo.load("db.coll", "9").unwrap(), None);

        repo.remove("db.coll", "1").unwrap();
        repo.remove("db.coll", "9").unwrap();
        assert_eq!(repo.load("db.coll", "1").unwrap(), None);
    }

    #[test]
    fn count_does_not_include_sibling_namespace() {
        let handle = seeded();
        let mut txn = handle.begin(TxMode::ReadOnly).unwrap();
        let mut repo = DocumentRepository::new(&mut txn);

        assert_eq!(repo.count_by_namespace("db.coll").unwrap(), 2);
        assert_eq!(repo.count_by_namespace("db.coll2").unwrap(), 1);
        assert_eq!(repo.count_by_namespace("db.none").unwrap(), 0);
        assert_eq!(repo.scan_namespace("db.coll").unwrap().len(), 2);
    }

    #[test]
    fn prefix_scan_skips_metadata() {
        let handle = seeded();
        let mut txn = handle.begin(TxMode::ReadOnly).unwrap();
        let mut repo = DocumentRepository::new(&mut txn);

        assert_eq!(repo.scan_by_namespace_prefix("db.").unwrap().len(), 3);
        assert_eq!(repo.scan_by_namespace_prefix("db.coll").unwrap().len(), 3);
        assert_eq!(repo.scan_by_namespace_prefix("").unwrap().len(), 4);
    }

    #[test]
    fn find_by_id_spans_namespaces() {
        let handle = seeded();
        let mut txn = handle.begin(TxMode::ReadOnly).unwrap();
        let mut repo = DocumentRepository::new(&mut txn);

        let hits = repo.find_by_id(&json!("1")).unwrap();
        let namespaces: Vec<_> = hits.iter().map(|r| r.namespace.as_str()).collect();
        assert_eq!(namespaces, vec!["db.coll", "db.coll2"]);
        assert!(repo.find_by_id(&json!(1)).unwrap().is_empty());
    }
}
