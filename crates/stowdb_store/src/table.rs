//! Committed record table with its `_id` secondary index.

use crate::frame::{CommitBatch, LogOp};
use crate::record::Record;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

/// Committed state: the primary table ordered by composite key and a
/// non-unique index from `_id` to the composite keys holding it.
#[derive(Debug, Clone, Default)]
pub(crate) struct Table {
    rows: BTreeMap<String, Record>,
    by_id: BTreeMap<String, BTreeSet<String>>,
}

impl Table {
    pub(crate) fn get(&self, key: &str) -> Option<&Record> {
        self.rows.get(key)
    }

    pub(crate) fn len(&self) -> usize {
        self.rows.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&String, &Record)> {
        self.rows.iter()
    }

    /// Rows with `lower <= key < upper`.
    pub(crate) fn range<'a>(
        &'a self,
        lower: &'a str,
        upper: &'a str,
    ) -> Box<dyn Iterator<Item = (&'a String, &'a Record)> + 'a> {
        if lower >= upper {
            return Box::new(std::iter::empty());
        }
        Box::new(
            self.rows
                .range::<str, _>((Bound::Included(lower), Bound::Excluded(upper))),
        )
    }

    /// Rows whose document `_id` renders to `index_key`, in key order.
    pub(crate) fn by_index(&self, index_key: &str) -> impl Iterator<Item = (&String, &Record)> {
        self.by_id
            .get(index_key)
            .into_iter()
            .flatten()
            .filter_map(|key| self.rows.get_key_value(key))
    }

    pub(crate) fn put(&mut self, key: String, record: Record) {
        self.unindex(&key);
        if let Some(index_key) = record.index_key() {
            self.by_id.entry(index_key).or_default().insert(key.clone());
        }
        self.rows.insert(key, record);
    }

    pub(crate) fn delete(&mut self, key: &str) {
        self.unindex(key);
        self.rows.remove(key);
    }

    pub(crate) fn apply(&mut self, batch: &CommitBatch) {
        for op in &batch.ops {
            match op {
                LogOp::Put { key, record } => self.put(key.clone(), record.clone()),
                LogOp::Delete { key } => self.delete(key),
            }
        }
    }

    fn unindex(&mut self, key: &str) {
        let Some(index_key) = self.rows.get(key).and_then(Record::index_key) else {
            return;
        };
        if let Some(keys) = self.by_id.get_mut(&index_key) {
            keys.remove(key);
            if keys.is_empty() {
                self.by_id.remove(&index_key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{index_key, Document};
    use serde_json::json;

    fn record(ns: &str, id: &str) -> Record {
        let mut doc = Document::new();
        doc.insert("_id".into(), json!(id));
        Record::new(ns, id, doc)
    }

    #[test]
    fn index_follows_overwrite_and_delete() {
        let mut table = Table::default();
        table.put("a$1".into(), record("a", "1"));
        table.put("b$1".into(), record("b", "1"));
        assert_eq!(table.by_index(&index_key(&json!("1"))).count(), 2);

        let mut moved = record("a", "1");
        moved.document.insert("_id".into(), json!("2"));
        table.put("a$1".into(), moved);
        assert_eq!(table.by_index(&index_key(&json!("1"))).count(), 1);
        assert_eq!(table.by_index(&index_key(&json!("2"))).count(), 1);

        table.delete("b$1");
        assert_eq!(table.by_index(&index_key(&json!("1"))).count(), 0);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn range_is_half_open() {
        let mut table = Table::default();
        table.put("a$".into(), record("a", ""));
        table.put("a$z".into(), record("a", "z"));
        table.put("a%".into(), record("a", "%"));

        let keys: Vec<_> = table.range("a$", "a%").map(|(k, _)| k.clone()).collect();
        assert_eq!(keys, vec!["a$".to_string(), "a$z".to_string()]);
        assert_eq!(table.range("b", "a").count(), 0);
    }
}
