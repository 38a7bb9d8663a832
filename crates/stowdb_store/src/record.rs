//! Stored record type.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A JSON-like document.
pub type Document = Map<String, Value>;

/// Name of the document field covered by the secondary index.
pub const ID_FIELD: &str = "_id";

/// One row of the record space, stored under its composite key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Namespace (`database.collection`) the document belongs to.
    pub namespace: String,
    /// Identifier of the document within its namespace.
    pub document_id: String,
    /// The document itself.
    pub document: Document,
}

impl Record {
    /// Creates a record.
    pub fn new(
        namespace: impl Into<String>,
        document_id: impl Into<String>,
        document: Document,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            document_id: document_id.into(),
            document,
        }
    }

    /// Returns the secondary index key of this record, if its document has an `_id`.
    #[must_use]
    pub fn index_key(&self) -> Option<String> {
        self.document.get(ID_FIELD).map(index_key)
    }
}

/// Renders an `_id` value as a secondary index key.
///
/// The JSON text is used so that `"1"` and `1` stay distinct.
#[must_use]
pub fn index_key(value: &Value) -> String {
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn index_key_distinguishes_types() {
        assert_ne!(index_key(&json!("1")), index_key(&json!(1)));
    }

    #[test]
    fn record_without_id_has_no_index_key() {
        let record = Record::new("db.c", "x", Document::new());
        assert!(record.index_key().is_none());

        let mut doc = Document::new();
        doc.insert(ID_FIELD.into(), json!("abc"));
        let record = Record::new("db.c", "abc", doc);
        assert_eq!(record.index_key().as_deref(), Some("\"abc\""));
    }
}
