//! Benchmark utilities.

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::{json, Value};

/// Generates a document with `fields` random string fields of `width` characters.
pub fn random_document(fields: usize, width: usize) -> Value {
    let mut rng = rand::thread_rng();
    let mut doc = serde_json::Map::new();
    for i in 0..fields {
        let text: String = (&mut rng)
            .sample_iter(&Alphanumeric)
            .take(width)
            .map(char::from)
            .collect();
        doc.insert(format!("f{i}"), json!(text));
    }
    Value::Object(doc)
}

/// Generates `count` documents with sequential `_id`s.
pub fn generate_documents(count: usize, fields: usize) -> Vec<Value> {
    (0..count)
        .map(|i| {
            let mut doc = random_document(fields, 16);
            doc["_id"] = json!(format!("doc-{i:06}"));
            doc
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_have_ids_and_fields() {
        let docs = generate_documents(3, 4);
        assert_eq!(docs.len(), 3);
        assert_eq!(docs[2]["_id"], json!("doc-000002"));
        assert_eq!(docs[0].as_object().unwrap().len(), 5);
    }
}
