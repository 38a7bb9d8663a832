//! Document identity helpers.

use crate::error::{CoreError, CoreResult};
use serde_json::Value;
use stowdb_store::{Document, ID_FIELD};
use uuid::Uuid;

/// Generates a random document id.
///
/// The id is a version 4 UUID in its 36 character hyphenated lowercase form.
#[must_use]
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// Converts a JSON value into a document.
pub fn into_document(value: Value) -> CoreResult<Document> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(CoreError::invalid_document(format!(
            "expected an object, got {other}"
        ))),
    }
}

/// Makes sure `doc` carries an `_id`, generating one when it is missing or null.
///
/// Returns the document id derived from the `_id` value.
pub fn ensure_id(doc: &mut Document) -> String {
    match doc.get(ID_FIELD) {
        Some(value) if !value.is_null() => document_id(value),
        _ => {
            let id = generate_id();
            doc.insert(ID_FIELD.to_string(), Value::String(id.clone()));
            id
        }
    }
}

/// Renders an `_id` value as the id part of a storage key.
///
/// Strings are used as-is; any other value uses its JSON text.
#[must_use]
pub fn document_id(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
