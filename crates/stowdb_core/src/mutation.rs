//! Update application.
//!
//! An update is either a set of operators (`$set`, `$unset`) or a plain
//! replacement document. The two forms cannot be mixed.

use crate::error::{CoreError, CoreResult};
use serde_json::Value;
use stowdb_store::{Document, ID_FIELD};

/// Operator assigning fields.
pub const SET: &str = "$set";

/// Operator removing fields.
pub const UNSET: &str = "$unset";

/// Applies `update` to `base` and returns the new document.
///
/// Operator updates apply `$set` first, then `$unset`. A replacement
/// update keeps the `_id` of `base` when it has none of its own. No form
/// of update may change `_id`.
///
/// # Errors
///
/// Returns [`CoreError::InvalidMutation`] if operators are mixed with
/// plain fields, an operator is unknown, or an operator argument is not
/// an object.
pub fn apply_update(base: &Document, update: &Document) -> CoreResult<Document> {
    let operators = update.keys().filter(|k| k.starts_with('$')).count();
    if operators == 0 {
        return replace(base, update);
    }
    if operators != update.len() {
        return Err(CoreError::invalid_mutation(
            "cannot mix update operators with literal values",
        ));
    }

    if let Some(unknown) = update.keys().find(|k| *k != SET && *k != UNSET) {
        return Err(CoreError::invalid_mutation(format!(
            "unknown update operator {unknown}"
        )));
    }

    let mut result = base.clone();

    if let Some(fields) = update.get(SET) {
        for (field, value) in operator_fields(SET, fields)? {
            if field == ID_FIELD && base.get(ID_FIELD) != Some(value) {
                return Err(CoreError::invalid_mutation("cannot modify _id"));
            }
            result.insert(field.clone(), value.clone());
        }
    }

    if let Some(fields) = update.get(UNSET) {
        for field in operator_fields(UNSET, fields)?.keys() {
            if field == ID_FIELD {
                return Err(CoreError::invalid_mutation("cannot unset _id"));
            }
            result.remove(field);
        }
    }

    Ok(result)
}

fn replace(base: &Document, update: &Document) -> CoreResult<Document> {
    let mut result = update.clone();
    match (base.get(ID_FIELD), update.get(ID_FIELD)) {
        (Some(id), None) => {
            result.insert(ID_FIELD.to_string(), id.clone());
        }
        (Some(id), Some(new_id)) if id != new_id => {
            return Err(CoreError::invalid_mutation("cannot modify _id"));
        }
        _ => {}
    }
    Ok(result)
}

fn operator_fields<'a>(op: &str, fields: &'a Value) -> CoreResult<&'a Document> {
    fields
        .as_object()
        .ok_or_else(|| CoreError::invalid_mutation(format!("argument of {op} must be an object")))
}
