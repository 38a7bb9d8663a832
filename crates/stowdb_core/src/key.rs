//! Composite key encoding.
//!
//! Every record lives under `<namespace>$<document_id>`. Namespaces never
//! contain `$`, so the first `$` always splits a key.

use crate::error::{CoreError, CoreResult};

/// Separator between namespace and document id.
pub const SEPARATOR: char = '$';

/// The character that sorts immediately after [`SEPARATOR`].
///
/// `[ns + '$', ns + '%')` covers exactly the keys of namespace `ns`.
pub const SEPARATOR_SUCCESSOR: char = '%';

/// Builds the namespace of a collection.
#[must_use]
pub fn namespace(db_name: &str, collection_name: &str) -> String {
    format!("{db_name}.{collection_name}")
}

/// Builds the composite storage key.
#[must_use]
pub fn make_key(namespace: &str, document_id: &str) -> String {
    let mut key = String::with_capacity(namespace.len() + 1 + document_id.len());
    key.push_str(namespace);
    key.push(SEPARATOR);
    key.push_str(document_id);
    key
}

/// Splits a composite key into `(namespace, document_id)`.
///
/// Returns `None` for keys without a separator.
#[must_use]
pub fn split_key(key: &str) -> Option<(&str, &str)> {
    key.split_once(SEPARATOR)
}

/// Returns the half-open key range holding exactly the keys of `namespace`.
#[must_use]
pub fn namespace_range(namespace: &str) -> (String, String) {
    (
        format!("{namespace}{SEPARATOR}"),
        format!("{namespace}{SEPARATOR_SUCCESSOR}"),
    )
}

/// Returns the smallest string greater than every string starting with `prefix`.
///
/// Returns `None` when no such bound exists (empty prefix, or a prefix made
/// only of `char::MAX`).
#[must_use]
pub(crate) fn prefix_upper_bound(prefix: &str) -> Option<String> {
    let mut chars: Vec<char> = prefix.chars().collect();
    while let Some(last) = chars.pop() {
        let next = match last {
            char::MAX => continue,
            '\u{D7FF}' => Some('\u{E000}'),
            c => char::from_u32(u32::from(c) + 1),
        };
        if let Some(next) = next {
            chars.push(next);
            return Some(chars.into_iter().collect());
        }
    }
    None
}

/// Checks that a database or collection name can be part of a namespace.
pub(crate) fn validate_name(name: &str) -> CoreResult<()> {
    if name.is_empty() {
        return Err(CoreError::invalid_namespace(name, "name is empty"));
    }
    if name.contains(SEPARATOR) {
        return Err(CoreError::invalid_namespace(
            name,
            format!("name contains the key separator {SEPARATOR:?}"),
        ));
    }
    Ok(())
}
