//! Property tests for key layout, namespace isolation and updates.

use proptest::prelude::*;
use serde_json::{json, Value};
use stowdb_core::{
    apply_update, into_document, make_key, namespace_range, split_key, CoreError, Database,
    Document,
};

fn name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_.]{0,8}"
}

fn document_id() -> impl Strategy<Value = String> {
    "[A-Za-z0-9$%._-]{1,12}"
}

fn field_map() -> impl Strategy<Value = Document> {
    prop::collection::btree_map("[a-z]{1,4}", any::<i32>(), 0..6).prop_map(|fields| {
        fields
            .into_iter()
            .map(|(k, v)| (k, json!(v)))
            .collect::<Document>()
    })
}

proptest! {
    #[test]
    fn key_splits_back(ns in name(), id in document_id()) {
        let key = make_key(&ns, &id);
        prop_assert_eq!(split_key(&key), Some((ns.as_str(), id.as_str())));
    }

    #[test]
    fn namespace_range_holds_exactly_its_keys(
        ns in name(),
        other in name(),
        id in document_id(),
    ) {
        let (lower, upper) = namespace_range(&ns);
        let key = make_key(&other, &id);
        let inside = lower.as_str() <= key.as_str() && key.as_str() < upper.as_str();
        prop_assert_eq!(inside, ns == other);
    }

    #[test]
    fn set_merges_only_named_fields(base in field_map(), set in field_map()) {
        let mut base = base;
        base.insert("_id".into(), json!("x"));
        let update = into_document(json!({ "$set": Value::Object(set.clone()) })).unwrap();

        let result = apply_update(&base, &update).unwrap();
        for (field, value) in &base {
            if !set.contains_key(field) {
                prop_assert_eq!(result.get(field), Some(value));
            }
        }
        for (field, value) in &set {
            prop_assert_eq!(result.get(field), Some(value));
        }
    }

    #[test]
    fn mixed_updates_always_fail(base in field_map(), plain in "[a-z]{1,4}") {
        let update = into_document(json!({"$set": {"a": 1}, plain: 2})).unwrap();
        let is_invalid_mutation = matches!(
            apply_update(&base, &update),
            Err(CoreError::InvalidMutation { .. })
        );
        prop_assert!(is_invalid_mutation);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn counts_stay_within_namespace(a in 0usize..6, b in 0usize..6) {
        let db = Database::open_in_memory().unwrap();
        let coll = db.collection("db", "coll").unwrap();
        let coll2 = db.collection("db", "coll2").unwrap();

        coll.insert_many((0..a).map(|i| json!({"_id": i}))).unwrap();
        coll2.insert_many((0..b).map(|i| json!({"_id": i}))).unwrap();

        prop_assert_eq!(coll.count().unwrap(), a);
        prop_assert_eq!(coll2.count().unwrap(), b);
    }

    #[test]
    fn save_then_load_returns_saved(fields in field_map(), id in "[a-z0-9]{1,8}") {
        let db = Database::open_in_memory().unwrap();
        let coll = db.collection("db", "c").unwrap();

        let mut doc = fields;
        doc.insert("_id".into(), json!(id.clone()));
        let saved = coll.insert(doc.clone()).unwrap();

        prop_assert_eq!(&saved, &doc);
        prop_assert_eq!(coll.find_one(&id).unwrap(), Some(doc));
        prop_assert_eq!(coll.remove(&id).unwrap(), 1);
        prop_assert_eq!(coll.find_one(&id).unwrap(), None);
    }
}
