//! Shallow key diff between two JSON snapshots.

use std::collections::BTreeSet;

use serde_json::{Map, Value};

/// Top-level keys of `before` and `after` whose values differ.
///
/// A key present on only one side counts as changed. Anything that is not a
/// JSON object (including `null`) is treated as `{}`. The result is sorted.
pub fn compute_changed_fields(before: &Value, after: &Value) -> Vec<String> {
    let empty = Map::new();
    let before = before.as_object().unwrap_or(&empty);
    let after = after.as_object().unwrap_or(&empty);

    let keys: BTreeSet<&String> = before.keys().chain(after.keys()).collect();
    keys.into_iter()
        .filter(|k| before.get(k.as_str()) != after.get(k.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::json;

    use super::*;

    #[test]
    fn reports_changed_and_one_sided_keys() {
        assert_eq!(compute_changed_fields(&json!({"a": 1, "b": 2}), &json!({"a": 1, "b": 3})), ["b"]);
        assert_eq!(compute_changed_fields(&json!({"a": 1}), &json!({"a": 1, "b": 2})), ["b"]);
        assert_eq!(compute_changed_fields(&Value::Null, &json!({"a": 1})), ["a"]);
        assert!(compute_changed_fields(&json!({}), &json!({})).is_empty());
    }

    #[test]
    fn non_objects_behave_as_empty() {
        assert_eq!(compute_changed_fields(&json!([1, 2]), &json!({"x": null})), ["x"]);
        assert!(compute_changed_fields(&json!("str"), &json!(7)).is_empty());
    }

    #[test]
    fn nested_values_compare_structurally() {
        let before = json!({"meta": {"tags": ["a"]}, "n": 1});
        let after = json!({"meta": {"tags": ["a", "b"]}, "n": 1});
        assert_eq!(compute_changed_fields(&before, &after), ["meta"]);
    }

    fn flat_object() -> impl Strategy<Value = Map<String, Value>> {
        prop::collection::btree_map("[a-f]", 0i64..4, 0..6)
            .prop_map(|m| m.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
    }

    proptest! {
        #[test]
        fn diff_is_symmetric_and_empty_on_identity(a in flat_object(), b in flat_object()) {
            let (a, b) = (Value::Object(a), Value::Object(b));
            prop_assert!(compute_changed_fields(&a, &a).is_empty());
            prop_assert_eq!(compute_changed_fields(&a, &b), compute_changed_fields(&b, &a));
        }

        #[test]
        fn every_reported_key_really_differs(a in flat_object(), b in flat_object()) {
            let changed = compute_changed_fields(&Value::Object(a.clone()), &Value::Object(b.clone()));
            for key in a.keys().chain(b.keys()) {
                prop_assert_eq!(changed.contains(key), a.get(key) != b.get(key));
            }
        }
    }
}
