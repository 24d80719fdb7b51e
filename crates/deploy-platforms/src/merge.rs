//! Deep merge of structured configuration
//!
//! Objects merge key by key, recursively. Every other value, arrays
//! included, is a leaf: the incoming value replaces the existing one.

use serde_json::Value;

/// Merge `incoming` into `base`, incoming values winning per leaf.
pub fn deep_merge(base: &mut Value, incoming: &Value) {
    match (base, incoming) {
        (Value::Object(base_map), Value::Object(incoming_map)) => {
            for (key, incoming_val) in incoming_map {
                match base_map.get_mut(key) {
                    Some(base_val) => deep_merge(base_val, incoming_val),
                    None => {
                        base_map.insert(key.clone(), incoming_val.clone());
                    }
                }
            }
        }
        (base, incoming) => {
            *base = incoming.clone();
        }
    }
}

/// Merge into a copy of `base`.
pub fn merged(base: &Value, incoming: &Value) -> Value {
    let mut result = base.clone();
    deep_merge(&mut result, incoming);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn nested_objects_merge() {
        let base = json!({"editor": {"tabSize": 4, "rulers": [80]}, "keep": true});
        let incoming = json!({"editor": {"tabSize": 2}, "new": 1});
        assert_eq!(
            merged(&base, &incoming),
            json!({"editor": {"tabSize": 2, "rulers": [80]}, "keep": true, "new": 1})
        );
    }

    #[test]
    fn arrays_are_replaced() {
        let base = json!({"recommendations": ["a", "b"]});
        let incoming = json!({"recommendations": ["c"]});
        assert_eq!(merged(&base, &incoming), json!({"recommendations": ["c"]}));
    }

    #[test]
    fn non_object_root_is_replaced() {
        assert_eq!(merged(&json!([1, 2]), &json!({"a": 1})), json!({"a": 1}));
    }

    fn leaf() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i32>().prop_map(|n| json!(n)),
            "[a-z]{0,6}".prop_map(Value::String),
        ]
    }

    fn value() -> impl Strategy<Value = Value> {
        leaf().prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::btree_map("[a-c]", inner, 0..4)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #[test]
        fn merge_is_idempotent(base in value(), incoming in value()) {
            let once = merged(&base, &incoming);
            let twice = merged(&once, &incoming);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn merging_into_self_is_identity(v in value()) {
            prop_assert_eq!(merged(&v, &v), v);
        }

        #[test]
        fn incoming_leaves_win(base in value(), key in "[a-c]", leaf in leaf()) {
            let incoming = json!({ key.clone(): leaf.clone() });
            let result = merged(&base, &incoming);
            prop_assert_eq!(&result[&key], &leaf);
        }
    }
}
