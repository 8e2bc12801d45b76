//! Deep-merge of layered config documents.

use serde_json::Value;

/// Merge `b` over `a`: objects merge recursively, everything else replaces.
pub fn deep_merge(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Object(mut a_map), Value::Object(b_map)) => {
            for (k, b_val) in b_map {
                let a_val = a_map.remove(&k).unwrap_or(Value::Null);
                a_map.insert(k, deep_merge(a_val, b_val));
            }
            Value::Object(a_map)
        }
        // Arrays and scalars replace wholesale: partial array merges are a
        // footgun for ordered route lists.
        (_, b_val) => b_val,
    }
}
