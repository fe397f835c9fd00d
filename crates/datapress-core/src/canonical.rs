//! Canonical JSON encoding: map keys sorted recursively so that the same
//! logical document always serializes to the same bytes.

use serde::Serialize;
use serde_json::Value;

/// Serializes `value` as JSON with all object keys sorted, recursively.
pub fn stable_json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let raw = serde_json::to_value(value)?;
    serde_json::to_vec(&sort_keys(raw))
}

/// String form of [`stable_json_bytes`].
pub fn stable_json_string<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let raw = serde_json::to_value(value)?;
    serde_json::to_string(&sort_keys(raw))
}

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = serde_json::Map::with_capacity(entries.len());
            for (key, val) in entries {
                sorted.insert(key, sort_keys(val));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keys_sort_recursively() {
        let value = json!({"z": 1, "a": {"d": true, "b": [{"y": 0, "x": 0}]}});
        let text = stable_json_string(&value).expect("stable encode");
        assert_eq!(text, r#"{"a":{"b":[{"x":0,"y":0}],"d":true},"z":1}"#);
    }

    #[test]
    fn arrays_keep_order() {
        let value = json!(["c", "a", "b"]);
        let text = stable_json_string(&value).expect("stable encode");
        assert_eq!(text, r#"["c","a","b"]"#);
    }
}
