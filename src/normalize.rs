//! Deterministic JSON output for git-tracked workflow files.

use serde_json::Value;

/// Recursively sort object keys so serialization order is stable regardless
/// of how the value was built.
fn normalize_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, value)| (key.clone(), normalize_value(value)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(normalize_value).collect()),
        other => other.clone(),
    }
}

/// Serialize with sorted keys, 2-space indentation, and a trailing newline.
pub fn normalize_json(value: &Value) -> String {
    let normalized = normalize_value(value);
    let mut text =
        serde_json::to_string_pretty(&normalized).expect("serialize normalized JSON value");
    if !text.ends_with('\n') {
        text.push('\n');
    }
    text
}

/// Remove named top-level fields on a copy of the document.
pub fn strip_volatile_fields(value: &Value, fields: &[&str]) -> Value {
    let mut result = value.clone();
    if let Some(map) = result.as_object_mut() {
        for field in fields {
            map.remove(*field);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keys_are_sorted_recursively() {
        let value = json!({"b": {"z": 1, "a": 2}, "a": [{"y": 1, "x": 2}]});
        let text = normalize_json(&value);
        let a_pos = text.find("\"a\"").unwrap();
        let b_pos = text.find("\"b\"").unwrap();
        assert!(a_pos < b_pos);
        let x_pos = text.find("\"x\"").unwrap();
        let y_pos = text.find("\"y\"").unwrap();
        assert!(x_pos < y_pos);
    }

    #[test]
    fn output_ends_with_single_newline() {
        let text = normalize_json(&json!({"k": 1}));
        assert!(text.ends_with('\n'));
        assert!(!text.ends_with("\n\n"));
    }

    #[test]
    fn output_is_stable_across_calls() {
        let value = json!({"c": 3, "a": 1, "b": 2});
        assert_eq!(normalize_json(&value), normalize_json(&value));
    }

    #[test]
    fn unicode_is_preserved() {
        let text = normalize_json(&json!({"name": "wörkflöw ✓"}));
        assert!(text.contains("wörkflöw ✓"));
    }

    #[test]
    fn strip_volatile_removes_only_named_fields() {
        let value = json!({"id": "1", "createdAt": "x", "name": "keep"});
        let stripped = strip_volatile_fields(&value, &["id", "createdAt", "updatedAt"]);
        assert_eq!(stripped, json!({"name": "keep"}));
        // Original untouched.
        assert!(value.get("id").is_some());
    }
}
