//! Helpers shared by the dedicated adapters

use canvas_engine::{is_valid_value, ValueMap};
use serde_json::Value;

/// First meaningful value under any of `keys`
pub(crate) fn first_meaningful<'a>(map: &'a ValueMap, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| map.get(*key))
        .find(|value| is_valid_value(value))
}

/// Parameter value, or `default` when unset
pub(crate) fn parameter_or(parameters: &ValueMap, key: &str, default: Value) -> Value {
    parameters
        .get(key)
        .filter(|v| is_valid_value(v))
        .cloned()
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_first_meaningful_skips_empty() {
        let map = json!({"a": "", "b": "  ", "c": "x"}).as_object().unwrap().clone();
        assert_eq!(first_meaningful(&map, &["a", "b", "c"]), Some(&json!("x")));
        assert_eq!(first_meaningful(&map, &["a", "missing"]), None);
        assert_eq!(parameter_or(&map, "a", json!("d")), json!("d"));
    }
}
