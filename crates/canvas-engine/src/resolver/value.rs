//! Value helpers used by the resolver

use serde_json::Value;

/// Whether a value carries real content
///
/// `null` is never meaningful, strings must be non-blank, arrays non-empty,
/// and objects must hold at least one meaningful value (recursively), so an
/// empty `{}` or `{"a": ""}` is not forwarded downstream.
pub fn is_valid_value(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Number(_) | Value::Bool(_) => true,
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => map.values().any(is_valid_value),
    }
}

/// Collapse an array into its first element for single-value ports
///
/// Strings are used directly and objects carrying a `url` yield that url.
/// Non-arrays and empty arrays are returned unchanged.
pub fn take_single(value: Value) -> Value {
    let Value::Array(items) = value else {
        return value;
    };
    match items.into_iter().next() {
        Some(Value::Object(mut map)) => match map.remove("url") {
            Some(url @ Value::String(_)) => url,
            Some(other) => {
                map.insert("url".to_string(), other);
                Value::Object(map)
            }
            None => Value::Object(map),
        },
        Some(first) => first,
        None => Value::Array(Vec::new()),
    }
}

/// Wrap a scalar in an array, leaving arrays untouched
pub fn as_list(value: &Value) -> Value {
    match value {
        Value::Array(_) => value.clone(),
        other => Value::Array(vec![other.clone()]),
    }
}

/// Flatten a (possibly structured) story value into plain text
///
/// Objects become one `key: text` line per meaningful field, with nested
/// keys joined by dots; arrays are flattened element by element.
pub fn story_text(value: &Value) -> String {
    let mut lines = Vec::new();
    flatten_into(None, value, &mut lines);
    lines.join("\n")
}

fn flatten_into(prefix: Option<&str>, value: &Value, lines: &mut Vec<String>) {
    if !is_valid_value(value) {
        return;
    }
    match value {
        Value::Object(map) => {
            for (key, inner) in map {
                let path = match prefix {
                    Some(p) => format!("{}.{}", p, key),
                    None => key.clone(),
                };
                flatten_into(Some(&path), inner, lines);
            }
        }
        Value::Array(items) => {
            for item in items {
                flatten_into(prefix, item, lines);
            }
        }
        scalar => {
            let text = match scalar {
                Value::String(s) => s.trim().to_string(),
                other => other.to_string(),
            };
            match prefix {
                Some(p) => lines.push(format!("{}: {}", p, text)),
                None => lines.push(text),
            }
        }
    }
}
