//! Metadata scrubbing applied before an entry is stored.

use serde_json::{Map, Value};

pub const REDACTED: &str = "[REDACTED]";
pub const TRUNCATED_SUFFIX: &str = "... [truncated]";
pub const MAX_STRING_CHARS: usize = 1000;
pub const MAX_MAP_ENTRIES: usize = 20;
pub const TRUNCATED_MARKER: &str = "truncated";

const SENSITIVE: [&str; 4] = ["password", "token", "secret", "key"];

/// Sanitize a metadata value into the map that gets stored.
///
/// - a key or string value mentioning password, token, secret or key
///   (any case) is replaced by `"[REDACTED]"`
/// - strings over 1000 characters are cut to 1000 plus `"... [truncated]"`
/// - maps over 20 entries keep 20 and gain `"truncated": true`; an existing
///   `"truncated"` key in such a map is dropped in favour of the marker
///
/// Nested maps and arrays are sanitized the same way. `null` becomes an empty
/// map and any other non-map value is stored under `"value"`.
pub fn sanitize_metadata(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => sanitize_map(map),
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other);
            sanitize_map(map)
        }
    }
}

fn sanitize_map(map: Map<String, Value>) -> Map<String, Value> {
    let overflow = map.len() > MAX_MAP_ENTRIES;
    let mut out: Map<String, Value> = map
        .into_iter()
        // A capped map reserves the marker key for itself.
        .filter(|(key, _)| !overflow || key != TRUNCATED_MARKER)
        .take(MAX_MAP_ENTRIES)
        .map(|(key, value)| {
            let value = if is_sensitive(&key) {
                Value::String(REDACTED.to_string())
            } else {
                sanitize_value(value)
            };
            (key, value)
        })
        .collect();
    if overflow {
        out.insert(TRUNCATED_MARKER.to_string(), Value::Bool(true));
    }
    out
}

fn sanitize_value(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(sanitize_string(s)),
        Value::Object(map) => Value::Object(sanitize_map(map)),
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize_value).collect()),
        other => other,
    }
}

fn sanitize_string(s: String) -> String {
    if is_sensitive(&s) {
        return REDACTED.to_string();
    }
    match s.char_indices().nth(MAX_STRING_CHARS) {
        Some((cut, _)) => format!("{}{TRUNCATED_SUFFIX}", &s[..cut]),
        None => s,
    }
}

fn is_sensitive(s: &str) -> bool {
    let lower = s.to_lowercase();
    SENSITIVE.iter().any(|word| lower.contains(word))
}
