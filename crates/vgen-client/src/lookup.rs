//! Defensive lookups into loosely specified JSON responses.
//!
//! Response shapes differ between API versions, so fields are read through
//! ordered lists of candidate paths. The first path that yields a usable
//! value wins.

use serde_json::Value;

/// A path of object keys from the response root.
pub type LookupPath = &'static [&'static str];

/// Where a task id may appear in a creation response.
pub const TASK_ID_PATHS: &[LookupPath] = &[&["id"], &["data", "id"]];

/// Result URL locations in typed-client responses.
pub const SDK_RESULT_URL_PATHS: &[LookupPath] = &[&["content", "video_url"], &["data", "video_url"]];

/// Result URL locations in raw HTTP status responses, in priority order.
pub const HTTP_RESULT_URL_PATHS: &[LookupPath] = &[
    &["data", "video_url"],
    &["data", "resp_data", "video_url"],
    &["data", "content", "video_url"],
];

/// Keys accepted by the recursive result URL search.
pub const URL_KEYS: &[&str] = &["video_url", "url"];

/// Value at `path`, if present and not null.
pub fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter()
        .try_fold(value, |current, key| current.get(*key))
        .filter(|v| !v.is_null())
}

/// First non-empty string among `paths`. Numeric ids are stringified.
pub fn first_string(value: &Value, paths: &[LookupPath]) -> Option<String> {
    paths.iter().find_map(|path| match lookup(value, path)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Depth-first search for a non-empty string under any of `keys`.
///
/// Keys of the current object are checked before descending, so shallower
/// matches win.
pub fn find_string_key(value: &Value, keys: &[&str]) -> Option<String> {
    match value {
        Value::Object(map) => {
            let direct = keys.iter().find_map(|key| match map.get(*key) {
                Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
                _ => None,
            });
            direct.or_else(|| map.values().find_map(|child| find_string_key(child, keys)))
        }
        Value::Array(items) => items.iter().find_map(|item| find_string_key(item, keys)),
        _ => None,
    }
}
