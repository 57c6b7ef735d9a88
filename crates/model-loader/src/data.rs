//! # Structured Data Access
//!
//! Command arguments and responses are plain JSON. [`Args`] keeps insertion
//! order (serde_json's `preserve_order`), which makes argument order part of a
//! model's identity for caching.
//!
//! [`extract`] walks a dot-separated path (`"repository.owner.login"`,
//! `"issues.0.title"`) through objects and arrays.

use serde_json::{Map, Value};

/// Ordered command arguments.
pub type Args = Map<String, Value>;

/// Looks up the value at `path`; an empty path returns `value` itself.
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(value);
    }
    path.split('.').try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Returns the value at `path`, or `default` when the path does not resolve.
pub fn extract(value: &Value, path: &str, default: Value) -> Value {
    lookup(value, path).cloned().unwrap_or(default)
}

/// Renders arguments for error messages and logs.
pub fn describe_args(args: &Args) -> String {
    serde_json::to_string(args).unwrap_or_else(|_| "<unprintable>".to_string())
}

/// Returns `base` with every entry of `overrides` inserted after it.
pub fn merge_args(base: &Args, overrides: Args) -> Args {
    let mut merged = base.clone();
    merged.extend(overrides);
    merged
}
