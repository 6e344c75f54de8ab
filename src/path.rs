//! Dotted-path access into JSON records.
//!
//! `query_value(patient, "link.type")` walks `link`, fans out over every list
//! element, and collects each element's `type`. This is deliberately not
//! FHIRPath: there are no indexes, functions or filters.

use serde_json::Value;

/// Resolve `path` against `root`, returning every matching value in document order.
///
/// An empty path yields the root itself. Missing members, `null`, empty strings,
/// empty lists and empty objects yield nothing.
pub fn query_value<'v>(root: &'v Value, path: &str) -> Vec<&'v Value> {
    if path.is_empty() {
        return vec![root];
    }

    let segments: Vec<&str> = path.split('.').collect();
    let mut results = Vec::new();
    collect(root, &segments, &mut results);
    results
}

fn collect<'v>(current: &'v Value, segments: &[&str], results: &mut Vec<&'v Value>) {
    let Some((label, rest)) = segments.split_first() else {
        results.push(current);
        return;
    };

    let Some(child) = current.get(*label).filter(|v| is_present(v)) else {
        return;
    };

    match child {
        Value::Array(items) => {
            for item in items {
                collect(item, rest, results);
            }
        }
        _ => collect(child, rest, results),
    }
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        _ => true,
    }
}
