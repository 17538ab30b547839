// SPDX-License-Identifier: MIT

//! The dynamic value tree used for workflow context, task payloads, and
//! branch outputs. A plain re-export of [`serde_json::Value`] plus the
//! dotted-path helpers the planner and applier need — the spec's "canonical
//! dynamic value (sum of null, bool, number, string, array, object)" is
//! exactly what `serde_json::Value` already is.

pub use serde_json::Value;

/// Split a dotted path into its segments. `"state.votes.0"` → `["state", "votes", "0"]`.
pub fn path_segments(path: &str) -> Vec<&str> {
    if path.is_empty() {
        Vec::new()
    } else {
        path.split('.').collect()
    }
}

/// Resolve a dotted path against a value tree. Array segments must be
/// decimal indices; anything else against an array returns `None`.
pub fn get_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    path_segments(path).into_iter().try_fold(root, |cur, seg| match cur {
        Value::Object(map) => map.get(seg),
        Value::Array(items) => seg.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Write `value` at `path`, creating intermediate objects as needed.
/// Last-writer-wins: an existing leaf at `path` is overwritten.
pub fn set_path(root: &mut Value, path: &str, value: Value) {
    let segments = path_segments(path);
    set_segments(root, &segments, value);
}

fn set_segments(root: &mut Value, segments: &[&str], value: Value) {
    let Some((head, rest)) = segments.split_first() else {
        *root = value;
        return;
    };

    if !root.is_object() {
        *root = Value::Object(Default::default());
    }
    let Value::Object(map) = root else { unreachable!("just coerced to an object above") };

    if rest.is_empty() {
        map.insert((*head).to_string(), value);
        return;
    }

    let child = map.entry((*head).to_string()).or_insert_with(|| Value::Object(Default::default()));
    set_segments(child, rest, value);
}

/// Length of the array at `path`, or `None` if it is not an array.
pub fn array_len_at(root: &Value, path: &str) -> Option<usize> {
    match get_path(root, path) {
        Some(Value::Array(items)) => Some(items.len()),
        _ => None,
    }
}

#[cfg(test)]
#[path = "value_tests.rs"]
mod tests;
