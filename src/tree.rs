//! Path helpers over the `serde_json::Value` config tree.
//!
//! Paths are segment slices rather than dotted strings so keys containing dots
//! stay addressable. A segment that parses as an index also addresses
//! sequence elements, both for reads and for in-bounds writes.

use serde_json::{Map, Value};

/// Join a dotted prefix and a key.
pub fn dotted(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

/// Truthiness as used for override routing: `null`, `false`, `0`, NaN and
/// `""` are falsy, every container (even an empty one) is truthy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Look up a value by path segments.
pub fn get_path<'a, S: AsRef<str>>(root: &'a Value, path: &[S]) -> Option<&'a Value> {
    path.iter().try_fold(root, |node, segment| {
        let segment = segment.as_ref();
        match node {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }
    })
}

pub fn get_path_mut<'a, S: AsRef<str>>(root: &'a mut Value, path: &[S]) -> Option<&'a mut Value> {
    path.iter().try_fold(root, |node, segment| {
        let segment = segment.as_ref();
        match node {
            Value::Object(map) => map.get_mut(segment),
            Value::Array(items) => segment
                .parse::<usize>()
                .ok()
                .and_then(move |i| items.get_mut(i)),
            _ => None,
        }
    })
}

/// Look up a value by dotted key (`"database.url"`).
pub fn get_dotted<'a>(root: &'a Value, dotted_key: &str) -> Option<&'a Value> {
    let segments: Vec<&str> = dotted_key.split('.').collect();
    get_path(root, &segments)
}

/// Write `value` at `path`, creating intermediate mappings as needed.
///
/// Existing intermediates that are not containers are replaced by mappings.
/// An empty path replaces the root.
pub fn set_path<S: AsRef<str>>(root: &mut Value, path: &[S], value: Value) {
    let Some((leaf, parents)) = path.split_last() else {
        *root = value;
        return;
    };
    let mut current = root;
    for segment in parents {
        current = descend_or_create(current, segment.as_ref());
    }
    *descend_or_create(current, leaf.as_ref()) = value;
}

fn descend_or_create<'a>(node: &'a mut Value, segment: &str) -> &'a mut Value {
    if let Some(i) = array_index(node, segment) {
        return &mut node[i];
    }
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    // IndexMut on an object inserts `null` for a missing key.
    &mut node[segment]
}

fn array_index(node: &Value, segment: &str) -> Option<usize> {
    let items = node.as_array()?;
    segment.parse::<usize>().ok().filter(|i| *i < items.len())
}

/// Every leaf of the tree as a dotted path, in document order.
///
/// Scalars, sequences and empty mappings are leaves. Walks with an explicit
/// stack, so nesting depth is not bounded by the call stack.
pub fn leaves(root: &Value) -> Vec<(String, &Value)> {
    let mut out = Vec::new();
    let Value::Object(map) = root else {
        out.push((String::new(), root));
        return out;
    };

    let mut stack = vec![(String::new(), map.iter())];
    while let Some((prefix, entries)) = stack.last_mut() {
        let Some((key, value)) = entries.next() else {
            stack.pop();
            continue;
        };
        let path = dotted(prefix, key);
        match value {
            Value::Object(child) if !child.is_empty() => stack.push((path, child.iter())),
            leaf => out.push((path, leaf)),
        }
    }
    out
}
