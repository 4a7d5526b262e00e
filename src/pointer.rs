//! Field specifier codec.
//!
//! A field specifier is an ordered list of raw path segments, e.g. `["bazz", "plugh"]`.
//! Its canonical form is a JSON Pointer (RFC 6901): each segment escaped with
//! `~` -> `~0` and `/` -> `~1`, joined with `/` and prefixed by `/`. Field identity
//! (set membership, ordering) is always defined on the canonical string.

use serde_json::{Map, Value};

/// Escape a single segment for use inside a pointer.
pub fn escape_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

/// Reverse of [`escape_segment`].
pub fn unescape_segment(segment: &str) -> String {
    // Order matters: "~01" must decode to "~1", not "/".
    segment.replace("~1", "/").replace("~0", "~")
}

/// Encode segments into their canonical pointer string.
pub fn encode<S: AsRef<str>>(segments: &[S]) -> String {
    let mut out = String::new();
    for segment in segments {
        out.push('/');
        out.push_str(&escape_segment(segment.as_ref()));
    }
    out
}

/// Decode a canonical pointer back into raw segments.
///
/// The empty pointer decodes to no segments.
pub fn decode(pointer: &str) -> Vec<String> {
    match pointer.strip_prefix('/') {
        Some(rest) => rest.split('/').map(unescape_segment).collect(),
        None if pointer.is_empty() => Vec::new(),
        None => vec![unescape_segment(pointer)],
    }
}

/// Append one raw segment to an existing pointer.
pub fn join(pointer: &str, segment: &str) -> String {
    format!("{}/{}", pointer, escape_segment(segment))
}

/// Look up the value at `pointer`.
///
/// Missing intermediate values yield `None` rather than an error.
pub fn get<'a>(value: &'a Value, pointer: &str) -> Option<&'a Value> {
    value.pointer(pointer)
}

/// Write `new_value` at `pointer`, creating intermediate objects as needed.
///
/// Returns `false` without writing when `pointer` is empty or an intermediate value
/// exists but is not an object.
pub fn set(target: &mut Value, pointer: &str, new_value: Value) -> bool {
    let segments = decode(pointer);
    let Some((last, parents)) = segments.split_last() else {
        return false;
    };

    let mut current = target;
    for segment in parents {
        let Value::Object(map) = current else {
            return false;
        };
        current = map
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
    }

    match current {
        Value::Object(map) => {
            map.insert(last.clone(), new_value);
            true
        }
        _ => false,
    }
}
