//! Field selection: client field specifiers -> canonical, schema-checked field list.
//!
//! A specifier is either a JSON array of strings (`["bazz","plugh"]`) or dot syntax
//! (`bazz.plugh`). Dot syntax cannot address a field whose name contains a dot; the
//! JSON form can. Both forms of the same path canonicalize to the same pointer.

use std::collections::BTreeSet;

use serde_json::Value;

use crate::compiler::FieldIndex;
use crate::error::RequestError;
use crate::pointer;
use crate::types::json_type_name;

/// Parse one raw specifier into its path segments.
///
/// # Errors
///
/// Returns `RequestError::InvalidFieldSpecifier` when the specifier is valid JSON but
/// not an array of strings.
pub fn parse_specifier(raw: &str) -> Result<Vec<String>, RequestError> {
    let trimmed = raw.trim();

    let parsed = match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => value,
        Err(_) => return Ok(trimmed.split('.').map(String::from).collect()),
    };

    let invalid = |reason: String| RequestError::InvalidFieldSpecifier {
        specifier: trimmed.to_string(),
        reason,
    };

    let items = match parsed {
        Value::Array(items) => items,
        other => {
            return Err(invalid(format!(
                "expected array of strings, got {}",
                json_type_name(&other)
            )))
        }
    };

    items
        .into_iter()
        .map(|item| match item {
            Value::String(segment) => Ok(segment),
            other => Err(invalid(format!(
                "array contains {} element",
                json_type_name(&other)
            ))),
        })
        .collect()
}

/// Canonical pointer for one raw specifier.
pub fn canonicalize(raw: &str) -> Result<String, RequestError> {
    parse_specifier(raw).map(|segments| pointer::encode(&segments))
}

/// Resolve the final field list for a request.
///
/// With `requested == None` the schema defaults are used. Unknown fields are dropped
/// silently and `always` fields are added unconditionally. The result is deduplicated
/// and sorted by canonical pointer, independent of the order the client used.
///
/// # Errors
///
/// Returns `RequestError::InvalidFieldSpecifier` for malformed specifiers.
pub fn select_fields(
    index: &FieldIndex,
    requested: Option<&[String]>,
) -> Result<Vec<String>, RequestError> {
    let mut selected = BTreeSet::new();

    match requested {
        Some(specifiers) => {
            for raw in specifiers {
                let field = canonicalize(raw)?;
                if index.contains(&field) {
                    selected.insert(field);
                }
            }
        }
        None => selected.extend(index.default.iter().cloned()),
    }

    selected.extend(index.always.iter().cloned());

    Ok(selected.into_iter().collect())
}
