//! Projection of raw driver output onto the selected fields.

use serde_json::{Map, Value};

use crate::destructure::{ArrayStructure, Destructure};
use crate::error::ProjectError;
use crate::pointer;
use crate::types::json_type_name;

/// Copy the fields selected by `tree` out of `source` into a fresh object.
///
/// Missing source values are skipped. An absent (or `null`) array boundary yields an
/// empty array. The source is never aliased into the result.
///
/// # Errors
///
/// Returns `ProjectError::NotAnArray` if a declared array boundary holds a non-array value.
pub fn project(tree: &ArrayStructure, source: &Value) -> Result<Value, ProjectError> {
    project_at(tree, source, "")
}

fn project_at(tree: &ArrayStructure, source: &Value, base: &str) -> Result<Value, ProjectError> {
    let mut target = Value::Object(Map::new());

    for (at, entry) in tree.iter() {
        match entry {
            Destructure::Copy => {
                if let Some(value) = pointer::get(source, at) {
                    pointer::set(&mut target, at, value.clone());
                }
            }
            Destructure::Array(element_tree) => {
                let location = format!("{}{}", base, at);
                let items: &[Value] = match pointer::get(source, at) {
                    None | Some(Value::Null) => &[],
                    Some(Value::Array(items)) => items,
                    Some(other) => {
                        return Err(ProjectError::NotAnArray {
                            pointer: location,
                            actual: json_type_name(other),
                            value: other.clone(),
                        })
                    }
                };

                let projected = items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| project_at(element_tree, item, &format!("{}/{}", location, i)))
                    .collect::<Result<Vec<_>, _>>()?;

                pointer::set(&mut target, at, Value::Array(projected));
            }
        }
    }

    Ok(target)
}
