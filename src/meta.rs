//! Structural check of a resource schema document.
//!
//! The document is validated against a bundled JSON Schema before compilation so
//! that every shape problem is reported at once, each with the pointer to its node.
//! Semantic rules (inclusion tags, identities, `$ref` targets) are left to the compiler.

use serde_json::{json, Value};

use crate::error::{CompileError, SchemaViolation};

/// JSON Schema describing a valid resource schema document.
pub fn meta_schema() -> Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "type": "object",
        "additionalProperties": { "$ref": "#/$defs/resource" },
        "$defs": {
            "resource": {
                "type": "object",
                "properties": {
                    "$ref": { "type": "string" },
                    "id": { "type": "string", "minLength": 1 },
                    "singleton": { "type": "boolean" },
                    "description": { "type": "string" },
                    "fields": {
                        "type": "object",
                        "additionalProperties": { "$ref": "#/$defs/field" }
                    },
                    "resources": {
                        "type": "object",
                        "additionalProperties": { "$ref": "#/$defs/resource" }
                    }
                },
                "additionalProperties": false,
                "dependentSchemas": { "$ref": { "maxProperties": 1 } }
            },
            "field": {
                "type": ["boolean", "object"],
                "if": { "type": "boolean" },
                "then": { "const": true },
                "properties": {
                    "$ref": { "type": "string" },
                    "inclusion": { "type": "string" },
                    "array": { "type": "boolean" },
                    "description": { "type": "string" },
                    "fields": {
                        "type": "object",
                        "additionalProperties": { "$ref": "#/$defs/field" }
                    }
                },
                "additionalProperties": false,
                "dependentSchemas": { "$ref": { "maxProperties": 1 } }
            }
        }
    })
}

/// Check that `schema` has the structure of a resource schema document.
///
/// # Errors
///
/// Returns `CompileError::InvalidSchema` listing every violation found.
pub fn check_structure(schema: &Value) -> Result<(), CompileError> {
    let validator = jsonschema::validator_for(&meta_schema()).map_err(|e| {
        CompileError::InvalidSchema {
            violations: vec![SchemaViolation {
                path: String::new(),
                message: format!("meta-schema rejected: {}", e),
            }],
        }
    })?;

    let violations: Vec<SchemaViolation> = validator
        .iter_errors(schema)
        .map(|e| SchemaViolation {
            path: e.instance_path.to_string(),
            message: e.to_string(),
        })
        .collect();

    if violations.is_empty() {
        Ok(())
    } else {
        Err(CompileError::InvalidSchema { violations })
    }
}
