//! Core types: the declarative schema model and the per-request records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::destructure::ArrayStructure;
use crate::query::ListParams;

/// The only request method the engine serves.
pub const READ_METHOD: &str = "GET";

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Inclusion tier of a field.
///
/// Determines whether a field is sent without being asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Inclusion {
    /// Always sent, whatever the client asks for.
    Always,
    /// Sent when the client does not name any fields.
    Default,
    /// Sent only when the client names it.
    #[default]
    ByRequest,
}

impl Inclusion {
    /// Parse an inclusion tag.
    ///
    /// Returns `None` for unknown values (caller should error).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "always" => Some(Inclusion::Always),
            "default" => Some(Inclusion::Default),
            "byRequest" => Some(Inclusion::ByRequest),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Inclusion::Always => "always",
            Inclusion::Default => "default",
            Inclusion::ByRequest => "byRequest",
        }
    }
}

/// A pointer to another node of the root schema document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RefNode {
    #[serde(rename = "$ref")]
    pub target: String,
}

impl RefNode {
    /// The target as a JSON Pointer into the root document (leading `#` stripped).
    pub fn pointer(&self) -> &str {
        self.target.strip_prefix('#').unwrap_or(&self.target)
    }
}

/// A node in a resource map: either an alias or a concrete definition.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ResourceNode {
    Ref(RefNode),
    Def(ResourceDef),
}

/// A concrete resource definition.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceDef {
    /// Resource-type identity; defaults to the link name the definition sits under.
    #[serde(default)]
    pub id: Option<String>,
    /// Singleton resources take no id segment in the path.
    #[serde(default)]
    pub singleton: bool,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldNode>,
    /// Sub-resources reachable by continuing the path.
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceNode>,
    #[serde(default)]
    pub description: Option<String>,
}

/// A node in a field map.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FieldNode {
    /// Shorthand `name: true`, a `byRequest` scalar field.
    Flag(bool),
    Ref(RefNode),
    Def(FieldDef),
}

/// A concrete field definition.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldDef {
    /// Raw inclusion tag, validated at compile time. Absent means `byRequest`.
    #[serde(default)]
    pub inclusion: Option<String>,
    /// The value is a collection whose elements have the shape of `fields`.
    #[serde(default)]
    pub array: bool,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldNode>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Whether a request addresses one instance or a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Get,
    List,
}

/// One step of a resolved path: a resource type and, when addressed, an instance id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl Link {
    pub fn new(resource_type: impl Into<String>, id: Option<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id,
        }
    }
}

/// A request as handed over by the transport layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRequest {
    pub method: String,
    pub path: String,
    /// Raw, un-decoded query portion (without the leading `?`).
    pub query_string: String,
}

impl RawRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            query_string: String::new(),
        }
    }

    /// Shorthand for a `GET` request.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(READ_METHOD, path)
    }

    pub fn query(mut self, query_string: impl Into<String>) -> Self {
        self.query_string = query_string.into();
        self
    }
}

/// A fully prepared request, shared by reference through the middleware chain.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub method: String,
    pub mode: Mode,
    /// Link chain, one entry per resource along the path.
    pub resource: Vec<Link>,
    /// Selected fields as canonical pointers, sorted.
    pub fields: Vec<String>,
    pub fields_array_structure: ArrayStructure,
    /// Paging and ordering, present in list mode only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list: Option<ListParams>,
    /// Query parameters not consumed by the engine.
    pub query: BTreeMap<String, Vec<String>>,
}

impl Request {
    /// Identity of the addressed resource type.
    pub fn identity(&self) -> &str {
        self.resource
            .last()
            .map(|link| link.resource_type.as_str())
            .unwrap_or_default()
    }

    /// Id of the addressed instance, in get mode.
    pub fn id(&self) -> Option<&str> {
        self.resource.last().and_then(|link| link.id.as_deref())
    }
}

/// Response envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl Response {
    /// The placeholder every request starts with.
    pub fn not_found() -> Self {
        Self {
            status: 404,
            headers: BTreeMap::new(),
            body: None,
        }
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::not_found()
    }
}

/// Per-request state passed through the middleware chain.
#[derive(Debug, Clone)]
pub struct Context {
    pub request: Request,
    pub response: Response,
    /// Caller-supplied data forwarded to drivers untouched.
    pub aux: Value,
}

impl Context {
    pub fn new(request: Request, aux: Value) -> Self {
        Self {
            request,
            response: Response::not_found(),
            aux,
        }
    }
}
