//! Resource schema compilation.
//!
//! Turns a declarative schema document into per-resource lookup structures: the three
//! inclusion sets, a fully `$ref`-resolved field shape tree and the link table used to
//! walk request paths. Compilation happens once; the result is read-only.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::CompileError;
use crate::meta::check_structure;
use crate::pointer;
use crate::types::{FieldDef, FieldNode, Inclusion, RefNode, ResourceDef, ResourceNode};

/// Canonical field pointers of one resource, by inclusion tier.
///
/// `always` is always a subset of `default`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldIndex {
    pub always: BTreeSet<String>,
    pub default: BTreeSet<String>,
    pub by_request: BTreeSet<String>,
}

impl FieldIndex {
    fn insert(&mut self, inclusion: Inclusion, field: String) {
        match inclusion {
            Inclusion::Always => {
                self.default.insert(field.clone());
                self.always.insert(field);
            }
            Inclusion::Default => {
                self.default.insert(field);
            }
            Inclusion::ByRequest => {
                self.by_request.insert(field);
            }
        }
    }

    /// Whether the schema declares this canonical field pointer at any tier.
    pub fn contains(&self, field: &str) -> bool {
        self.always.contains(field) || self.default.contains(field) || self.by_request.contains(field)
    }
}

/// A field with every `$ref` resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldShape {
    pub inclusion: Inclusion,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub array: bool,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, FieldShape>,
}

/// One compiled resource type.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledResource {
    pub identity: String,
    pub singleton: bool,
    /// Sub-resource link name -> resource identity.
    pub links: BTreeMap<String, String>,
    pub fields_index: FieldIndex,
    pub fields_schema: BTreeMap<String, FieldShape>,
}

/// A compiled schema document.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledSchema {
    root_links: BTreeMap<String, String>,
    resources: BTreeMap<String, CompiledResource>,
}

impl CompiledSchema {
    /// Compile a schema document.
    ///
    /// # Errors
    ///
    /// Returns `CompileError` if the document is structurally invalid, declares an
    /// unknown inclusion tag, reuses a resource identity, or has a dangling or cyclic `$ref`.
    pub fn compile(schema: &Value) -> Result<Self, CompileError> {
        check_structure(schema)?;

        let root: BTreeMap<String, ResourceNode> = serde_json::from_value(schema.clone())
            .map_err(|e| CompileError::MalformedNode {
                path: "/".to_string(),
                message: e.to_string(),
            })?;

        let mut compiler = Compiler::new(schema);
        let root_links = compiler.compile_level(&root, "")?;

        debug!(
            resources = compiler.resources.len(),
            root_links = root_links.len(),
            "compiled resource schema"
        );

        Ok(Self {
            root_links,
            resources: compiler.resources,
        })
    }

    /// Top-level link name -> resource identity.
    pub fn root_links(&self) -> &BTreeMap<String, String> {
        &self.root_links
    }

    pub fn resource(&self, identity: &str) -> Option<&CompiledResource> {
        self.resources.get(identity)
    }

    pub fn resources(&self) -> impl Iterator<Item = &CompiledResource> {
        self.resources.values()
    }
}

struct Compiler<'a> {
    root: &'a Value,
    resources: BTreeMap<String, CompiledResource>,
    /// Definition pointer -> identity, for definitions reached more than once.
    compiled_at: HashMap<String, String>,
    /// Identity -> definition pointer that claimed it.
    claimed: HashMap<String, String>,
}

impl<'a> Compiler<'a> {
    fn new(root: &'a Value) -> Self {
        Self {
            root,
            resources: BTreeMap::new(),
            compiled_at: HashMap::new(),
            claimed: HashMap::new(),
        }
    }

    /// Compile one resource map; `base` is the pointer of the map itself.
    fn compile_level(
        &mut self,
        nodes: &BTreeMap<String, ResourceNode>,
        base: &str,
    ) -> Result<BTreeMap<String, String>, CompileError> {
        let mut links = BTreeMap::new();
        for (link, node) in nodes {
            let at = pointer::join(base, link);
            let identity = match node {
                ResourceNode::Def(def) => self.compile_def(link, def, &at)?,
                ResourceNode::Ref(target) => {
                    let (def_at, def) = self.follow_resource_ref(target, &at)?;
                    let name = pointer::decode(&def_at).pop().unwrap_or_default();
                    self.compile_def(&name, &def, &def_at)?
                }
            };
            links.insert(link.clone(), identity);
        }
        Ok(links)
    }

    fn compile_def(
        &mut self,
        link: &str,
        def: &ResourceDef,
        at: &str,
    ) -> Result<String, CompileError> {
        // Shared definitions and self-referencing sub-resources land here again.
        if let Some(identity) = self.compiled_at.get(at) {
            return Ok(identity.clone());
        }

        let identity = def.id.clone().unwrap_or_else(|| link.to_string());
        if self.claimed.contains_key(&identity) {
            return Err(CompileError::DuplicateIdentity {
                identity,
                path: at.to_string(),
            });
        }
        self.claimed.insert(identity.clone(), at.to_string());
        self.compiled_at.insert(at.to_string(), identity.clone());

        let mut fields_index = FieldIndex::default();
        let mut expanding = Vec::new();
        let fields_schema = self.compile_fields(
            &def.fields,
            &format!("{}/fields", at),
            "",
            &mut fields_index,
            &mut expanding,
        )?;

        let links = self.compile_level(&def.resources, &format!("{}/resources", at))?;

        self.resources.insert(
            identity.clone(),
            CompiledResource {
                identity: identity.clone(),
                singleton: def.singleton,
                links,
                fields_index,
                fields_schema,
            },
        );

        Ok(identity)
    }

    /// Compile a field map. `at` locates the map in the document, `prefix` is the
    /// canonical pointer of the owning field ("" at the resource level).
    fn compile_fields(
        &self,
        fields: &BTreeMap<String, FieldNode>,
        at: &str,
        prefix: &str,
        index: &mut FieldIndex,
        expanding: &mut Vec<String>,
    ) -> Result<BTreeMap<String, FieldShape>, CompileError> {
        let mut shapes = BTreeMap::new();

        for (name, node) in fields {
            let node_at = pointer::join(at, name);
            let field = pointer::join(prefix, name);

            let (def_at, def) = self.resolve_field(node, &node_at)?;

            let inclusion = match def.inclusion.as_deref() {
                None => Inclusion::ByRequest,
                Some(tag) => {
                    Inclusion::parse(tag).ok_or_else(|| CompileError::InvalidInclusion {
                        path: format!("{}/inclusion", def_at),
                        value: tag.to_string(),
                    })?
                }
            };
            index.insert(inclusion, field.clone());

            if expanding.contains(&def_at) {
                let mut chain = expanding.clone();
                chain.push(def_at);
                return Err(CompileError::RefCycle {
                    path: node_at,
                    chain,
                });
            }
            expanding.push(def_at.clone());
            let children = self.compile_fields(
                &def.fields,
                &format!("{}/fields", def_at),
                &field,
                index,
                expanding,
            )?;
            expanding.pop();

            shapes.insert(
                name.clone(),
                FieldShape {
                    inclusion,
                    array: def.array,
                    fields: children,
                },
            );
        }

        Ok(shapes)
    }

    /// Resolve a field node to its definition and the pointer it lives at.
    fn resolve_field(
        &self,
        node: &FieldNode,
        at: &str,
    ) -> Result<(String, FieldDef), CompileError> {
        match node {
            FieldNode::Flag(_) => Ok((at.to_string(), FieldDef::default())),
            FieldNode::Def(def) => Ok((at.to_string(), def.clone())),
            FieldNode::Ref(target) => {
                let mut chain = vec![at.to_string()];
                let mut current = target.pointer().to_string();
                loop {
                    let node: FieldNode = self.load_ref(&chain, &current, at)?;
                    chain.push(current.clone());
                    match node {
                        FieldNode::Ref(next) => current = next.pointer().to_string(),
                        FieldNode::Flag(_) => return Ok((current, FieldDef::default())),
                        FieldNode::Def(def) => return Ok((current, def)),
                    }
                }
            }
        }
    }

    /// Follow a resource `$ref` (and any chain of refs behind it) to a definition.
    fn follow_resource_ref(
        &self,
        target: &RefNode,
        at: &str,
    ) -> Result<(String, ResourceDef), CompileError> {
        let mut chain = vec![at.to_string()];
        let mut current = target.pointer().to_string();
        loop {
            let node: ResourceNode = self.load_ref(&chain, &current, at)?;
            chain.push(current.clone());
            match node {
                ResourceNode::Ref(next) => current = next.pointer().to_string(),
                ResourceNode::Def(def) => return Ok((current, def)),
            }
        }
    }

    /// Load and deserialize the node at `target`, guarding against ref cycles.
    fn load_ref<T: serde::de::DeserializeOwned>(
        &self,
        chain: &[String],
        target: &str,
        at: &str,
    ) -> Result<T, CompileError> {
        if chain.iter().any(|seen| seen == target) {
            let mut chain = chain.to_vec();
            chain.push(target.to_string());
            return Err(CompileError::RefCycle {
                path: at.to_string(),
                chain,
            });
        }

        let value = self
            .root
            .pointer(target)
            .ok_or_else(|| CompileError::UnresolvedRef {
                path: at.to_string(),
                target: target.to_string(),
            })?;

        serde_json::from_value(value.clone()).map_err(|e| CompileError::MalformedNode {
            path: target.to_string(),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn compiles_inclusion_sets() {
        let schema = json!({
            "widgets": {
                "fields": {
                    "bar": { "inclusion": "default" },
                    "bazz": {
                        "fields": {
                            "plugh": { "inclusion": "default" },
                            "waldo": true
                        }
                    },
                    "foo": true,
                    "id": { "inclusion": "always" }
                }
            }
        });
        let compiled = CompiledSchema::compile(&schema).unwrap();
        let index = &compiled.resource("widgets").unwrap().fields_index;

        assert_eq!(index.always, set(&["/id"]));
        assert_eq!(index.default, set(&["/bar", "/bazz/plugh", "/id"]));
        assert_eq!(index.by_request, set(&["/bazz", "/bazz/waldo", "/foo"]));
    }

    #[test]
    fn always_is_subset_of_default() {
        let schema = json!({
            "a": { "fields": { "x": { "inclusion": "always", "fields": {
                "y": { "inclusion": "always" }
            } } } }
        });
        let compiled = CompiledSchema::compile(&schema).unwrap();
        for resource in compiled.resources() {
            let index = &resource.fields_index;
            assert!(index.always.is_subset(&index.default));
        }
    }

    #[test]
    fn escapes_field_names_in_pointers() {
        let schema = json!({
            "widgets": { "fields": { "a/b": { "fields": { "c~d": true } } } }
        });
        let compiled = CompiledSchema::compile(&schema).unwrap();
        let index = &compiled.resource("widgets").unwrap().fields_index;
        assert!(index.contains("/a~1b/c~0d"));
    }

    #[test]
    fn invalid_inclusion_errors() {
        let schema = json!({
            "widgets": { "fields": { "bar": { "inclusion": "sometimes" } } }
        });
        let result = CompiledSchema::compile(&schema);
        assert!(matches!(
            result,
            Err(CompileError::InvalidInclusion { value, path })
                if value == "sometimes" && path == "/widgets/fields/bar/inclusion"
        ));
    }

    #[test]
    fn duplicate_identity_errors() {
        let schema = json!({
            "gadgets": { "id": "widgets" },
            "widgets": {}
        });
        let result = CompiledSchema::compile(&schema);
        assert!(matches!(
            result,
            Err(CompileError::DuplicateIdentity { identity, .. }) if identity == "widgets"
        ));
    }

    #[test]
    fn nested_duplicate_identity_errors() {
        let schema = json!({
            "collections": { "resources": { "widgets": {} } },
            "widgets": {}
        });
        assert!(matches!(
            CompiledSchema::compile(&schema),
            Err(CompileError::DuplicateIdentity { .. })
        ));
    }

    #[test]
    fn id_overrides_link_name() {
        let schema = json!({ "bar": { "id": "notbar", "fields": { "barField": true } } });
        let compiled = CompiledSchema::compile(&schema).unwrap();
        assert_eq!(compiled.root_links()["bar"], "notbar");
        assert!(compiled.resource("notbar").is_some());
        assert!(compiled.resource("bar").is_none());
    }

    #[test]
    fn shared_definition_is_compiled_once() {
        let schema = json!({
            "collections": {
                "resources": { "widgets": { "$ref": "/widgets" } }
            },
            "widgets": {
                "fields": { "foo": { "inclusion": "default" } }
            }
        });
        let compiled = CompiledSchema::compile(&schema).unwrap();
        assert_eq!(compiled.resources().count(), 2);
        assert_eq!(
            compiled.resource("collections").unwrap().links["widgets"],
            "widgets"
        );
        assert_eq!(compiled.root_links()["widgets"], "widgets");
    }

    #[test]
    fn ref_chain_is_followed() {
        let schema = json!({
            "alias": { "$ref": "#/other" },
            "other": { "$ref": "/widgets" },
            "widgets": { "fields": { "foo": true } }
        });
        let compiled = CompiledSchema::compile(&schema).unwrap();
        assert_eq!(compiled.root_links()["alias"], "widgets");
        assert_eq!(compiled.root_links()["other"], "widgets");
    }

    #[test]
    fn self_referencing_resources_compile() {
        let schema = json!({
            "folders": {
                "fields": { "name": { "inclusion": "default" } },
                "resources": { "folders": { "$ref": "/folders" } }
            }
        });
        let compiled = CompiledSchema::compile(&schema).unwrap();
        let folders = compiled.resource("folders").unwrap();
        assert_eq!(folders.links["folders"], "folders");
    }

    #[test]
    fn ref_cycle_errors() {
        let schema = json!({
            "a": { "$ref": "/b" },
            "b": { "$ref": "/a" }
        });
        assert!(matches!(
            CompiledSchema::compile(&schema),
            Err(CompileError::RefCycle { .. })
        ));
    }

    #[test]
    fn unresolved_ref_errors() {
        let schema = json!({ "a": { "$ref": "/missing" } });
        assert!(matches!(
            CompiledSchema::compile(&schema),
            Err(CompileError::UnresolvedRef { target, .. }) if target == "/missing"
        ));
    }

    #[test]
    fn field_ref_uses_target_definition() {
        let schema = json!({
            "widgets": {
                "fields": {
                    "owner": { "$ref": "/people/fields/address" }
                }
            },
            "people": {
                "fields": {
                    "address": {
                        "inclusion": "default",
                        "fields": { "city": { "inclusion": "default" } }
                    }
                }
            }
        });
        let compiled = CompiledSchema::compile(&schema).unwrap();
        let widgets = compiled.resource("widgets").unwrap();
        assert_eq!(widgets.fields_index.default, set(&["/owner", "/owner/city"]));
        assert_eq!(widgets.fields_schema["owner"].inclusion, Inclusion::Default);
    }

    #[test]
    fn recursive_field_ref_errors() {
        let schema = json!({
            "nodes": {
                "fields": {
                    "child": {
                        "fields": { "child": { "$ref": "/nodes/fields/child" } }
                    }
                }
            }
        });
        assert!(matches!(
            CompiledSchema::compile(&schema),
            Err(CompileError::RefCycle { .. })
        ));
    }

    #[test]
    fn array_flag_reaches_shape() {
        let schema = json!({
            "widgets": {
                "fields": {
                    "bazz": { "array": true, "fields": { "plugh": true } }
                }
            }
        });
        let compiled = CompiledSchema::compile(&schema).unwrap();
        let bazz = &compiled.resource("widgets").unwrap().fields_schema["bazz"];
        assert!(bazz.array);
        assert!(bazz.fields.contains_key("plugh"));
    }

    #[test]
    fn structural_errors_fail_before_compiling() {
        let schema = json!({ "widgets": { "fields": [] } });
        assert!(matches!(
            CompiledSchema::compile(&schema),
            Err(CompileError::InvalidSchema { .. })
        ));
    }
}
