//! Array destructuring: where the selected fields cross array boundaries.
//!
//! The tree maps canonical pointers to either `Copy` (take the value verbatim) or
//! `Array` (iterate the source array here and apply the nested tree to every element,
//! with pointers relative to the element). Serialized, `Copy` is `true` and `Array` is
//! the nested object.

use std::collections::BTreeMap;

use serde::{Serialize, Serializer};

use crate::compiler::FieldShape;
use crate::pointer;

/// One entry of an [`ArrayStructure`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destructure {
    Copy,
    Array(ArrayStructure),
}

impl Serialize for Destructure {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Destructure::Copy => serializer.serialize_bool(true),
            Destructure::Array(inner) => inner.serialize(serializer),
        }
    }
}

/// Array destructure tree for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ArrayStructure(BTreeMap<String, Destructure>);

impl ArrayStructure {
    /// Build the tree for `fields` (canonical pointers) of a resource shaped by `shape`.
    ///
    /// A field that is requested whole wins over requests for anything below it,
    /// whether or not an array boundary lies in between.
    pub fn build(fields: &[String], shape: &BTreeMap<String, FieldShape>) -> Self {
        let mut tree = ArrayStructure::default();
        for field in fields {
            if fields.iter().any(|other| is_strict_prefix(other, field)) {
                continue;
            }
            let (boundaries, leaf) = split_at_arrays(field, shape);
            tree.insert_path(&boundaries, leaf);
        }
        tree
    }

    pub fn get(&self, pointer: &str) -> Option<&Destructure> {
        self.0.get(pointer)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Destructure)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    fn insert_path(&mut self, boundaries: &[String], leaf: String) {
        match boundaries.split_first() {
            None => {
                self.0.insert(leaf, Destructure::Copy);
            }
            Some((head, rest)) => {
                let entry = self
                    .0
                    .entry(head.clone())
                    .or_insert_with(|| Destructure::Array(ArrayStructure::default()));
                if let Destructure::Array(inner) = entry {
                    inner.insert_path(rest, leaf);
                }
            }
        }
    }
}

/// Whether pointer `ancestor` addresses a value strictly containing `field`.
fn is_strict_prefix(ancestor: &str, field: &str) -> bool {
    field
        .strip_prefix(ancestor)
        .is_some_and(|rest| rest.starts_with('/'))
}

/// Walk `field` through the shape, cutting it after every array-valued segment that
/// is followed by more segments. Returns the relative pointers of the boundaries and
/// of the remaining leaf.
fn split_at_arrays(field: &str, shape: &BTreeMap<String, FieldShape>) -> (Vec<String>, String) {
    let mut boundaries = Vec::new();
    let mut pending: Vec<String> = Vec::new();
    let mut level = Some(shape);
    let mut current: Option<&FieldShape> = None;

    for segment in pointer::decode(field) {
        if current.is_some_and(|s| s.array) && !pending.is_empty() {
            boundaries.push(pointer::encode(&pending));
            pending.clear();
        }
        current = level.and_then(|fields| fields.get(&segment));
        level = current.map(|s| &s.fields);
        pending.push(segment);
    }

    (boundaries, pointer::encode(&pending))
}
