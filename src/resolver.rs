//! Path resolution - walks a request path through the compiled resource graph.

use crate::compiler::CompiledSchema;
use crate::error::RequestError;
use crate::query::decode_component;
use crate::types::{Link, Mode};

/// Result of walking a request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// One link per resource along the path; ancestors always carry their id.
    pub links: Vec<Link>,
    pub mode: Mode,
}

impl ResolvedPath {
    /// Identity of the terminal resource type.
    pub fn identity(&self) -> &str {
        self.links
            .last()
            .map(|link| link.resource_type.as_str())
            .unwrap_or_default()
    }

    /// Id of the terminal instance, if addressed.
    pub fn id(&self) -> Option<&str> {
        self.links.last().and_then(|link| link.id.as_deref())
    }
}

/// Split a path into decoded, non-empty segments.
///
/// # Errors
///
/// Returns `RequestError` if the path does not start with `/` or a segment is not
/// valid percent-encoded UTF-8.
pub fn split_path(path: &str) -> Result<Vec<String>, RequestError> {
    let Some(rest) = path.strip_prefix('/') else {
        return Err(RequestError::PathNotAbsolute {
            path: path.to_string(),
        });
    };

    rest.split('/')
        .filter(|segment| !segment.is_empty())
        .map(decode_component)
        .collect()
}

/// Resolve a request path against the compiled schema.
///
/// Alternates link names and instance ids: `/collections/c1/widgets/w1`. Singleton
/// resources consume no id segment; their id is the link name itself. A path that
/// ends right after a non-singleton link name addresses the collection (list mode).
///
/// # Errors
///
/// Returns `RequestError` for malformed paths and unknown link names.
pub fn resolve_path(schema: &CompiledSchema, path: &str) -> Result<ResolvedPath, RequestError> {
    let segments = split_path(path)?;
    if segments.is_empty() {
        return Err(RequestError::EmptyPath {
            path: path.to_string(),
        });
    }

    let mut links = Vec::new();
    let mut level = schema.root_links();
    let mut remaining = segments.into_iter();

    while let Some(link) = remaining.next() {
        let resource = level
            .get(&link)
            .and_then(|identity| schema.resource(identity))
            .ok_or_else(|| RequestError::UnknownResource {
                path: path.to_string(),
                link: link.clone(),
            })?;

        let id = if resource.singleton {
            Some(link)
        } else {
            remaining.next()
        };

        links.push(Link::new(resource.identity.clone(), id));
        level = &resource.links;
    }

    let mode = match links.last().and_then(|link| link.id.as_ref()) {
        Some(_) => Mode::Get,
        None => Mode::List,
    };

    Ok(ResolvedPath { links, mode })
}
