//! Fieldshape
//!
//! Declarative resource shapes and sparse-fieldset resolution for read-only REST services.
//!
//! A schema document declares resource types, their sub-resources and their fields.
//! Each field carries an inclusion tier. The [`Service`] compiles the schema once, then
//! turns each `GET` request into a prepared [`Request`] (link chain, selected fields,
//! paging), runs it through a middleware chain, and projects driver output onto exactly
//! the selected fields.
//!
//! # Example
//!
//! ```
//! use fieldshape::{ByIdResponse, Driver, DriverRegistry, Link, ProcessError, RawRequest, Request, Service};
//! use serde_json::{json, Value};
//!
//! struct Widgets;
//!
//! #[async_trait::async_trait]
//! impl Driver for Widgets {
//!     async fn by_id(&self, links: &[Link], _: &Request, _: &Value) -> Result<ByIdResponse, ProcessError> {
//!         let id = links.last().and_then(|l| l.id.clone());
//!         Ok(ByIdResponse::new(json!({ "id": id, "name": "sprocket", "secret": 1 })))
//!     }
//! }
//!
//! let schema = json!({
//!     "widgets": {
//!         "fields": {
//!             "id": { "inclusion": "always" },
//!             "name": { "inclusion": "default" },
//!             "secret": true
//!         }
//!     }
//! });
//!
//! let service = Service::with_drivers(&schema, DriverRegistry::new().with("widgets", Widgets)).unwrap();
//! let response = tokio_test_block_on(service.process(RawRequest::get("/widgets/w1"))).unwrap();
//!
//! // "secret" is byRequest, so it is not sent unless asked for
//! assert_eq!(response.body, Some(json!({ "id": "w1", "name": "sprocket" })));
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Runtime::new().unwrap().block_on(f)
//! # }
//! ```
//!
//! # Inclusion Tiers
//!
//! | Inclusion | No `f` parameter | `f` names other fields | `f` names it |
//! |-----------|------------------|------------------------|--------------|
//! | `"always"` | Sent | Sent | Sent |
//! | `"default"` | Sent | Not sent | Sent |
//! | `"byRequest"` (or `true`) | Not sent | Not sent | Sent |
//!
//! # Field Specifiers
//!
//! The `f` query parameter takes a comma-separated list of specifiers, in dot syntax
//! or as a JSON array of segments:
//! ```text
//! ?f=name,bazz.plugh
//! ?f=["bazz","plugh"]
//! ```

mod compiler;
mod destructure;
mod driver;
mod error;
mod fields;
mod loader;
mod meta;
mod middleware;
pub mod pointer;
mod projector;
mod query;
mod resolver;
mod service;
mod types;

pub use compiler::{CompiledResource, CompiledSchema, FieldIndex, FieldShape};
pub use destructure::{ArrayStructure, Destructure};
pub use driver::{ByIdResponse, Driver, DriverDispatch, DriverRegistry, ListResponse, DEFAULT_STATUS};
pub use error::{
    BoxError, CompileError, LoadError, ProcessError, ProjectError, RequestError, SchemaViolation,
};
pub use fields::{canonicalize, parse_specifier, select_fields};
pub use loader::{load, load_data, load_schema, parse_input, InputKind, Source};
pub use meta::{check_structure, meta_schema};
pub use middleware::{dispatch, Middleware, Next};
pub use projector::project;
pub use query::{
    decode_component, parse_query_string, ListParams, OrderDirection, QueryMap, FIELDS_KEY,
    LIST_KEYS,
};
pub use resolver::{resolve_path, split_path, ResolvedPath};
pub use service::{Service, ServiceOptions};
pub use types::{
    json_type_name, Context, FieldDef, FieldNode, Inclusion, Link, Mode, RawRequest, RefNode,
    Request, ResourceDef, ResourceNode, Response, READ_METHOD,
};
