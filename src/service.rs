//! The request entry point.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, instrument};

use crate::compiler::CompiledSchema;
use crate::destructure::ArrayStructure;
use crate::driver::{DriverDispatch, DriverRegistry};
use crate::error::{CompileError, ProcessError, RequestError};
use crate::fields::select_fields;
use crate::middleware::{dispatch, Middleware};
use crate::query::{parse_query_string, ListParams, FIELDS_KEY};
use crate::resolver::resolve_path;
use crate::types::{Context, Mode, RawRequest, Request, Response, READ_METHOD};

/// Paging options applied to list requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceOptions {
    /// Limit used when a list request carries none.
    pub default_limit: Option<u64>,
    /// Upper bound for client-supplied limits.
    pub max_limit: Option<u64>,
}

impl ServiceOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn default_limit(mut self, limit: u64) -> Self {
        self.default_limit = Some(limit);
        self
    }

    pub fn max_limit(mut self, limit: u64) -> Self {
        self.max_limit = Some(limit);
        self
    }

    fn apply(&self, params: &mut ListParams) {
        if params.limit.is_none() {
            params.limit = self.default_limit;
        }
        if let (Some(limit), Some(max)) = (params.limit, self.max_limit) {
            params.limit = Some(limit.min(max));
        }
    }
}

/// A compiled schema plus the middleware chain that serves it.
///
/// `process` takes `&self`; concurrent requests share only the read-only schema.
#[derive(Clone)]
pub struct Service {
    schema: Arc<CompiledSchema>,
    middleware: Vec<Arc<dyn Middleware>>,
    options: ServiceOptions,
}

impl Service {
    /// Compile `schema` into a service with an empty middleware chain.
    ///
    /// # Errors
    ///
    /// Returns `CompileError` if the schema does not compile.
    pub fn new(schema: &Value) -> Result<Self, CompileError> {
        Ok(Self::from_compiled(Arc::new(CompiledSchema::compile(schema)?)))
    }

    /// Compile `schema` and register a [`DriverDispatch`] for `drivers` as the first middleware.
    pub fn with_drivers(schema: &Value, drivers: DriverRegistry) -> Result<Self, CompileError> {
        let mut service = Self::new(schema)?;
        service.use_middleware(DriverDispatch::new(drivers));
        Ok(service)
    }

    pub fn from_compiled(schema: Arc<CompiledSchema>) -> Self {
        Self {
            schema,
            middleware: Vec::new(),
            options: ServiceOptions::default(),
        }
    }

    pub fn options(mut self, options: ServiceOptions) -> Self {
        self.options = options;
        self
    }

    /// Append a middleware to the chain.
    pub fn use_middleware(&mut self, middleware: impl Middleware + 'static) -> &mut Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    pub fn schema(&self) -> &CompiledSchema {
        &self.schema
    }

    /// Resolve a raw request into the record drivers and middleware see.
    ///
    /// Runs every request-shape check; nothing is dispatched.
    ///
    /// # Errors
    ///
    /// Returns `RequestError` for a wrong method, a malformed path or query, an unknown
    /// resource or a malformed field specifier.
    pub fn prepare(&self, raw: &RawRequest) -> Result<Request, RequestError> {
        if raw.method != READ_METHOD {
            return Err(RequestError::MethodNotAllowed {
                method: raw.method.clone(),
            });
        }

        let resolved = resolve_path(&self.schema, &raw.path)?;
        let resource = self.schema.resource(resolved.identity()).ok_or_else(|| {
            RequestError::UnknownResource {
                path: raw.path.clone(),
                link: resolved.identity().to_string(),
            }
        })?;

        let mut query = parse_query_string(&raw.query_string)?;
        let requested = query.remove(FIELDS_KEY);
        let fields = select_fields(&resource.fields_index, requested.as_deref())?;
        let fields_array_structure = ArrayStructure::build(&fields, &resource.fields_schema);

        let list = match resolved.mode {
            Mode::Get => None,
            Mode::List => {
                let mut params = ListParams::take_from(&mut query)?;
                self.options.apply(&mut params);
                Some(params)
            }
        };

        debug!(
            identity = resolved.identity(),
            mode = ?resolved.mode,
            fields = fields.len(),
            "prepared request"
        );

        Ok(Request {
            method: raw.method.clone(),
            mode: resolved.mode,
            resource: resolved.links,
            fields,
            fields_array_structure,
            list,
            query,
        })
    }

    /// Serve a request.
    ///
    /// # Errors
    ///
    /// Returns `ProcessError` on request-shape errors (before any middleware runs) or
    /// on the first middleware or driver failure. No partial response is returned.
    pub async fn process(&self, raw: RawRequest) -> Result<Response, ProcessError> {
        self.process_with_aux(raw, Value::Null).await
    }

    /// Like [`process`](Self::process), forwarding `aux` to drivers untouched.
    #[instrument(skip_all, fields(method = %raw.method, path = %raw.path))]
    pub async fn process_with_aux(
        &self,
        raw: RawRequest,
        aux: Value,
    ) -> Result<Response, ProcessError> {
        let request = self.prepare(&raw)?;
        let mut ctx = Context::new(request, aux);
        dispatch(&self.middleware, &mut ctx).await?;
        Ok(ctx.response)
    }
}

impl std::fmt::Debug for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service")
            .field("resources", &self.schema.resources().count())
            .field("middleware", &self.middleware.len())
            .field("options", &self.options)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn service() -> Service {
        Service::new(&json!({
            "widgets": {
                "fields": {
                    "bar": { "inclusion": "default" },
                    "bazz": {
                        "array": true,
                        "fields": { "plugh": { "inclusion": "default" } }
                    },
                    "id": { "inclusion": "always" }
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn prepare_get_request() {
        let request = service()
            .prepare(&RawRequest::get("/widgets/w1").query("tag=x"))
            .unwrap();

        assert_eq!(request.mode, Mode::Get);
        assert_eq!(request.identity(), "widgets");
        assert_eq!(request.id(), Some("w1"));
        assert_eq!(request.fields, vec!["/bar", "/bazz/plugh", "/id"]);
        assert_eq!(
            serde_json::to_value(&request.fields_array_structure).unwrap(),
            json!({ "/bar": true, "/bazz": { "/plugh": true }, "/id": true })
        );
        assert!(request.list.is_none());
        assert_eq!(request.query["tag"], vec!["x"]);
    }

    #[test]
    fn get_mode_keeps_list_keys_in_query() {
        let request = service()
            .prepare(&RawRequest::get("/widgets/w1").query("limit=3"))
            .unwrap();
        assert_eq!(request.query["limit"], vec!["3"]);
    }

    #[test]
    fn prepare_list_request() {
        let request = service()
            .prepare(&RawRequest::get("/widgets").query("after=2&limit=3&f=bar"))
            .unwrap();

        assert_eq!(request.mode, Mode::List);
        assert_eq!(request.fields, vec!["/bar", "/id"]);
        let list = request.list.unwrap();
        assert_eq!(list.after.as_deref(), Some("2"));
        assert_eq!(list.limit, Some(3));
        assert!(request.query.is_empty());
    }

    #[test]
    fn options_fill_and_clamp_limit() {
        let service = service().options(ServiceOptions::new().default_limit(10).max_limit(50));

        let request = service.prepare(&RawRequest::get("/widgets")).unwrap();
        assert_eq!(request.list.unwrap().limit, Some(10));

        let request = service
            .prepare(&RawRequest::get("/widgets").query("limit=500"))
            .unwrap();
        assert_eq!(request.list.unwrap().limit, Some(50));
    }

    #[test]
    fn non_get_method_errors() {
        let result = service().prepare(&RawRequest::new("POST", "/widgets/w1"));
        assert!(matches!(
            result,
            Err(RequestError::MethodNotAllowed { method }) if method == "POST"
        ));
    }

    #[test]
    fn request_serializes_in_camel_case() {
        let request = service()
            .prepare(&RawRequest::get("/widgets").query("order=bar,desc"))
            .unwrap();
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["mode"], "list");
        assert_eq!(value["resource"], json!([{ "type": "widgets" }]));
        assert_eq!(value["list"], json!({ "orderName": "bar", "orderDirection": -1 }));
        assert!(value.get("fieldsArrayStructure").is_some());
    }

    #[tokio::test]
    async fn no_middleware_answers_not_found() {
        let response = service().process(RawRequest::get("/widgets/w1")).await.unwrap();
        assert_eq!(response, Response::not_found());
    }
}
