//! Drivers: the data-fetching collaborators behind each resource type.
//!
//! A driver is looked up by resource identity and asked for one instance (`by_id`) or
//! a page of the collection (`list`). [`DriverDispatch`] is the middleware that calls
//! it, checks the status contract and projects the output onto the selected fields.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::ProcessError;
use crate::middleware::{Middleware, Next};
use crate::projector::project;
use crate::query::ListParams;
use crate::types::{Context, Link, Mode, Request, Response};

/// Status assumed when a driver reports none.
pub const DEFAULT_STATUS: u16 = 200;

/// Output of [`Driver::by_id`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ByIdResponse {
    pub resource: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl ByIdResponse {
    pub fn new(resource: Value) -> Self {
        Self {
            resource,
            ..Default::default()
        }
    }

    pub fn status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Output of [`Driver::list`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListResponse {
    pub resources: Vec<Value>,
    /// Cursor for the following page, passed to the client unchanged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<Value>,
    /// Cursor for the preceding page, passed to the client unchanged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl ListResponse {
    pub fn new(resources: Vec<Value>) -> Self {
        Self {
            resources,
            ..Default::default()
        }
    }

    pub fn next(mut self, cursor: impl Into<Value>) -> Self {
        self.next = Some(cursor.into());
        self
    }

    pub fn previous(mut self, cursor: impl Into<Value>) -> Self {
        self.previous = Some(cursor.into());
        self
    }

    pub fn status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

/// Data access for one resource type.
///
/// Both operations default to `ProcessError::Unsupported`.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Fetch one instance. `links` carries every ancestor's `{type, id}` for scoping.
    async fn by_id(
        &self,
        links: &[Link],
        request: &Request,
        aux: &Value,
    ) -> Result<ByIdResponse, ProcessError> {
        let _ = (links, aux);
        Err(ProcessError::Unsupported {
            identity: request.identity().to_string(),
            operation: "by_id",
        })
    }

    /// Fetch a page of the collection.
    async fn list(
        &self,
        params: &ListParams,
        request: &Request,
        aux: &Value,
    ) -> Result<ListResponse, ProcessError> {
        let _ = (params, aux);
        Err(ProcessError::Unsupported {
            identity: request.identity().to_string(),
            operation: "list",
        })
    }
}

/// Drivers keyed by resource identity.
#[derive(Clone, Default)]
pub struct DriverRegistry {
    drivers: HashMap<String, Arc<dyn Driver>>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `driver` for `identity`, replacing any previous one.
    pub fn register(&mut self, identity: impl Into<String>, driver: impl Driver + 'static) -> &mut Self {
        self.insert(identity, Arc::new(driver))
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, identity: impl Into<String>, driver: impl Driver + 'static) -> Self {
        self.register(identity, driver);
        self
    }

    /// Register an already shared driver.
    pub fn insert(&mut self, identity: impl Into<String>, driver: Arc<dyn Driver>) -> &mut Self {
        self.drivers.insert(identity.into(), driver);
        self
    }

    pub fn get(&self, identity: &str) -> Option<&Arc<dyn Driver>> {
        self.drivers.get(identity)
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }
}

impl std::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut identities: Vec<_> = self.drivers.keys().collect();
        identities.sort();
        f.debug_struct("DriverRegistry")
            .field("identities", &identities)
            .finish()
    }
}

/// Middleware calling the driver registered for the addressed resource type.
///
/// Fills the response envelope, then continues the chain. Without a matching driver
/// the response is left untouched.
#[derive(Debug, Clone, Default)]
pub struct DriverDispatch {
    drivers: DriverRegistry,
}

impl DriverDispatch {
    pub fn new(drivers: DriverRegistry) -> Self {
        Self { drivers }
    }

    async fn fetch_one(
        &self,
        driver: &dyn Driver,
        ctx: &mut Context,
    ) -> Result<(), ProcessError> {
        let output = driver
            .by_id(&ctx.request.resource, &ctx.request, &ctx.aux)
            .await?;
        let status = check_status(ctx.request.identity(), output.status, &output)?;

        let body = project(&ctx.request.fields_array_structure, &output.resource)?;
        ctx.response = Response {
            status,
            headers: output.headers,
            body: Some(body),
        };
        Ok(())
    }

    async fn fetch_page(
        &self,
        driver: &dyn Driver,
        ctx: &mut Context,
    ) -> Result<(), ProcessError> {
        let params = ctx.request.list.clone().unwrap_or_default();
        let output = driver.list(&params, &ctx.request, &ctx.aux).await?;
        let status = check_status(ctx.request.identity(), output.status, &output)?;

        let tree = &ctx.request.fields_array_structure;
        let resources = output
            .resources
            .iter()
            .map(|resource| project(tree, resource))
            .collect::<Result<Vec<_>, _>>()?;

        let mut body = Map::new();
        body.insert("resources".to_string(), Value::Array(resources));
        if let Some(next) = output.next {
            body.insert("next".to_string(), next);
        }
        if let Some(previous) = output.previous {
            body.insert("previous".to_string(), previous);
        }

        ctx.response = Response {
            status,
            headers: output.headers,
            body: Some(Value::Object(body)),
        };
        Ok(())
    }
}

#[async_trait]
impl Middleware for DriverDispatch {
    async fn handle(&self, ctx: &mut Context, next: Next<'_>) -> Result<(), ProcessError> {
        match self.drivers.get(ctx.request.identity()).cloned() {
            Some(driver) => {
                match ctx.request.mode {
                    Mode::Get => self.fetch_one(driver.as_ref(), ctx).await?,
                    Mode::List => self.fetch_page(driver.as_ref(), ctx).await?,
                }
                debug!(
                    identity = ctx.request.identity(),
                    mode = ?ctx.request.mode,
                    status = ctx.response.status,
                    "driver responded"
                );
            }
            None => {
                debug!(identity = ctx.request.identity(), "no driver registered");
            }
        }

        next.run(ctx).await
    }
}

/// Enforce the 2xx contract, keeping the raw output for diagnostics on failure.
fn check_status<T: Serialize>(
    identity: &str,
    status: Option<u16>,
    output: &T,
) -> Result<u16, ProcessError> {
    let status = status.unwrap_or(DEFAULT_STATUS);
    if (200..300).contains(&status) {
        return Ok(status);
    }

    warn!(identity, status, "driver returned non-success status");
    Err(ProcessError::DriverStatus {
        identity: identity.to_string(),
        status,
        response: serde_json::to_value(output).unwrap_or(Value::Null),
    })
}
