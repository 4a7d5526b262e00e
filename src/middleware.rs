//! Middleware pipeline.
//!
//! Handlers run strictly in registration order. Each receives the shared [`Context`]
//! and a [`Next`] for the rest of the chain; it may work before and/or after awaiting
//! `next.run(ctx)`, or not call it at all to stop the chain. `Next` is consumed by
//! `run`, so the remainder runs at most once per handler.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ProcessError;
use crate::types::Context;

/// A request handler in the pipeline.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, ctx: &mut Context, next: Next<'_>) -> Result<(), ProcessError>;
}

/// The remainder of the chain after the current handler.
pub struct Next<'a> {
    chain: &'a [Arc<dyn Middleware>],
}

impl<'a> Next<'a> {
    pub(crate) fn new(chain: &'a [Arc<dyn Middleware>]) -> Self {
        Self { chain }
    }

    /// Run the remaining handlers. At the end of the chain this does nothing.
    pub async fn run(self, ctx: &mut Context) -> Result<(), ProcessError> {
        match self.chain.split_first() {
            Some((head, rest)) => head.handle(ctx, Next::new(rest)).await,
            None => Ok(()),
        }
    }
}

/// Run `chain` over `ctx`.
pub async fn dispatch(chain: &[Arc<dyn Middleware>], ctx: &mut Context) -> Result<(), ProcessError> {
    Next::new(chain).run(ctx).await
}
