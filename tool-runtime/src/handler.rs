//! Typed handler trait and its type-erased adapter.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::context::InvocationContext;
use crate::error::ToolError;
use crate::record::ToolRecord;
use crate::response::ToolResponse;
use crate::supervisor::Supervisor;

/// A tool implementation taking a typed input and producing a typed output.
///
/// Implemented for every `Fn(InvocationContext, In) -> impl Future` closure,
/// so most tools never implement it by hand.
#[async_trait]
pub trait TypedHandler<In, Out>: Send + Sync + 'static {
    /// Runs the tool.
    ///
    /// # Errors
    ///
    /// Returns a [`ToolError`] describing why the call failed.
    async fn call(&self, ctx: InvocationContext, input: In) -> Result<Out, ToolError>;
}

#[async_trait]
impl<F, Fut, In, Out> TypedHandler<In, Out> for F
where
    F: Fn(InvocationContext, In) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Out, ToolError>> + Send + 'static,
    In: Send + 'static,
    Out: Send + 'static,
{
    async fn call(&self, ctx: InvocationContext, input: In) -> Result<Out, ToolError> {
        (self)(ctx, input).await
    }
}

/// Object-safe wrapper that hides a handler's input and output types.
#[async_trait]
pub(crate) trait ErasedTool: Send + Sync {
    async fn run(
        &self,
        supervisor: &Supervisor,
        ctx: InvocationContext,
        payload: &Value,
    ) -> ToolResponse;
}

pub(crate) struct TypedTool<In, Out, H> {
    handler: Arc<H>,
    _types: PhantomData<fn(In) -> Out>,
}

impl<In, Out, H> TypedTool<In, Out, H> {
    pub(crate) fn new(handler: H) -> Self {
        Self {
            handler: Arc::new(handler),
            _types: PhantomData,
        }
    }
}

#[async_trait]
impl<In, Out, H> ErasedTool for TypedTool<In, Out, H>
where
    In: ToolRecord,
    Out: Serialize + Send + 'static,
    H: TypedHandler<In, Out>,
{
    async fn run(
        &self,
        supervisor: &Supervisor,
        ctx: InvocationContext,
        payload: &Value,
    ) -> ToolResponse {
        supervisor.execute(ctx, &self.handler, payload).await
    }
}
