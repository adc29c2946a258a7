//! The wrapped-call contract between the engine and the persistence layer.

use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;
use serde_json::Value;

use strata_core::AppResult;

use crate::api::context::ExecutionContext;

/// The operation a hook chain wraps.
///
/// Implemented by the persistence layer (document save, query execution,
/// bulk insert, aggregation). It reads and mutates the scope object through
/// the context and reports one result.
#[async_trait]
pub trait WrappedCall: Send + Sync {
    /// Performs the operation.
    async fn call(&self, ctx: ExecutionContext) -> AppResult<Value>;
}

/// Adapter that lets a closure act as a [`WrappedCall`].
pub struct FnCall<F, Fut> {
    f: F,
    _future: PhantomData<fn() -> Fut>,
}

/// Wraps an async closure as a [`WrappedCall`].
pub fn wrapped_fn<F, Fut>(f: F) -> FnCall<F, Fut>
where
    F: Fn(ExecutionContext) -> Fut + Send + Sync,
    Fut: Future<Output = AppResult<Value>> + Send + 'static,
{
    FnCall {
        f,
        _future: PhantomData,
    }
}

#[async_trait]
impl<F, Fut> WrappedCall for FnCall<F, Fut>
where
    F: Fn(ExecutionContext) -> Fut + Send + Sync,
    Fut: Future<Output = AppResult<Value>> + Send + 'static,
{
    async fn call(&self, ctx: ExecutionContext) -> AppResult<Value> {
        (self.f)(ctx).await
    }
}

/// A wrapped call that does nothing and returns `null`.
///
/// Used for derived operations whose real work lives entirely in hooks.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCall;

#[async_trait]
impl WrappedCall for NoopCall {
    async fn call(&self, _ctx: ExecutionContext) -> AppResult<Value> {
        Ok(Value::Null)
    }
}
