//! Hook phases, modes, and the explicit body shapes a hook can take.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use strata_core::types::{Operation, ScopeKind};
use strata_core::{AppError, AppResult};

use crate::api::context::ExecutionContext;

use super::signal::Next;

/// Which side of the wrapped operation a hook runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Before the wrapped operation.
    Pre,
    /// After the wrapped operation.
    Post,
}

impl Phase {
    /// Returns the string name of this phase.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pre => "pre",
            Self::Post => "post",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Execution mode of a hook. Parallel is only valid for pre hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookMode {
    /// Runs alone, in registration order.
    #[default]
    Serial,
    /// Starts alongside other parallel hooks; joined before the operation.
    Parallel,
}

/// Calling convention of a hook body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookKind {
    /// Runs synchronously and advances when it returns.
    Plain,
    /// Completes by signaling a [`Next`] handle.
    AsyncContinuation,
    /// Receives the chain's error and may replace it.
    ErrorHandling,
}

/// Future returned by continuation-style bodies.
pub type HookFuture = BoxFuture<'static, ()>;

/// Synchronous pre body.
pub type PrePlainFn = Arc<dyn Fn(&ExecutionContext) -> AppResult<()> + Send + Sync>;
/// Serial pre body completing through `next`.
pub type PreDeferredFn = Arc<dyn Fn(ExecutionContext, Next) -> HookFuture + Send + Sync>;
/// Parallel pre body with separate `next` (advance) and `done` signals.
pub type PreParallelFn = Arc<dyn Fn(ExecutionContext, Next, Next) -> HookFuture + Send + Sync>;
/// Synchronous post body receiving the operation result.
pub type PostPlainFn = Arc<dyn Fn(&ExecutionContext, &Value) + Send + Sync>;
/// Post body receiving the result and completing through `next`.
pub type PostDeferredFn = Arc<dyn Fn(ExecutionContext, Value, Next) -> HookFuture + Send + Sync>;
/// Error-handling post body: error, result (if any), continuation.
pub type ErrorHandlerFn =
    Arc<dyn Fn(ExecutionContext, AppError, Option<Value>, Next) -> HookFuture + Send + Sync>;

/// A hook body, tagged with its shape at construction time.
#[derive(Clone)]
pub enum HookBody {
    /// `pre`, synchronous.
    PrePlain(PrePlainFn),
    /// `pre`, continuation.
    PreDeferred(PreDeferredFn),
    /// `pre`, parallel with advance and done signals.
    PreParallel(PreParallelFn),
    /// `post`, synchronous.
    PostPlain(PostPlainFn),
    /// `post`, continuation.
    PostDeferred(PostDeferredFn),
    /// `post`, error handling.
    ErrorHandler(ErrorHandlerFn),
}

impl HookBody {
    /// Synchronous pre hook. Returning `Err` stops the chain.
    pub fn pre<F>(f: F) -> Self
    where
        F: Fn(&ExecutionContext) -> AppResult<()> + Send + Sync + 'static,
    {
        Self::PrePlain(Arc::new(f))
    }

    /// Pre hook that completes by calling `next.ok()` or `next.err(..)`.
    pub fn pre_deferred<F, Fut>(f: F) -> Self
    where
        F: Fn(ExecutionContext, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::PreDeferred(Arc::new(move |ctx, next| f(ctx, next).boxed()))
    }

    /// Parallel pre hook. `next` lets the following hook start; `done`
    /// must fire before the wrapped operation may begin.
    pub fn pre_parallel<F, Fut>(f: F) -> Self
    where
        F: Fn(ExecutionContext, Next, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::PreParallel(Arc::new(move |ctx, next, done| f(ctx, next, done).boxed()))
    }

    /// Synchronous post hook receiving the operation result.
    pub fn post<F>(f: F) -> Self
    where
        F: Fn(&ExecutionContext, &Value) + Send + Sync + 'static,
    {
        Self::PostPlain(Arc::new(f))
    }

    /// Post hook that blocks the chain until `next` is signaled.
    pub fn post_deferred<F, Fut>(f: F) -> Self
    where
        F: Fn(ExecutionContext, Value, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::PostDeferred(Arc::new(move |ctx, result, next| f(ctx, result, next).boxed()))
    }

    /// Error-handling post hook. Only runs when the chain carries an error.
    ///
    /// `next.err(e)` replaces the error; `next.ok()` moves on but cannot
    /// clear it.
    pub fn error_handler<F, Fut>(f: F) -> Self
    where
        F: Fn(ExecutionContext, AppError, Option<Value>, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::ErrorHandler(Arc::new(move |ctx, error, result, next| {
            f(ctx, error, result, next).boxed()
        }))
    }

    /// Returns the calling convention of this body.
    pub fn kind(&self) -> HookKind {
        match self {
            Self::PrePlain(_) | Self::PostPlain(_) => HookKind::Plain,
            Self::PreDeferred(_) | Self::PreParallel(_) | Self::PostDeferred(_) => {
                HookKind::AsyncContinuation
            }
            Self::ErrorHandler(_) => HookKind::ErrorHandling,
        }
    }

    /// Returns the phase this body's signature belongs to.
    pub fn phase(&self) -> Phase {
        match self {
            Self::PrePlain(_) | Self::PreDeferred(_) | Self::PreParallel(_) => Phase::Pre,
            Self::PostPlain(_) | Self::PostDeferred(_) | Self::ErrorHandler(_) => Phase::Post,
        }
    }

    /// Returns a short name for the body shape, used in logs and errors.
    pub fn shape(&self) -> &'static str {
        match self {
            Self::PrePlain(_) => "pre(ctx)",
            Self::PreDeferred(_) => "pre(ctx, next)",
            Self::PreParallel(_) => "pre(ctx, next, done)",
            Self::PostPlain(_) => "post(ctx, result)",
            Self::PostDeferred(_) => "post(ctx, result, next)",
            Self::ErrorHandler(_) => "post(ctx, error, result, next)",
        }
    }

    /// Checks this body against the phase and mode it is registered under.
    pub fn check(&self, phase: Phase, mode: HookMode) -> AppResult<()> {
        if phase == Phase::Post && mode == HookMode::Parallel {
            return Err(AppError::invalid_mode(
                "parallel mode is only supported for pre hooks",
            ));
        }
        if self.phase() != phase {
            return Err(AppError::invalid_arity(format!(
                "a {} body cannot be registered as a {phase} hook",
                self.shape()
            )));
        }
        match (self, mode) {
            (Self::PreParallel(_), HookMode::Serial) => Err(AppError::invalid_mode(
                "a body taking (ctx, next, done) must be registered in parallel mode",
            )),
            (Self::PreDeferred(_), HookMode::Parallel) => Err(AppError::invalid_arity(
                "parallel hooks take (ctx, next, done); got (ctx, next)",
            )),
            _ => Ok(()),
        }
    }
}

impl fmt::Debug for HookBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HookBody").field(&self.shape()).finish()
    }
}

/// Scope selection for a registration.
///
/// Unset flags fall back to the operation's default scopes, so
/// `pre("remove", ..)` only fires for document `remove` unless
/// `query: Some(true)` is given.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookOptions {
    /// Register for the document-scoped variant.
    pub document: Option<bool>,
    /// Register for the query-scoped variant.
    pub query: Option<bool>,
}

impl HookOptions {
    /// Document middleware only.
    pub fn document_only() -> Self {
        Self {
            document: Some(true),
            query: Some(false),
        }
    }

    /// Query middleware only.
    pub fn query_only() -> Self {
        Self {
            document: Some(false),
            query: Some(true),
        }
    }

    /// Resolves `name` to the operations a registration applies to.
    pub fn resolve(&self, name: &str) -> AppResult<Vec<Operation>> {
        let mut scopes = Operation::default_scopes(name)?;

        for (flag, scope) in [
            (self.document, ScopeKind::Document),
            (self.query, ScopeKind::Query),
        ] {
            match flag {
                Some(true) if !scopes.contains(&scope) => scopes.push(scope),
                Some(false) => scopes.retain(|s| *s != scope),
                _ => {}
            }
        }

        if scopes.is_empty() {
            return Err(AppError::unknown_operation(format!(
                "hook options select no scope for '{name}'"
            )));
        }

        scopes.sort();
        scopes
            .into_iter()
            .map(|scope| Operation::new(name, scope))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::error::ErrorKind;

    fn noop_pre() -> HookBody {
        HookBody::pre(|_| Ok(()))
    }

    #[test]
    fn test_kind_from_shape() {
        assert_eq!(noop_pre().kind(), HookKind::Plain);
        assert_eq!(
            HookBody::post_deferred(|_, _, next| async move { next.ok() }).kind(),
            HookKind::AsyncContinuation
        );
        assert_eq!(
            HookBody::error_handler(|_, _, _, next| async move { next.ok() }).kind(),
            HookKind::ErrorHandling
        );
    }

    #[test]
    fn test_parallel_post_is_invalid_mode() {
        let body = HookBody::post(|_, _| {});
        let err = body.check(Phase::Post, HookMode::Parallel).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidMode);
    }

    #[test]
    fn test_shape_phase_mismatch_is_invalid_arity() {
        let err = noop_pre().check(Phase::Post, HookMode::Serial).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArity);

        let handler = HookBody::error_handler(|_, _, _, next| async move { next.ok() });
        let err = handler.check(Phase::Pre, HookMode::Serial).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArity);

        let deferred = HookBody::pre_deferred(|_, next| async move { next.ok() });
        let err = deferred.check(Phase::Pre, HookMode::Parallel).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArity);
    }

    #[test]
    fn test_plain_pre_allowed_in_both_modes() {
        assert!(noop_pre().check(Phase::Pre, HookMode::Serial).is_ok());
        assert!(noop_pre().check(Phase::Pre, HookMode::Parallel).is_ok());
    }

    #[test]
    fn test_options_resolve() {
        let default_remove = HookOptions::default().resolve("remove").unwrap();
        assert_eq!(default_remove, vec![Operation::document("remove").unwrap()]);

        let both = HookOptions {
            document: None,
            query: Some(true),
        }
        .resolve("remove")
        .unwrap();
        assert_eq!(both.len(), 2);

        let err = HookOptions::document_only().resolve("find").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownOperation);

        let err = HookOptions {
            document: Some(false),
            query: None,
        }
        .resolve("save")
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownOperation);
    }
}
