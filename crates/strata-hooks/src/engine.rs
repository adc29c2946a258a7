//! Hook engine — runs pre hooks, the wrapped operation, and post hooks.
//!
//! For each invocation:
//! - Serial pre hooks run in registration order, then parallel pre hooks
//!   start one after another and are joined before the wrapped call.
//! - The first error from any pre hook skips every remaining pre hook and
//!   the wrapped call.
//! - Post hooks run in registration order. Without an error, plain and
//!   continuation hooks run; once an error exists, only error handlers run.
//!   An error handler can replace the error but never clear it.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use strata_core::config::engine::EngineConfig;
use strata_core::types::Operation;
use strata_core::{AppError, AppResult};

use crate::api::context::ExecutionContext;
use crate::api::scope::Scope;
use crate::hooks::definitions::{HookBody, HookFuture, HookMode, Phase};
use crate::hooks::registry::HookRegistration;
use crate::hooks::signal::Next;
use crate::schema::Schema;
use crate::traits::WrappedCall;

/// How a continuation-style hook finished.
enum Completion {
    /// `next.ok()`.
    Advanced,
    /// `next.err(..)`, or the body panicked.
    Failed(AppError),
    /// The handle was dropped unsignaled or the timeout elapsed.
    Stalled(AppError),
}

/// A parallel hook's `done` completion, tagged with its position.
type DoneFuture<'a> = BoxFuture<'a, (usize, Completion)>;

/// What finished first while a parallel hook was starting.
enum Startup {
    /// The starting hook's `next`.
    Advance(Completion),
    /// The starting hook's `done`, ahead of its `next`.
    Done(Completion),
    /// The `done` of a hook started earlier.
    Earlier(usize, Completion),
}

/// Records a `done` outcome, failing fast on an error.
fn settle(settled: &mut [Option<Completion>], index: usize, completion: Completion) -> AppResult<()> {
    match completion {
        Completion::Failed(e) | Completion::Stalled(e) => Err(e),
        Completion::Advanced => {
            settled[index] = Some(Completion::Advanced);
            Ok(())
        }
    }
}

/// Runs hook chains for one schema.
///
/// The engine only reads its schema, so one engine can serve any number of
/// concurrent invocations.
#[derive(Debug, Clone)]
pub struct HookEngine {
    /// Frozen hook definitions.
    schema: Arc<Schema>,
    /// Maximum wait for a continuation signal.
    hook_timeout: Option<Duration>,
}

impl HookEngine {
    /// Creates an engine that waits on hooks indefinitely.
    pub fn new(schema: Schema) -> Self {
        Self {
            schema: Arc::new(schema),
            hook_timeout: None,
        }
    }

    /// Creates an engine using the configured hook timeout.
    pub fn with_config(schema: Schema, config: &EngineConfig) -> Self {
        Self {
            schema: Arc::new(schema),
            hook_timeout: config.hook_timeout(),
        }
    }

    /// Sets the maximum time a continuation may take to signal.
    pub fn with_hook_timeout(mut self, timeout: Duration) -> Self {
        self.hook_timeout = Some(timeout);
        self
    }

    /// Returns the schema.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Invokes the operation `name` on `scope`, resolving the operation from
    /// the scope's kind.
    pub async fn run(&self, name: &str, scope: Scope, call: &dyn WrappedCall) -> AppResult<Value> {
        let operation = Operation::new(name, scope.kind())?;
        self.invoke(operation, scope, call).await
    }

    /// Invokes `operation` on `scope`, wrapping `call` in its hook chain.
    pub async fn invoke(
        &self,
        operation: Operation,
        scope: Scope,
        call: &dyn WrappedCall,
    ) -> AppResult<Value> {
        let ctx = ExecutionContext::new(operation, scope);
        self.invoke_with_context(operation, ctx, call).await
    }

    /// Invokes `operation` on a caller-built context.
    ///
    /// The caller keeps a clone of `ctx` to inspect the scope object and
    /// hook locals afterwards.
    pub async fn invoke_with_context(
        &self,
        operation: Operation,
        ctx: ExecutionContext,
        call: &dyn WrappedCall,
    ) -> AppResult<Value> {
        if ctx.scope_kind() != operation.scope() {
            return Err(AppError::internal(format!(
                "{operation} cannot run on a {} scope",
                ctx.scope_kind()
            )));
        }
        if ctx.operation() != operation {
            return Err(AppError::internal(format!(
                "{operation} cannot run on a context built for {}",
                ctx.operation()
            )));
        }

        let result = self.run_chain(operation, ctx.clone(), call).await;

        match &result {
            Ok(_) => debug!(
                schema = %self.schema.name(),
                operation = %operation,
                invocation_id = %ctx.invocation_id(),
                "Operation succeeded"
            ),
            Err(e) => info!(
                schema = %self.schema.name(),
                operation = %operation,
                invocation_id = %ctx.invocation_id(),
                error = %e,
                "Operation failed"
            ),
        }

        result
    }

    /// Runs derived chains, pre hooks, the wrapped call, and post hooks.
    fn run_chain<'a>(
        &'a self,
        operation: Operation,
        ctx: ExecutionContext,
        call: &'a dyn WrappedCall,
    ) -> BoxFuture<'a, AppResult<Value>> {
        async move {
            let mut error = None;

            if let Some(derived) = self.schema.derived_from(operation) {
                debug!(outer = %operation, inner = %derived.inner, "Running derived operation");
                if let Err(e) = self
                    .run_chain(derived.inner, ctx.clone(), derived.call.as_ref())
                    .await
                {
                    error = Some(e);
                }
            }

            if error.is_none() {
                error = self.run_pre(operation, &ctx).await.err();
            }

            let mut result = None;
            if error.is_none() {
                match self.run_wrapped(operation, &ctx, call).await {
                    Ok(value) => result = Some(value),
                    Err(e) => error = Some(e),
                }
            }

            match self.run_post(operation, &ctx, result.clone(), error).await {
                Some(e) => Err(e),
                None => Ok(result.unwrap_or(Value::Null)),
            }
        }
        .boxed()
    }

    async fn run_pre(&self, operation: Operation, ctx: &ExecutionContext) -> AppResult<()> {
        let hooks = self.schema.registry().hooks(operation, Phase::Pre);

        for hook in hooks.iter().filter(|h| h.mode == HookMode::Serial) {
            self.run_serial(hook, ctx).await?;
        }

        let parallel: Vec<&HookRegistration> = hooks
            .iter()
            .filter(|h| h.mode == HookMode::Parallel)
            .collect();
        if !parallel.is_empty() {
            self.run_parallel(&parallel, ctx).await?;
        }

        Ok(())
    }

    async fn run_serial(&self, hook: &HookRegistration, ctx: &ExecutionContext) -> AppResult<()> {
        debug!(operation = %hook.operation, hook_id = %hook.id, phase = "pre", "Running hook");

        match &hook.body {
            HookBody::PrePlain(f) => run_plain(hook, || f(ctx)),
            HookBody::PreDeferred(f) => {
                let (next, rx) = Next::channel();
                let f = f.clone();
                let hook_ctx = ctx.clone();
                spawn_guarded(hook, vec![next.clone()], move || f(hook_ctx, next));
                match self.await_completion(hook, rx).await {
                    Completion::Advanced => Ok(()),
                    Completion::Failed(e) | Completion::Stalled(e) => Err(e),
                }
            }
            _ => Ok(()),
        }
    }

    /// Starts each parallel hook once the previous one advanced, then joins
    /// every `done` signal in registration order.
    ///
    /// While a hook is starting, its own `done` and the `done` of every
    /// earlier hook are watched too. The first failure seen stops the phase
    /// before another hook starts.
    async fn run_parallel(
        &self,
        hooks: &[&HookRegistration],
        ctx: &ExecutionContext,
    ) -> AppResult<()> {
        let mut settled: Vec<Option<Completion>> = hooks.iter().map(|_| None).collect();
        let mut pending: FuturesUnordered<DoneFuture<'_>> = FuturesUnordered::new();

        for (index, hook) in hooks.iter().copied().enumerate() {
            while let Some(Some((earlier, completion))) = pending.next().now_or_never() {
                settle(&mut settled, earlier, completion)?;
            }

            debug!(operation = %hook.operation, hook_id = %hook.id, phase = "pre", "Starting parallel hook");

            let f = match &hook.body {
                HookBody::PreParallel(f) => f.clone(),
                HookBody::PrePlain(f) => {
                    run_plain(hook, || f(ctx))?;
                    settled[index] = Some(Completion::Advanced);
                    continue;
                }
                _ => {
                    settled[index] = Some(Completion::Advanced);
                    continue;
                }
            };

            let (next, advance_rx) = Next::channel();
            let (done, done_rx) = Next::channel();
            let hook_ctx = ctx.clone();
            spawn_guarded(hook, vec![next.clone(), done.clone()], move || {
                f(hook_ctx, next, done)
            });

            let mut advance = self.await_completion(hook, advance_rx).boxed();
            let mut own_done: DoneFuture<'_> =
                async move { (index, self.await_completion(hook, done_rx).await) }.boxed();

            // A handle dropped unsignaled only counts once the other handle
            // has also settled; its explicit signal takes precedence.
            let mut advance_stall: Option<AppError> = None;
            let mut done_stall: Option<AppError> = None;
            loop {
                let step = tokio::select! {
                    biased;
                    Some((earlier, completion)) = pending.next(), if !pending.is_empty() => {
                        Startup::Earlier(earlier, completion)
                    }
                    (_, completion) = &mut own_done, if done_stall.is_none() => {
                        Startup::Done(completion)
                    }
                    completion = &mut advance, if advance_stall.is_none() => {
                        Startup::Advance(completion)
                    }
                };

                match step {
                    Startup::Earlier(earlier, completion) => {
                        settle(&mut settled, earlier, completion)?;
                    }
                    Startup::Done(Completion::Advanced) => {
                        settled[index] = Some(Completion::Advanced);
                        break;
                    }
                    Startup::Done(Completion::Failed(e))
                    | Startup::Advance(Completion::Failed(e)) => return Err(e),
                    Startup::Done(Completion::Stalled(e)) => match advance_stall.take() {
                        Some(first) => return Err(first),
                        None => done_stall = Some(e),
                    },
                    Startup::Advance(Completion::Stalled(e)) => match done_stall.take() {
                        Some(first) => return Err(first),
                        None => advance_stall = Some(e),
                    },
                    Startup::Advance(Completion::Advanced) => match done_stall.take() {
                        Some(e) => return Err(e),
                        None => {
                            pending.push(own_done);
                            break;
                        }
                    },
                }
            }
        }

        for index in 0..hooks.len() {
            loop {
                match settled[index].take() {
                    Some(Completion::Advanced) => break,
                    Some(Completion::Failed(e) | Completion::Stalled(e)) => return Err(e),
                    None => {}
                }
                match pending.next().await {
                    Some((finished, completion)) => settled[finished] = Some(completion),
                    None => break,
                }
            }
        }

        Ok(())
    }

    async fn run_wrapped(
        &self,
        operation: Operation,
        ctx: &ExecutionContext,
        call: &dyn WrappedCall,
    ) -> AppResult<Value> {
        debug!(operation = %operation, "Running wrapped operation");

        match AssertUnwindSafe(call.call(ctx.clone())).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                warn!(operation = %operation, panic = %message, "Wrapped operation panicked");
                Err(AppError::wrapped_operation(format!(
                    "{operation} panicked: {message}"
                )))
            }
        }
    }

    /// Runs post hooks and returns the chain's final error, if any.
    async fn run_post(
        &self,
        operation: Operation,
        ctx: &ExecutionContext,
        result: Option<Value>,
        mut error: Option<AppError>,
    ) -> Option<AppError> {
        for hook in self.schema.registry().hooks(operation, Phase::Post) {
            let Some(current) = error.clone() else {
                if let Err(e) = self.run_post_hook(hook, ctx, &result).await {
                    error = Some(e);
                }
                continue;
            };

            let HookBody::ErrorHandler(f) = &hook.body else {
                continue;
            };

            debug!(operation = %operation, hook_id = %hook.id, phase = "post", "Running error handler");
            let (next, rx) = Next::channel();
            let f = f.clone();
            let hook_ctx = ctx.clone();
            let value = result.clone();
            spawn_guarded(hook, vec![next.clone()], move || f(hook_ctx, current, value, next));

            match self.await_completion(hook, rx).await {
                Completion::Advanced => {
                    debug!(hook_id = %hook.id, "Error handler passed the error through");
                }
                Completion::Failed(replacement) => {
                    debug!(hook_id = %hook.id, error = %replacement, "Error handler replaced the error");
                    error = Some(replacement);
                }
                Completion::Stalled(e) => {
                    warn!(hook_id = %hook.id, reason = %e, "Error handler stalled; keeping the current error");
                }
            }
        }

        error
    }

    /// Runs one plain or continuation post hook on the success path.
    async fn run_post_hook(
        &self,
        hook: &HookRegistration,
        ctx: &ExecutionContext,
        result: &Option<Value>,
    ) -> AppResult<()> {
        let value = result.clone().unwrap_or(Value::Null);

        match &hook.body {
            HookBody::PostPlain(f) => {
                debug!(operation = %hook.operation, hook_id = %hook.id, phase = "post", "Running hook");
                run_plain(hook, || {
                    f(ctx, &value);
                    Ok(())
                })
            }
            HookBody::PostDeferred(f) => {
                debug!(operation = %hook.operation, hook_id = %hook.id, phase = "post", "Running hook");
                let (next, rx) = Next::channel();
                let f = f.clone();
                let hook_ctx = ctx.clone();
                spawn_guarded(hook, vec![next.clone()], move || f(hook_ctx, value, next));
                match self.await_completion(hook, rx).await {
                    Completion::Advanced => Ok(()),
                    Completion::Failed(e) | Completion::Stalled(e) => Err(e),
                }
            }
            _ => Ok(()),
        }
    }

    async fn await_completion(
        &self,
        hook: &HookRegistration,
        rx: oneshot::Receiver<Option<AppError>>,
    ) -> Completion {
        let received = match self.hook_timeout {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(received) => received,
                Err(_) => {
                    warn!(
                        operation = %hook.operation,
                        hook_id = %hook.id,
                        timeout_ms = limit.as_millis() as u64,
                        "Hook timed out"
                    );
                    return Completion::Stalled(AppError::timeout(format!(
                        "{} did not complete within {}ms",
                        hook.label(),
                        limit.as_millis()
                    )));
                }
            },
            None => rx.await,
        };

        match received {
            Ok(None) => Completion::Advanced,
            Ok(Some(e)) => Completion::Failed(e),
            Err(_) => {
                warn!(operation = %hook.operation, hook_id = %hook.id, "Hook dropped its continuation without signaling");
                Completion::Stalled(AppError::hook_abandoned(format!(
                    "{} finished without signaling",
                    hook.label()
                )))
            }
        }
    }
}

/// Runs a synchronous body, folding a panic into a `HookThrown` error.
fn run_plain(hook: &HookRegistration, body: impl FnOnce() -> AppResult<()>) -> AppResult<()> {
    match catch_unwind(AssertUnwindSafe(body)) {
        Ok(result) => result,
        Err(panic) => Err(thrown(hook, panic.as_ref())),
    }
}

/// Spawns a continuation-style body.
///
/// `guards` are clones of the body's completion handles. They keep the
/// channels open until the body's future finishes, and carry a
/// `HookThrown` error if it panics before signaling.
fn spawn_guarded<M>(hook: &HookRegistration, guards: Vec<Next>, make: M)
where
    M: FnOnce() -> HookFuture + Send + 'static,
{
    let label = hook.label();
    tokio::spawn(async move {
        let outcome = match catch_unwind(AssertUnwindSafe(make)) {
            Ok(future) => AssertUnwindSafe(future).catch_unwind().await,
            Err(panic) => Err(panic),
        };

        if let Err(panic) = outcome {
            let message = panic_message(panic.as_ref());
            warn!(hook = %label, panic = %message, "Hook panicked");
            let error = AppError::hook_thrown(format!("{label} panicked: {message}"));
            for guard in &guards {
                guard.err(error.clone());
            }
        }
    });
}

fn thrown(hook: &HookRegistration, panic: &(dyn Any + Send)) -> AppError {
    let label = hook.label();
    let message = panic_message(panic);
    warn!(hook = %label, panic = %message, "Hook panicked");
    AppError::hook_thrown(format!("{label} panicked: {message}"))
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use serde_json::json;
    use strata_core::error::ErrorKind;

    use crate::api::scope::Document;
    use crate::traits::{NoopCall, wrapped_fn};

    type Log = Arc<Mutex<Vec<String>>>;

    fn log() -> Log {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn push(log: &Log, entry: &str) {
        log.lock().unwrap().push(entry.to_string());
    }

    fn entries(log: &Log) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    fn doc() -> Scope {
        Scope::Document(Document::new("users"))
    }

    fn recording(log: &Log, entry: &'static str) -> HookBody {
        let log = log.clone();
        HookBody::pre(move |_| {
            push(&log, entry);
            Ok(())
        })
    }

    #[tokio::test]
    async fn test_no_hooks_returns_wrapped_result() {
        let engine = HookEngine::new(Schema::bare("users"));
        let call = wrapped_fn(|_| async { Ok(json!({"ok": true})) });
        let result = engine.run("save", doc(), &call).await.unwrap();
        assert_eq!(result, json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_serial_pre_hooks_run_in_registration_order() {
        let log = log();
        let mut schema = Schema::bare("users");
        for entry in ["a", "b", "c"] {
            schema.pre("save", recording(&log, entry)).unwrap();
        }
        let engine = HookEngine::new(schema);
        engine.run("save", doc(), &NoopCall).await.unwrap();
        assert_eq!(entries(&log), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_deferred_pre_hook_awaited_before_next() {
        let log = log();
        let mut schema = Schema::bare("users");
        let slow_log = log.clone();
        schema
            .pre(
                "save",
                HookBody::pre_deferred(move |_, next| {
                    let log = slow_log.clone();
                    async move {
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        push(&log, "slow");
                        next.ok();
                    }
                }),
            )
            .unwrap();
        schema.pre("save", recording(&log, "fast")).unwrap();

        let engine = HookEngine::new(schema);
        engine.run("save", doc(), &NoopCall).await.unwrap();
        assert_eq!(entries(&log), vec!["slow", "fast"]);
    }

    #[tokio::test]
    async fn test_plain_pre_panic_becomes_hook_thrown() {
        let mut schema = Schema::bare("users");
        schema
            .pre("save", HookBody::pre(|_| panic!("boom")))
            .unwrap();
        let engine = HookEngine::new(schema);
        let err = engine.run("save", doc(), &NoopCall).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::HookThrown);
        assert!(err.message.contains("boom"));
    }

    #[tokio::test]
    async fn test_deferred_pre_panic_becomes_hook_thrown() {
        let mut schema = Schema::bare("users");
        schema
            .pre(
                "save",
                HookBody::pre_deferred(|_, _next| async move {
                    panic!("deferred boom");
                }),
            )
            .unwrap();
        let engine = HookEngine::new(schema);
        let err = engine.run("save", doc(), &NoopCall).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::HookThrown);
        assert!(err.message.contains("deferred boom"));
    }

    #[tokio::test]
    async fn test_abandoned_continuation_is_reported() {
        let mut schema = Schema::bare("users");
        schema
            .pre("save", HookBody::pre_deferred(|_, next| async move { drop(next) }))
            .unwrap();
        let engine = HookEngine::new(schema);
        let err = engine.run("save", doc(), &NoopCall).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::HookAbandoned);
    }

    #[tokio::test(start_paused = true)]
    async fn test_configured_timeout_fails_stuck_hook() {
        let mut schema = Schema::bare("users");
        schema
            .pre(
                "save",
                HookBody::pre_deferred(|_, next| async move {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    next.ok();
                }),
            )
            .unwrap();
        let engine = HookEngine::new(schema).with_hook_timeout(Duration::from_millis(50));
        let err = engine.run("save", doc(), &NoopCall).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Timeout);
    }

    #[tokio::test]
    async fn test_wrapped_error_reaches_error_handlers_only() {
        let log = log();
        let mut schema = Schema::bare("users");
        let plain_log = log.clone();
        schema
            .post(
                "save",
                HookBody::post(move |_, _| push(&plain_log, "plain")),
            )
            .unwrap();
        let handler_log = log.clone();
        schema
            .post(
                "save",
                HookBody::error_handler(move |_, error, result, next| {
                    let log = handler_log.clone();
                    async move {
                        assert!(result.is_none());
                        push(&log, &format!("handler:{}", error.message));
                        next.ok();
                    }
                }),
            )
            .unwrap();

        let engine = HookEngine::new(schema);
        let call = wrapped_fn(|_| async { Err(AppError::wrapped_operation("duplicate key")) });
        let err = engine.run("save", doc(), &call).await.unwrap_err();

        assert_eq!(err.message, "duplicate key");
        assert_eq!(entries(&log), vec!["handler:duplicate key"]);
    }

    #[tokio::test]
    async fn test_post_hook_error_switches_to_error_mode() {
        let log = log();
        let mut schema = Schema::bare("users");
        schema
            .post(
                "save",
                HookBody::post_deferred(|_, _, next| async move {
                    next.err(AppError::hook_signaled("audit failed"));
                }),
            )
            .unwrap();
        let later_log = log.clone();
        schema
            .post("save", HookBody::post(move |_, _| push(&later_log, "plain")))
            .unwrap();
        let handler_log = log.clone();
        schema
            .post(
                "save",
                HookBody::error_handler(move |_, _, result, next| {
                    let log = handler_log.clone();
                    async move {
                        push(&log, &format!("handler:{}", result.unwrap_or(Value::Null)));
                        next.ok();
                    }
                }),
            )
            .unwrap();

        let engine = HookEngine::new(schema);
        let call = wrapped_fn(|_| async { Ok(json!(7)) });
        let err = engine.run("save", doc(), &call).await.unwrap_err();

        assert_eq!(err.message, "audit failed");
        assert_eq!(entries(&log), vec!["handler:7"]);
    }

    #[tokio::test]
    async fn test_wrapped_panic_is_wrapped_operation_error() {
        let engine = HookEngine::new(Schema::bare("users"));
        let call = wrapped_fn(|_| async { panic!("driver exploded") });
        let err = engine.run("save", doc(), &call).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::WrappedOperation);
    }

    #[tokio::test]
    async fn test_scope_mismatch_rejected() {
        let engine = HookEngine::new(Schema::bare("users"));
        let find = Operation::query("find").unwrap();
        let err = engine.invoke(find, doc(), &NoopCall).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Internal);
    }

    #[tokio::test]
    async fn test_context_for_other_operation_rejected() {
        let ran = Arc::new(Mutex::new(false));
        let mut schema = Schema::bare("users");
        let flag = ran.clone();
        schema
            .pre(
                "remove",
                HookBody::pre(move |_| {
                    *flag.lock().unwrap() = true;
                    Ok(())
                }),
            )
            .unwrap();
        let engine = HookEngine::new(schema);

        let save = Operation::document("save").unwrap();
        let remove = Operation::document("remove").unwrap();
        let ctx = ExecutionContext::new(save, doc());
        let err = engine
            .invoke_with_context(remove, ctx, &NoopCall)
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::Internal);
        assert!(!*ran.lock().unwrap());
    }
}
