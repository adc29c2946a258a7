//! Execution context — the explicit "this" handed to every hook body.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::Value;

use strata_core::types::{InvocationId, Operation, ScopeKind};

use super::scope::{Aggregate, Document, ModelScope, Query, Scope};

/// Per-invocation state shared by every hook in one chain.
///
/// Cloning is cheap and yields a handle to the same invocation, so values a
/// hook stores with [`set_local`](Self::set_local) are visible to every later
/// hook, including parallel hooks running on other tasks. Each call to the
/// engine creates a fresh context; contexts are never reused across
/// invocations.
#[derive(Clone)]
pub struct ExecutionContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    invocation_id: InvocationId,
    operation: Operation,
    started_at: DateTime<Utc>,
    scope_kind: ScopeKind,
    scope: RwLock<Scope>,
    locals: DashMap<String, Value>,
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("invocation_id", &self.inner.invocation_id)
            .field("operation", &self.inner.operation)
            .field("locals", &self.inner.locals.len())
            .finish()
    }
}

impl ExecutionContext {
    /// Creates a context for invoking `operation` on `scope`.
    pub fn new(operation: Operation, scope: Scope) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                invocation_id: InvocationId::new(),
                operation,
                started_at: Utc::now(),
                scope_kind: scope.kind(),
                scope: RwLock::new(scope),
                locals: DashMap::new(),
            }),
        }
    }

    /// Returns the invocation identifier.
    pub fn invocation_id(&self) -> InvocationId {
        self.inner.invocation_id
    }

    /// Returns the operation the invocation was started for.
    ///
    /// Derived chains (such as `validate` ahead of `save`) share the outer
    /// operation's context, so this is always the outermost operation.
    pub fn operation(&self) -> Operation {
        self.inner.operation
    }

    /// Returns the scope kind, fixed for the lifetime of the context.
    pub fn scope_kind(&self) -> ScopeKind {
        self.inner.scope_kind
    }

    /// Returns when the invocation started.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.inner.started_at
    }

    /// Returns the time elapsed since the invocation started.
    pub fn elapsed(&self) -> chrono::Duration {
        Utc::now() - self.inner.started_at
    }

    /// Returns a snapshot of the scope object.
    pub fn scope(&self) -> Scope {
        self.with_scope(Clone::clone)
    }

    /// Runs `f` against the scope object.
    pub fn with_scope<R>(&self, f: impl FnOnce(&Scope) -> R) -> R {
        let guard = self
            .inner
            .scope
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        f(&*guard)
    }

    /// Mutates the document, if this is a document-scoped context.
    pub fn with_document_mut<R>(&self, f: impl FnOnce(&mut Document) -> R) -> Option<R> {
        self.with_scope_mut(|scope| match scope {
            Scope::Document(doc) => Some(f(doc)),
            _ => None,
        })
    }

    /// Mutates the query, if this is a query-scoped context.
    pub fn with_query_mut<R>(&self, f: impl FnOnce(&mut Query) -> R) -> Option<R> {
        self.with_scope_mut(|scope| match scope {
            Scope::Query(query) => Some(f(query)),
            _ => None,
        })
    }

    /// Mutates the model scope, if this is a model-scoped context.
    pub fn with_model_mut<R>(&self, f: impl FnOnce(&mut ModelScope) -> R) -> Option<R> {
        self.with_scope_mut(|scope| match scope {
            Scope::Model(model) => Some(f(model)),
            _ => None,
        })
    }

    /// Mutates the pipeline, if this is an aggregate-scoped context.
    pub fn with_aggregate_mut<R>(&self, f: impl FnOnce(&mut Aggregate) -> R) -> Option<R> {
        self.with_scope_mut(|scope| match scope {
            Scope::Aggregate(agg) => Some(f(agg)),
            _ => None,
        })
    }

    // The variant never changes; callers only reach the inner value.
    fn with_scope_mut<R>(&self, f: impl FnOnce(&mut Scope) -> R) -> R {
        let mut guard = self
            .inner
            .scope
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        f(&mut *guard)
    }

    /// Attaches a value for later hooks in the same invocation.
    pub fn set_local(&self, key: impl Into<String>, value: Value) {
        self.inner.locals.insert(key.into(), value);
    }

    /// Reads a value attached by an earlier hook.
    pub fn local(&self, key: &str) -> Option<Value> {
        self.inner.locals.get(key).map(|entry| entry.value().clone())
    }

    /// Removes and returns an attached value.
    pub fn take_local(&self, key: &str) -> Option<Value> {
        self.inner.locals.remove(key).map(|(_, value)| value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc_context() -> ExecutionContext {
        let op = Operation::document("save").expect("save");
        ExecutionContext::new(op, Scope::Document(Document::new("users")))
    }

    #[test]
    fn test_locals_shared_between_clones() {
        let ctx = doc_context();
        let other = ctx.clone();
        ctx.set_local("start", json!(42));
        assert_eq!(other.local("start"), Some(json!(42)));
        assert_eq!(other.take_local("start"), Some(json!(42)));
        assert_eq!(ctx.local("start"), None);
    }

    #[test]
    fn test_typed_mutation_respects_scope_kind() {
        let ctx = doc_context();
        let touched = ctx.with_document_mut(|doc| doc.set("name", json!("ada")));
        assert!(touched.is_some());
        assert!(ctx.with_query_mut(|_| ()).is_none());

        let snapshot = ctx.scope();
        match snapshot {
            Scope::Document(doc) => assert_eq!(doc.get_str("name"), Some("ada")),
            other => panic!("unexpected scope: {other:?}"),
        }
        assert_eq!(ctx.scope_kind(), ScopeKind::Document);
    }

    #[test]
    fn test_fresh_contexts_do_not_share_state() {
        let a = doc_context();
        let b = doc_context();
        a.set_local("k", json!(1));
        assert_eq!(b.local("k"), None);
        assert_ne!(a.invocation_id(), b.invocation_id());
    }
}
