//! # strata-hooks
//!
//! Hook engine for Strata. Provides:
//!
//! - Schema-owned pre/post hook registration keyed by operation and scope kind
//! - Serial, parallel, and error-handling middleware chains
//! - First-error-wins short-circuiting around a wrapped operation
//! - Derived operations (`save` runs the full `validate` chain first)
//! - An explicit execution context carrying the scope object and hook locals

pub mod api;
pub mod engine;
pub mod hooks;
pub mod schema;
pub mod traits;

pub use api::context::ExecutionContext;
pub use api::scope::{Aggregate, Document, ModelScope, Query, Scope};
pub use engine::HookEngine;
pub use hooks::definitions::{HookBody, HookKind, HookMode, HookOptions, Phase};
pub use hooks::registry::{HookRegistration, HookRegistry};
pub use hooks::signal::Next;
pub use schema::Schema;
pub use traits::{NoopCall, WrappedCall, wrapped_fn};
