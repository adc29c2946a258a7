//! Hook API — the execution context and scope objects handed to hook bodies.

pub mod context;
pub mod scope;

pub use context::ExecutionContext;
pub use scope::Scope;
