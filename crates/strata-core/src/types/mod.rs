//! Core type definitions used across the Strata workspace.

pub mod id;
pub mod operation;

pub use id::*;
pub use operation::{Operation, ScopeKind};
