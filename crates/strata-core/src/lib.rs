//! # strata-core
//!
//! Core crate for Strata. Contains the unified error system, configuration
//! schemas, typed identifiers, and the catalogue of hookable operations.
//!
//! This crate has **no** internal dependencies on other Strata crates.

pub mod config;
pub mod error;
pub mod result;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
