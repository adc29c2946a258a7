//! Unified application error types for Strata.
//!
//! Hooks, wrapped operations, and the registration API all report failures
//! as [`AppError`], so a single error slot can carry any of them through a
//! hook chain.

use std::fmt;
use thiserror::Error;

/// Top-level error kind categorization used across the entire workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// A hook explicitly reported an error through its completion signal.
    HookSignaled,
    /// A hook body panicked before signaling.
    HookThrown,
    /// A hook dropped its completion handle without ever signaling.
    HookAbandoned,
    /// A hook did not signal within the configured timeout.
    Timeout,
    /// The wrapped operation itself failed.
    WrappedOperation,
    /// A hook was registered with a mode its phase does not allow.
    InvalidMode,
    /// A hook body's shape is inconsistent with its phase or mode.
    InvalidArity,
    /// The operation name is not hookable for the requested scope.
    UnknownOperation,
    /// Document validation failed.
    Validation,
    /// The requested document or resource was not found.
    NotFound,
    /// A configuration error occurred.
    Configuration,
    /// A serialization/deserialization error occurred.
    Serialization,
    /// An internal error occurred.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HookSignaled => write!(f, "HOOK_SIGNALED"),
            Self::HookThrown => write!(f, "HOOK_THROWN"),
            Self::HookAbandoned => write!(f, "HOOK_ABANDONED"),
            Self::Timeout => write!(f, "TIMEOUT"),
            Self::WrappedOperation => write!(f, "WRAPPED_OPERATION"),
            Self::InvalidMode => write!(f, "INVALID_MODE"),
            Self::InvalidArity => write!(f, "INVALID_ARITY"),
            Self::UnknownOperation => write!(f, "UNKNOWN_OPERATION"),
            Self::Validation => write!(f, "VALIDATION"),
            Self::NotFound => write!(f, "NOT_FOUND"),
            Self::Configuration => write!(f, "CONFIGURATION"),
            Self::Serialization => write!(f, "SERIALIZATION"),
            Self::Internal => write!(f, "INTERNAL"),
        }
    }
}

/// The unified application error used throughout Strata.
///
/// Crate-specific errors are mapped into `AppError` using `From` impls
/// or explicit `.map_err()` calls.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct AppError {
    /// The category of error.
    pub kind: ErrorKind,
    /// A human-readable error message.
    pub message: String,
    /// Optional underlying cause.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new application error.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Create a new application error with an underlying cause.
    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an error a hook reports through its completion signal.
    pub fn hook_signaled(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::HookSignaled, message)
    }

    /// Create an error for a hook body that panicked.
    pub fn hook_thrown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::HookThrown, message)
    }

    /// Create an error for a hook that dropped its completion handle.
    pub fn hook_abandoned(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::HookAbandoned, message)
    }

    /// Create a timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    /// Create an error for a failed wrapped operation.
    pub fn wrapped_operation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::WrappedOperation, message)
    }

    /// Create an invalid-mode registration error.
    pub fn invalid_mode(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidMode, message)
    }

    /// Create an invalid-arity registration error.
    pub fn invalid_arity(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArity, message)
    }

    /// Create an unknown-operation registration error.
    pub fn unknown_operation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnknownOperation, message)
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Create a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Returns whether this error was raised at registration time.
    pub fn is_registration_error(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::InvalidMode | ErrorKind::InvalidArity | ErrorKind::UnknownOperation
        )
    }
}

impl Clone for AppError {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            message: self.message.clone(),
            source: None,
        }
    }
}

impl PartialEq for AppError {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.message == other.message
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(
            ErrorKind::Serialization,
            format!("JSON serialization error: {err}"),
            err,
        )
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::with_source(
            ErrorKind::Configuration,
            format!("Configuration error: {err}"),
            err,
        )
    }
}
