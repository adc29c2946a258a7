//! Result alias shared by every Strata crate.

use crate::error::AppError;

/// `Result` specialized to [`AppError`].
///
/// Hook bodies, wrapped calls, and registration methods all return this.
pub type AppResult<T> = Result<T, AppError>;
