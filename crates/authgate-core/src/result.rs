//! Convenience result type alias for authgate.

use crate::error::AppError;

/// A specialized `Result` type for authgate operations.
pub type AppResult<T> = Result<T, AppError>;
