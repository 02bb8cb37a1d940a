//! # authgate-core
//!
//! Core crate for authgate. Contains the unified error system, the
//! configuration schema, and the storage traits shared by the other crates.
//!
//! This crate has **no** internal dependencies on other authgate crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;

pub use error::{AppError, ErrorKind};
pub use result::AppResult;
