//! # authgate-auth
//!
//! Client-side credential handling for authgate.
//!
//! ## Modules
//!
//! - `tokens`: the credential pair store and unverified JWT claim decoding
//! - `storage`: key-value backends the token store persists into

pub mod storage;
pub mod tokens;

pub use storage::{FileStore, MemoryStore};
pub use tokens::{TokenClaims, TokenKeys, TokenStore};
