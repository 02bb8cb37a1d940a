//! Credential pair storage and claim decoding.

pub mod claims;
pub mod store;

pub use claims::{TokenClaims, decode_claims};
pub use store::{TokenKeys, TokenStore, now_seconds};
