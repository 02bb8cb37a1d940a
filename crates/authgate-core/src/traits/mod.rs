//! Core traits implemented by the other authgate crates.

pub mod key_value;

pub use key_value::KeyValueStore;
