//! Durable key-value storage trait backing the token store.

use crate::result::AppResult;

/// Synchronous string key-value store.
///
/// Implementations must tolerate removing keys that do not exist.
pub trait KeyValueStore: Send + Sync + std::fmt::Debug + 'static {
    /// Get a value by key. Returns `None` if the key does not exist.
    fn get(&self, key: &str) -> AppResult<Option<String>>;

    /// Set a value, replacing any previous one.
    fn set(&self, key: &str, value: &str) -> AppResult<()>;

    /// Remove a key. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> AppResult<()>;

    /// Remove several keys at once.
    ///
    /// Backends that persist on every write should override this to
    /// persist once.
    fn remove_many(&self, keys: &[&str]) -> AppResult<()> {
        for key in keys {
            self.remove(key)?;
        }
        Ok(())
    }
}
