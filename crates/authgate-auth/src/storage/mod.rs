//! Key-value backends for the token store.

pub mod file;
pub mod memory;

use std::path::Path;
use std::sync::Arc;

use authgate_core::config::{StorageBackend, StorageConfig};
use authgate_core::result::AppResult;
use authgate_core::traits::KeyValueStore;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Builds the backend selected by configuration.
pub fn from_config(config: &StorageConfig) -> AppResult<Arc<dyn KeyValueStore>> {
    let backend: Arc<dyn KeyValueStore> = match config.backend {
        StorageBackend::Memory => Arc::new(MemoryStore::new()),
        StorageBackend::File => Arc::new(FileStore::open(Path::new(&config.path))?),
    };
    Ok(backend)
}
