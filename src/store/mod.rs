//! Durable key-value store for stream definitions
//!
//! The registry mirrors every launched stream's configuration into a store so
//! it can be re-launched after a restart. The store only ever sees serialized
//! `StreamEntry` documents keyed by stream name, never runtime state.

pub mod file;
#[cfg(test)]
pub mod memory;

pub use file::FileStore;

use thiserror::Error;

/// Store-specific errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Invalid key: {0:?}")]
    InvalidKey(String),
}

/// Minimal key-value interface the registry persists through
pub trait StreamStore: Send + Sync {
    /// All keys currently stored
    fn keys(&self) -> Result<Vec<String>, StoreError>;

    /// Value for `key`, `None` when absent
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Insert or replace the value for `key`
    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    /// Remove `key`; removing an absent key is not an error
    fn delete(&self, key: &str) -> Result<(), StoreError>;
}
