//! In-memory store used by the registry tests

use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use super::{StoreError, StreamStore};

#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, Vec<u8>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent put/delete fail
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::other("store is read-only")));
        }
        Ok(())
    }
}

impl StreamStore for MemoryStore {
    fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.entries.iter().map(|e| e.key().clone()).collect())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.check_writable()?;
        self.entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.check_writable()?;
        self.entries.remove(key);
        Ok(())
    }
}
