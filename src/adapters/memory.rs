//! In-memory KeyValueStore for tests and `--db :memory:` runs.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::adapters::StorageError;
use crate::ports::KeyValueStore;

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    type Error = StorageError;

    fn set_data(&self, key: &str, value: &[u8]) -> Result<(), Self::Error> {
        self.entries
            .lock()
            .expect("Lock failed")
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn get_data(&self, key: &str) -> Result<Vec<u8>, Self::Error> {
        Ok(self
            .entries
            .lock()
            .expect("Lock failed")
            .get(key)
            .cloned()
            .unwrap_or_default())
    }
}
