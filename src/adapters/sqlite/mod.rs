//! SQLite adapter: Implementation of KeyValueStore.
//!
//! Provides local persistence for the ledger mirror. Values are opaque
//! blobs; the mirror decides what goes in them.
//!
//! # Mutex Behavior
//!
//! Database connection is protected by `Mutex`. A poisoned mutex (from panic
//! in another thread) will cause panic. This fail-fast behavior keeps a
//! half-written ledger from being read back.
use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};

use crate::ports::KeyValueStore;

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// SQLite storage adapter.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Create a new SQLite store with the given database path.
    ///
    /// # Errors
    /// Returns error if database cannot be opened or initialized.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory SQLite database (for testing).
    ///
    /// # Errors
    /// Returns error if database cannot be created.
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Initialize the database schema.
    fn init_schema(&self) -> Result<(), StorageError> {
        let conn = self.conn.lock().expect("Lock failed");

        conn.execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS ledger (
                key TEXT PRIMARY KEY,
                value BLOB NOT NULL,
                updated_at TEXT NOT NULL
            );
            ",
        )?;

        Ok(())
    }

    /// Number of stored keys.
    ///
    /// # Errors
    /// Returns error if the query fails.
    pub fn count_entries(&self) -> Result<usize, StorageError> {
        let conn = self.conn.lock().expect("Lock failed");
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM ledger", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Remove every stored key.
    ///
    /// # Errors
    /// Returns error if the delete fails.
    pub fn clear_all(&self) -> Result<(), StorageError> {
        let conn = self.conn.lock().expect("Lock failed");
        conn.execute("DELETE FROM ledger", [])?;
        tracing::warn!("Cleared all data from storage");
        Ok(())
    }
}

impl KeyValueStore for SqliteStore {
    type Error = StorageError;

    fn set_data(&self, key: &str, value: &[u8]) -> Result<(), Self::Error> {
        let conn = self.conn.lock().expect("Lock failed");
        let now = chrono::Utc::now().to_rfc3339();

        conn.execute(
            "INSERT OR REPLACE INTO ledger (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![key, value, now],
        )?;

        tracing::debug!("Stored {} bytes under {key}", value.len());
        Ok(())
    }

    fn get_data(&self, key: &str) -> Result<Vec<u8>, Self::Error> {
        let conn = self.conn.lock().expect("Lock failed");

        let value: Option<Vec<u8>> = conn
            .query_row(
                "SELECT value FROM ledger WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;

        Ok(value.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_overwrite() {
        let store = SqliteStore::in_memory().expect("Should create db");

        // Absent keys read as empty
        assert!(store.get_data("sequence_1").expect("Should load").is_empty());
        assert!(!store.has_data("sequence_1").expect("Should check"));

        store.set_data("sequence_1", b"first").expect("Should save");
        store.set_data("sequence_1", b"second").expect("Should save");

        assert_eq!(store.get_data("sequence_1").expect("Should load"), b"second");
        assert_eq!(store.count_entries().expect("Should count"), 1);

        store.clear_all().expect("Should clear");
        assert_eq!(store.count_entries().expect("Should count"), 0);
    }

    #[test]
    fn test_persists_across_connections() {
        let dir = tempfile::tempdir().expect("Should create temp dir");
        let path = dir.path().join("ledger.db");

        {
            let store = SqliteStore::new(&path).expect("Should create db");
            store.set_data("sequence_keys", b"[1]").expect("Should save");
        }

        let reopened = SqliteStore::new(&path).expect("Should reopen db");
        assert_eq!(
            reopened.get_data("sequence_keys").expect("Should load"),
            b"[1]"
        );
    }
}
