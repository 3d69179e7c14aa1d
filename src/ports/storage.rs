//! Storage port: Trait for the key-value ledger backend.
//!
//! This trait abstracts the persistence backend (SQLite, in-memory) from the
//! ledger mirror. Values are opaque bytes; an empty value means "absent".

/// Trait for key-value persistence.
pub trait KeyValueStore: Send + Sync {
    /// Error type for storage operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn set_data(&self, key: &str, value: &[u8]) -> Result<(), Self::Error>;

    /// Load the value under `key`.
    ///
    /// # Returns
    /// Empty bytes if nothing is stored.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn get_data(&self, key: &str) -> Result<Vec<u8>, Self::Error>;

    /// Check if a non-empty value is stored under `key`.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn has_data(&self, key: &str) -> Result<bool, Self::Error> {
        Ok(!self.get_data(key)?.is_empty())
    }
}
