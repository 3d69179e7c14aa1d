//! Ledger mirror: JSON persistence of records over a key-value store.
//!
//! Layout:
//! - `sequence_keys`: JSON array of every mirrored record id, in first-write order
//! - `sequence_<id>`: one `StoredRecord` as JSON
//!
//! Ciphertexts are stored in their transport form, base64-encoded.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};

use crate::application::{LifecycleError, RecordLifecycle};
use crate::domain::{CiphertextHandle, RecordId};
use crate::ports::{DecryptionOracle, EncryptionCapability, KeyValueStore};
use crate::GenovaultError;

const INDEX_KEY: &str = "sequence_keys";

/// Persisted form of one record (both halves).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: RecordId,
    pub encrypted_read: String,
    pub encrypted_metadata: String,
    pub encrypted_sample_id: String,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
    pub read: String,
    pub metadata: String,
    pub sample_id: String,
    pub revealed: bool,
}

/// Mirror of the record store into a `KeyValueStore`.
pub struct LedgerMirror<S>
where
    S: KeyValueStore,
{
    store: Arc<S>,
}

impl<S> LedgerMirror<S>
where
    S: KeyValueStore,
    S::Error: Into<crate::adapters::StorageError>,
{
    /// Create a mirror over the given store.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    fn record_key(id: RecordId) -> String {
        format!("sequence_{id}")
    }

    /// Write a record and add its id to the index if missing.
    ///
    /// # Errors
    /// Returns error if serialization or the store fails.
    pub fn save_record(&self, record: &StoredRecord) -> Result<(), GenovaultError> {
        let json = serde_json::to_vec(record)?;
        self.store
            .set_data(&Self::record_key(record.id), &json)
            .map_err(|e| GenovaultError::Storage(e.into()))?;

        let mut index = self.load_index()?;
        if !index.contains(&record.id) {
            index.push(record.id);
            let json = serde_json::to_vec(&index)?;
            self.store
                .set_data(INDEX_KEY, &json)
                .map_err(|e| GenovaultError::Storage(e.into()))?;
        }

        tracing::debug!("Mirrored record {} (revealed: {})", record.id, record.revealed);
        Ok(())
    }

    /// Capture the current state of a lifecycle record and save it.
    ///
    /// # Errors
    /// Returns `LifecycleError::RecordNotFound` for unknown ids, or error if
    /// a ciphertext cannot be serialized or the store fails.
    pub fn sync_record<E, O>(
        &self,
        lifecycle: &RecordLifecycle<E, O>,
        id: RecordId,
    ) -> Result<StoredRecord, GenovaultError>
    where
        E: EncryptionCapability,
        O: DecryptionOracle,
    {
        let encrypted = lifecycle
            .encrypted_record(id)
            .ok_or(LifecycleError::RecordNotFound(id))?;
        let capability = lifecycle.capability();
        let encode = |handle: &CiphertextHandle| -> Result<String, GenovaultError> {
            Ok(STANDARD.encode(capability.to_transport_form(handle)?))
        };

        let decrypted = lifecycle.get_decrypted_record(id);
        let record = StoredRecord {
            id,
            encrypted_read: encode(&encrypted.encrypted_read)?,
            encrypted_metadata: encode(&encrypted.encrypted_metadata)?,
            encrypted_sample_id: encode(&encrypted.encrypted_sample_id)?,
            submitted_at: encrypted.submitted_at,
            read: decrypted.read,
            metadata: decrypted.metadata,
            sample_id: decrypted.sample_id,
            revealed: decrypted.revealed,
        };

        self.save_record(&record)?;
        Ok(record)
    }

    /// Load one record.
    ///
    /// # Returns
    /// `None` if nothing is stored under the id.
    ///
    /// # Errors
    /// Returns error if the store fails or the stored JSON is corrupt.
    pub fn load_record(&self, id: RecordId) -> Result<Option<StoredRecord>, GenovaultError> {
        let bytes = self
            .store
            .get_data(&Self::record_key(id))
            .map_err(|e| GenovaultError::Storage(e.into()))?;
        if bytes.is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    /// Load the index of mirrored record ids.
    ///
    /// # Errors
    /// Returns error if the store fails or the index is corrupt.
    pub fn load_index(&self) -> Result<Vec<RecordId>, GenovaultError> {
        let bytes = self
            .store
            .get_data(INDEX_KEY)
            .map_err(|e| GenovaultError::Storage(e.into()))?;
        if bytes.is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Highest mirrored record id (`RecordId::NONE` for an empty ledger).
    ///
    /// # Errors
    /// Returns error if the store fails or the index is corrupt.
    pub fn last_id(&self) -> Result<RecordId, GenovaultError> {
        Ok(self.load_index()?.into_iter().max().unwrap_or(RecordId::NONE))
    }

    /// Load every indexed record, in index order.
    ///
    /// Index entries without a stored record are skipped with a warning.
    ///
    /// # Errors
    /// Returns error if the store fails or stored JSON is corrupt.
    pub fn list_records(&self) -> Result<Vec<StoredRecord>, GenovaultError> {
        let mut records = Vec::new();
        for id in self.load_index()? {
            match self.load_record(id)? {
                Some(record) => records.push(record),
                None => tracing::warn!("Index references missing record {id}"),
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryStore;
    use crate::application::testing::{FakeCapability, FakeOracle};
    use crate::domain::abi;

    fn create_test_mirror() -> (LedgerMirror<MemoryStore>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (LedgerMirror::new(Arc::clone(&store)), store)
    }

    fn sample_record(id: u64) -> StoredRecord {
        StoredRecord {
            id: RecordId::new(id),
            encrypted_read: "AAEC".into(),
            encrypted_metadata: "AwQF".into(),
            encrypted_sample_id: "BgcI".into(),
            submitted_at: chrono::Utc::now(),
            read: String::new(),
            metadata: String::new(),
            sample_id: String::new(),
            revealed: false,
        }
    }

    #[test]
    fn test_empty_mirror() {
        let (mirror, _) = create_test_mirror();
        assert!(mirror.load_index().expect("Should load").is_empty());
        assert_eq!(mirror.last_id().expect("Should load"), RecordId::NONE);
        assert!(mirror.load_record(RecordId::new(1)).expect("Should load").is_none());
        assert!(mirror.list_records().expect("Should list").is_empty());
    }

    #[test]
    fn test_save_twice_keeps_single_index_entry() {
        let (mirror, store) = create_test_mirror();
        let mut record = sample_record(1);
        mirror.save_record(&record).expect("Should save");

        record.read = "ACGT".into();
        record.revealed = true;
        mirror.save_record(&record).expect("Should save");
        mirror.save_record(&sample_record(2)).expect("Should save");

        assert_eq!(
            mirror.load_index().expect("Should load"),
            vec![RecordId::new(1), RecordId::new(2)]
        );
        let loaded = mirror
            .load_record(RecordId::new(1))
            .expect("Should load")
            .expect("Should exist");
        assert_eq!(loaded, record);
        assert!(store.has_data("sequence_1").expect("Should check"));
    }

    #[test]
    fn test_list_skips_dangling_index_entries() {
        let (mirror, store) = create_test_mirror();
        mirror.save_record(&sample_record(1)).expect("Should save");
        store
            .set_data(INDEX_KEY, b"[1,7]")
            .expect("Should overwrite index");

        let records = mirror.list_records().expect("Should list");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, RecordId::new(1));
    }

    #[test]
    fn test_corrupt_record_is_an_error() {
        let (mirror, store) = create_test_mirror();
        store.set_data("sequence_3", b"{not json").expect("Should write");
        assert!(mirror.load_record(RecordId::new(3)).is_err());
    }

    #[test]
    fn test_sync_record_follows_lifecycle() {
        let (mirror, _) = create_test_mirror();
        let capability = Arc::new(FakeCapability::new());
        let oracle = Arc::new(FakeOracle::new());
        let mut lifecycle = RecordLifecycle::new(Arc::clone(&capability), oracle);

        let id = lifecycle.submit(
            capability.encrypt_text("ACGT"),
            capability.encrypt_text("len:4"),
            capability.encrypt_text("S1"),
        );
        let stored = mirror.sync_record(&lifecycle, id).expect("Should sync");
        assert!(!stored.revealed);
        assert!(stored.read.is_empty());

        let transport = STANDARD
            .decode(&stored.encrypted_sample_id)
            .expect("Should be base64");
        assert!(!transport.is_empty());

        let request = lifecycle.request_decryption(id).expect("Should request");
        let cleartexts = abi::encode_strings(&["ACGT", "len:4", "S1"]);
        lifecycle
            .resolve(request, &cleartexts, &FakeOracle::prove(request, &cleartexts))
            .expect("Should resolve");

        let stored = mirror.sync_record(&lifecycle, id).expect("Should sync");
        assert!(stored.revealed);
        assert_eq!(stored.sample_id, "S1");
        assert_eq!(mirror.load_index().expect("Should load"), vec![id]);

        let err = mirror
            .sync_record(&lifecycle, RecordId::new(99))
            .expect_err("Must fail");
        assert!(matches!(
            err,
            GenovaultError::Lifecycle(LifecycleError::RecordNotFound(_))
        ));
    }
}
