//! Record store: `RecordId` → encrypted/decrypted record pairs.
//!
//! Creation is append-only with sequential ids. The only mutation after
//! creation is the one-time reveal of the decrypted half.

use std::collections::BTreeMap;

use crate::domain::{CiphertextHandle, DecryptedRecord, EncryptedRecord, RecordId, RecordState};

#[derive(Debug)]
struct RecordEntry {
    encrypted: EncryptedRecord,
    decrypted: DecryptedRecord,
    state: RecordState,
}

/// In-memory record store owned by the lifecycle controller.
#[derive(Debug, Default)]
pub struct RecordStore {
    entries: BTreeMap<RecordId, RecordEntry>,
    last_id: RecordId,
}

impl RecordStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty store whose first record gets the id after `last_id`.
    #[must_use]
    pub fn continuing_after(last_id: RecordId) -> Self {
        Self {
            entries: BTreeMap::new(),
            last_id,
        }
    }

    /// Store a new record under the next sequential id.
    pub fn insert(
        &mut self,
        encrypted_read: CiphertextHandle,
        encrypted_metadata: CiphertextHandle,
        encrypted_sample_id: CiphertextHandle,
        submitted_at: chrono::DateTime<chrono::Utc>,
    ) -> RecordId {
        let id = self.last_id.next();
        self.last_id = id;

        self.entries.insert(
            id,
            RecordEntry {
                encrypted: EncryptedRecord {
                    id,
                    encrypted_read,
                    encrypted_metadata,
                    encrypted_sample_id,
                    submitted_at,
                },
                decrypted: DecryptedRecord::default(),
                state: RecordState::Submitted,
            },
        );
        id
    }

    #[must_use]
    pub fn encrypted(&self, id: RecordId) -> Option<&EncryptedRecord> {
        self.entries.get(&id).map(|e| &e.encrypted)
    }

    #[must_use]
    pub fn decrypted(&self, id: RecordId) -> Option<&DecryptedRecord> {
        self.entries.get(&id).map(|e| &e.decrypted)
    }

    #[must_use]
    pub fn state(&self, id: RecordId) -> Option<RecordState> {
        self.entries.get(&id).map(|e| e.state)
    }

    /// Move a submitted record to `DecryptionRequested`.
    ///
    /// Records already requested or revealed keep their state.
    pub fn mark_requested(&mut self, id: RecordId) {
        if let Some(entry) = self.entries.get_mut(&id) {
            if entry.state == RecordState::Submitted {
                entry.state = RecordState::DecryptionRequested;
            }
        }
    }

    /// Write the plaintext fields and mark the record revealed.
    ///
    /// Returns `false` (and changes nothing) if the record is missing or
    /// already revealed.
    #[must_use]
    pub fn reveal(&mut self, id: RecordId, read: String, metadata: String, sample_id: String) -> bool {
        match self.entries.get_mut(&id) {
            Some(entry) if !entry.decrypted.revealed => {
                entry.decrypted = DecryptedRecord::revealed(read, metadata, sample_id);
                entry.state = RecordState::Revealed;
                true
            }
            _ => false,
        }
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All ids in allocation order.
    pub fn ids(&self) -> impl Iterator<Item = RecordId> + '_ {
        self.entries.keys().copied()
    }
}
