//! Genomic record types.
//!
//! Every submission produces an `EncryptedRecord` and a matching, initially
//! empty `DecryptedRecord` under the same `RecordId`.

use serde::{Deserialize, Serialize};

use super::CiphertextHandle;

/// Sequential record identifier.
///
/// Ids start at 1. `RecordId::NONE` (0) is the "invalid/none" sentinel and is
/// never allocated.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RecordId(u64);

impl RecordId {
    /// The reserved sentinel id.
    pub const NONE: Self = Self(0);

    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    #[must_use]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    /// The id allocated after this one.
    #[must_use]
    pub(crate) const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordState {
    /// Stored, no decryption requested yet
    Submitted,
    /// At least one decryption request is in flight
    DecryptionRequested,
    /// Plaintext fields verified and written (terminal)
    Revealed,
}

impl std::fmt::Display for RecordState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Submitted => write!(f, "SUBMITTED"),
            Self::DecryptionRequested => write!(f, "DECRYPTION_REQUESTED"),
            Self::Revealed => write!(f, "REVEALED"),
        }
    }
}

/// Encrypted half of a record. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedRecord {
    pub id: RecordId,

    /// Encrypted sequence read
    pub encrypted_read: CiphertextHandle,

    /// Encrypted free-form metadata
    pub encrypted_metadata: CiphertextHandle,

    /// Encrypted sample identifier
    pub encrypted_sample_id: CiphertextHandle,

    pub submitted_at: chrono::DateTime<chrono::Utc>,
}

impl EncryptedRecord {
    /// Handles in oracle order: read, metadata, sample id.
    #[must_use]
    pub fn handles(&self) -> [CiphertextHandle; 3] {
        [
            self.encrypted_read,
            self.encrypted_metadata,
            self.encrypted_sample_id,
        ]
    }
}

/// Plaintext half of a record.
///
/// Empty with `revealed == false` until the oracle's verified callback fills it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptedRecord {
    pub read: String,
    pub metadata: String,
    pub sample_id: String,
    pub revealed: bool,
}

impl DecryptedRecord {
    /// A revealed record with the given plaintext fields.
    #[must_use]
    pub fn revealed(
        read: impl Into<String>,
        metadata: impl Into<String>,
        sample_id: impl Into<String>,
    ) -> Self {
        Self {
            read: read.into(),
            metadata: metadata.into(),
            sample_id: sample_id.into(),
            revealed: true,
        }
    }
}
