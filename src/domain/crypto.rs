//! Ciphertext handles and cryptographic error types.
//!
//! The core never sees ciphertext bytes or plaintext values directly. It only
//! moves `CiphertextHandle`s between the encryption capability, the record
//! store and the aggregate ledger.

use serde::{Deserialize, Serialize};

/// Error type for cryptographic operations.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Decryption failed: {0}")]
    Decryption(String),

    #[error("FHE computation failed: {0}")]
    Computation(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("Unknown ciphertext handle {0}")]
    UnknownHandle(CiphertextHandle),

    #[error("Ciphertext {0} has the wrong kind for this operation")]
    KindMismatch(CiphertextHandle),
}

/// Opaque reference to an encrypted value held by the encryption capability.
///
/// A handle carries no ciphertext and no plaintext. The raw id is only
/// meaningful to the capability that issued it. The zero handle is never
/// issued and stands for "uninitialized".
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CiphertextHandle(u64);

impl CiphertextHandle {
    /// Handle that refers to nothing.
    pub const UNINITIALIZED: Self = Self(0);

    /// Wrap a raw id issued by an encryption capability.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw id, for use by the issuing capability only.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Debug for CiphertextHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CiphertextHandle(#{})", self.0)
    }
}

impl std::fmt::Display for CiphertextHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ct#{}", self.0)
    }
}
