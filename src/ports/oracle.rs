//! Decryption oracle port: Trait for the external decryption service.
//!
//! Decryption is asynchronous. `request_decryption` returns a request id
//! immediately; the oracle later invokes the lifecycle callback with the
//! cleartexts and a proof that must pass `check_signatures` before use.

use crate::domain::{CallbackTag, CryptoError, RequestId};

/// Errors reported by a decryption oracle.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("Oracle unavailable: {0}")]
    Unavailable(String),

    #[error("Unknown request {0}")]
    UnknownRequest(RequestId),

    #[error("Invalid decryption proof: {0}")]
    InvalidProof(String),

    #[error("Oracle key material error: {0}")]
    KeyMaterial(String),

    #[error("Oracle decryption failed: {0}")]
    Decryption(#[from] CryptoError),
}

/// Trait for the external threshold-decryption service.
pub trait DecryptionOracle: Send + Sync {
    /// Submit a batch of transport-form ciphertexts for decryption.
    ///
    /// The oracle answers later through the callback named by `callback`.
    ///
    /// # Errors
    /// Returns `OracleError::Unavailable` if the request cannot be accepted.
    fn request_decryption(
        &self,
        ciphertexts: &[Vec<u8>],
        callback: CallbackTag,
    ) -> Result<RequestId, OracleError>;

    /// Verify that `proof` attests `cleartexts` as the decryption of the
    /// ciphertexts registered for `request_id`.
    ///
    /// # Errors
    /// Returns `OracleError::UnknownRequest` or `OracleError::InvalidProof`.
    fn check_signatures(
        &self,
        request_id: RequestId,
        cleartexts: &[u8],
        proof: &[u8],
    ) -> Result<(), OracleError>;
}

/// Decryption of transport-form ciphertexts, held by the oracle side.
pub trait PlaintextDecryptor: Send + Sync {
    /// Decrypt an encrypted string.
    ///
    /// # Errors
    /// Returns `CryptoError::Decryption` if the ciphertext is malformed or not a string.
    fn decrypt_text(&self, ciphertext: &[u8]) -> Result<String, CryptoError>;

    /// Decrypt an encrypted 32-bit count.
    ///
    /// # Errors
    /// Returns `CryptoError::Decryption` if the ciphertext is malformed or not a count.
    fn decrypt_count(&self, ciphertext: &[u8]) -> Result<u32, CryptoError>;
}
