//! Encryption capability port: Trait for homomorphic operations on handles.
//!
//! This trait abstracts the FHE library (tfhe-rs) from the record lifecycle.
//! The lifecycle only ever asks for encrypted constants, homomorphic addition
//! and the transport form handed to the decryption oracle.

use crate::domain::{CiphertextHandle, CryptoError};

/// Homomorphic operations over opaque ciphertext handles.
///
/// Implementations own the ciphertexts behind the handles they issue.
pub trait EncryptionCapability: Send + Sync {
    /// A fresh encryption of zero.
    ///
    /// # Errors
    /// Returns `CryptoError::Encryption` if encryption fails.
    fn encrypted_zero(&self) -> Result<CiphertextHandle, CryptoError>;

    /// A fresh encryption of one.
    ///
    /// # Errors
    /// Returns `CryptoError::Encryption` if encryption fails.
    fn encrypted_one(&self) -> Result<CiphertextHandle, CryptoError>;

    /// Homomorphic addition of two encrypted counts.
    ///
    /// # Errors
    /// Returns `CryptoError::UnknownHandle` if either handle was not issued by
    /// this capability, or `CryptoError::Computation` if evaluation fails.
    fn add(
        &self,
        lhs: &CiphertextHandle,
        rhs: &CiphertextHandle,
    ) -> Result<CiphertextHandle, CryptoError>;

    /// Whether the handle refers to a live ciphertext.
    fn is_initialized(&self, handle: &CiphertextHandle) -> bool;

    /// Serialized ciphertext for submission to the decryption oracle.
    ///
    /// # Errors
    /// Returns `CryptoError::UnknownHandle` for foreign handles or
    /// `CryptoError::Serialization` if encoding fails.
    fn to_transport_form(&self, handle: &CiphertextHandle) -> Result<Vec<u8>, CryptoError>;

    /// Drop the ciphertext behind a handle. Unknown handles are ignored.
    fn release(&self, handle: &CiphertextHandle);
}

/// Client-side encryption of plaintext fields at submission time.
pub trait PlaintextEncryptor: Send + Sync {
    /// Encrypt a string field (read, metadata or sample id).
    ///
    /// # Errors
    /// Returns `CryptoError::Encryption` if the text cannot be encrypted.
    fn encrypt_text(&self, text: &str) -> Result<CiphertextHandle, CryptoError>;
}
