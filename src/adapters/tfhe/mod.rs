//! TFHE adapter: Implementation of EncryptionCapability using tfhe-rs.
//!
//! This module provides FHE operations using Zama's tfhe-rs library.
//!
//! # Ciphertext Kinds
//!
//! - Counts are `FheUint32`
//! - Strings (reads, metadata, sample ids) are encrypted byte-wise as
//!   `Vec<FheUint8>`
//!
//! Ciphertexts live in a registry keyed by `CiphertextHandle` until they are
//! released. Handles are never reused; the zero handle is never issued.
//!
//! # Thread Safety
//!
//! **IMPORTANT**: `tfhe::set_server_key()` writes to a *thread-local* (TLS) global.
//!
//! `add` installs the server key for the duration of one homomorphic addition
//! and clears it again through an RAII guard, so no key outlives the call on
//! the current thread.
//!
//! # Transport Form
//!
//! `to_transport_form` serializes a `TransportCiphertext` with bincode. The
//! oracle side reads it back through `PlaintextDecryptor`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

// tfhe-rs imports
use tfhe::prelude::*;
use tfhe::{
    generate_keys, set_server_key, unset_server_key, ClientKey as TfheClientKey, ConfigBuilder,
    FheUint32, FheUint8, ServerKey as TfheServerKey,
};

use crate::domain::{CiphertextHandle, CryptoError};
use crate::ports::{EncryptionCapability, PlaintextDecryptor, PlaintextEncryptor};

/// Longest plaintext string accepted for encryption, in bytes.
const MAX_TEXT_BYTES: usize = 4096;

#[derive(Clone)]
enum StoredCiphertext {
    Count(FheUint32),
    Text(Vec<FheUint8>),
}

/// Wire form of one ciphertext. Each inner buffer is a bincode `FheUint*`.
#[derive(Debug, Serialize, Deserialize)]
enum TransportCiphertext {
    Count(Vec<u8>),
    Text(Vec<Vec<u8>>),
}

/// tfhe-rs backed encryption capability.
///
/// Holds both keys: the server key for homomorphic addition and the client
/// key for encryption at submission time and for oracle-side decryption.
pub struct TfheCapability {
    client_key: TfheClientKey,
    server_key: TfheServerKey,
    registry: Mutex<HashMap<CiphertextHandle, StoredCiphertext>>,
    next_handle: AtomicU64,
}

impl std::fmt::Debug for TfheCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TfheCapability")
            .field("client_key", &"[REDACTED]")
            .field("server_key", &"[REDACTED]")
            .field("ciphertexts", &self.len())
            .finish()
    }
}

impl TfheCapability {
    /// Generate a fresh tfhe-rs key pair.
    ///
    /// Key generation with default parameters takes a few seconds.
    #[must_use]
    pub fn generate() -> Self {
        tracing::info!("Generating FHE key pair...");

        // Using default parameters which are secure for most applications
        let config = ConfigBuilder::default().build();
        let (client_key, server_key) = generate_keys(config);

        tracing::info!("Generated tfhe-rs keys");
        Self::from_keys(client_key, server_key)
    }

    /// Build a capability around existing keys.
    #[must_use]
    pub fn from_keys(client_key: TfheClientKey, server_key: TfheServerKey) -> Self {
        Self {
            client_key,
            server_key,
            registry: Mutex::new(HashMap::new()),
            next_handle: AtomicU64::new(0),
        }
    }

    /// Encrypt a 32-bit count.
    pub fn encrypt_count(&self, value: u32) -> CiphertextHandle {
        self.store(StoredCiphertext::Count(FheUint32::encrypt(
            value,
            &self.client_key,
        )))
    }

    /// Number of live ciphertexts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registry.lock().map(|r| r.len()).unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn store(&self, ciphertext: StoredCiphertext) -> CiphertextHandle {
        let handle = CiphertextHandle::from_raw(self.next_handle.fetch_add(1, Ordering::SeqCst) + 1);
        self.registry
            .lock()
            .expect("Lock failed")
            .insert(handle, ciphertext);
        handle
    }

    fn lookup(&self, handle: &CiphertextHandle) -> Result<StoredCiphertext, CryptoError> {
        self.registry
            .lock()
            .expect("Lock failed")
            .get(handle)
            .cloned()
            .ok_or(CryptoError::UnknownHandle(*handle))
    }

    fn lookup_count(&self, handle: &CiphertextHandle) -> Result<FheUint32, CryptoError> {
        match self.lookup(handle)? {
            StoredCiphertext::Count(ct) => Ok(ct),
            StoredCiphertext::Text(_) => Err(CryptoError::KindMismatch(*handle)),
        }
    }

    fn read_transport(ciphertext: &[u8]) -> Result<TransportCiphertext, CryptoError> {
        bincode::deserialize(ciphertext).map_err(|e| {
            CryptoError::Decryption(format!("Failed to deserialize transport ciphertext: {e}"))
        })
    }
}

impl EncryptionCapability for TfheCapability {
    fn encrypted_zero(&self) -> Result<CiphertextHandle, CryptoError> {
        Ok(self.encrypt_count(0))
    }

    fn encrypted_one(&self) -> Result<CiphertextHandle, CryptoError> {
        Ok(self.encrypt_count(1))
    }

    fn add(
        &self,
        lhs: &CiphertextHandle,
        rhs: &CiphertextHandle,
    ) -> Result<CiphertextHandle, CryptoError> {
        let a = self.lookup_count(lhs)?;
        let b = self.lookup_count(rhs)?;

        // Set the server key (TLS) and ensure it is cleared when this addition
        // finishes.
        struct ServerKeyGuard;
        impl Drop for ServerKeyGuard {
            fn drop(&mut self) {
                unset_server_key();
            }
        }

        set_server_key(self.server_key.clone());
        let _server_key_guard = ServerKeyGuard;

        let sum = &a + &b;
        tracing::trace!("Computed homomorphic addition {lhs} + {rhs}");
        Ok(self.store(StoredCiphertext::Count(sum)))
    }

    fn is_initialized(&self, handle: &CiphertextHandle) -> bool {
        *handle != CiphertextHandle::UNINITIALIZED
            && self
                .registry
                .lock()
                .map(|r| r.contains_key(handle))
                .unwrap_or(false)
    }

    fn to_transport_form(&self, handle: &CiphertextHandle) -> Result<Vec<u8>, CryptoError> {
        let transport = match self.lookup(handle)? {
            StoredCiphertext::Count(ct) => {
                TransportCiphertext::Count(bincode::serialize(&ct).map_err(|e| {
                    CryptoError::Serialization(format!("Failed to serialize count: {e}"))
                })?)
            }
            StoredCiphertext::Text(bytes) => TransportCiphertext::Text(
                bytes
                    .iter()
                    .enumerate()
                    .map(|(i, b)| {
                        bincode::serialize(b).map_err(|e| {
                            CryptoError::Serialization(format!(
                                "Failed to serialize encrypted byte {i}: {e}"
                            ))
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?,
            ),
        };

        bincode::serialize(&transport).map_err(|e| {
            CryptoError::Serialization(format!("Failed to serialize transport ciphertext: {e}"))
        })
    }

    fn release(&self, handle: &CiphertextHandle) {
        if self
            .registry
            .lock()
            .expect("Lock failed")
            .remove(handle)
            .is_some()
        {
            tracing::trace!("Released ciphertext {handle}");
        }
    }
}

impl PlaintextEncryptor for TfheCapability {
    /// Encrypt a string byte-wise.
    ///
    /// # Errors
    /// Returns `CryptoError::Encryption` if the string exceeds `MAX_TEXT_BYTES`.
    fn encrypt_text(&self, text: &str) -> Result<CiphertextHandle, CryptoError> {
        if text.len() > MAX_TEXT_BYTES {
            return Err(CryptoError::Encryption(format!(
                "Text too long: got {} bytes, max {}",
                text.len(),
                MAX_TEXT_BYTES
            )));
        }

        let bytes: Vec<FheUint8> = text
            .bytes()
            .map(|b| FheUint8::encrypt(b, &self.client_key))
            .collect();

        tracing::trace!("Encrypted {} bytes", bytes.len());
        Ok(self.store(StoredCiphertext::Text(bytes)))
    }
}

impl PlaintextDecryptor for TfheCapability {
    fn decrypt_text(&self, ciphertext: &[u8]) -> Result<String, CryptoError> {
        let TransportCiphertext::Text(encrypted_bytes) = Self::read_transport(ciphertext)? else {
            return Err(CryptoError::Decryption("Expected an encrypted string".into()));
        };

        let mut plain = Vec::with_capacity(encrypted_bytes.len());
        for (i, bytes) in encrypted_bytes.iter().enumerate() {
            let fhe_byte: FheUint8 = bincode::deserialize(bytes).map_err(|e| {
                CryptoError::Decryption(format!("Failed to deserialize encrypted byte {i}: {e}"))
            })?;
            let byte: u8 = fhe_byte.decrypt(&self.client_key);
            plain.push(byte);
        }

        String::from_utf8(plain)
            .map_err(|e| CryptoError::Decryption(format!("Decrypted text is not UTF-8: {e}")))
    }

    fn decrypt_count(&self, ciphertext: &[u8]) -> Result<u32, CryptoError> {
        let TransportCiphertext::Count(bytes) = Self::read_transport(ciphertext)? else {
            return Err(CryptoError::Decryption("Expected an encrypted count".into()));
        };

        let fhe_count: FheUint32 = bincode::deserialize(&bytes).map_err(|e| {
            CryptoError::Decryption(format!("Failed to deserialize encrypted count: {e}"))
        })?;
        Ok(fhe_count.decrypt(&self.client_key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_add_decrypt_roundtrip() {
        let capability = TfheCapability::generate();
        assert!(capability.is_empty());

        // Counts
        let two = capability.encrypt_count(2);
        let one = capability.encrypted_one().expect("Should encrypt");
        let three = capability.add(&two, &one).expect("Addition should succeed");
        assert!(capability.is_initialized(&three));

        let transport = capability
            .to_transport_form(&three)
            .expect("Should serialize");
        assert_eq!(capability.decrypt_count(&transport).expect("Should decrypt"), 3);

        // Strings
        let read = capability.encrypt_text("ACGT").expect("Should encrypt");
        let transport = capability
            .to_transport_form(&read)
            .expect("Should serialize");
        assert_eq!(
            capability.decrypt_text(&transport).expect("Should decrypt"),
            "ACGT"
        );
        assert!(capability.decrypt_count(&transport).is_err());

        // Kind and handle checks
        assert!(matches!(
            capability.add(&read, &one),
            Err(CryptoError::KindMismatch(h)) if h == read
        ));
        let foreign = CiphertextHandle::from_raw(9_999);
        assert!(!capability.is_initialized(&foreign));
        assert!(!capability.is_initialized(&CiphertextHandle::UNINITIALIZED));
        assert!(matches!(
            capability.to_transport_form(&foreign),
            Err(CryptoError::UnknownHandle(_))
        ));

        let live = capability.len();
        capability.release(&two);
        assert!(!capability.is_initialized(&two));
        assert_eq!(capability.len(), live - 1);
        capability.release(&two);
        assert_eq!(capability.len(), live - 1);

        assert!(capability.encrypt_text(&"A".repeat(MAX_TEXT_BYTES + 1)).is_err());
        assert!(format!("{capability:?}").contains("[REDACTED]"));
    }
}
