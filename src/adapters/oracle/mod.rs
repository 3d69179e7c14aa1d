//! Signing oracle: local implementation of the DecryptionOracle port.
//!
//! Stands in for the external threshold-decryption service. It accepts
//! decryption requests, decrypts them on demand through a
//! `PlaintextDecryptor`, and attests every answer with an Ed25519 signature.
//!
//! # Proof Format
//!
//! The proof is a 64-byte Ed25519 signature over
//!
//! ```text
//! SHA-256("genovault-decryption-v1" || request_id (u64 BE) || SHA-256(ciphertexts) || cleartexts)
//! ```
//!
//! where the ciphertext digest covers each ciphertext's length (u64 BE)
//! followed by its bytes, in request order. A proof is therefore bound to one
//! request id, to the exact ciphertexts submitted with it, and to one
//! cleartext payload.
//!
//! # Security
//!
//! - Request ids come from a ChaCha20 CSPRNG seeded from OS entropy
//! - Verification uses `verify_strict` (rejects small-order keys and
//!   non-canonical signatures)
//! - The authority seed is zeroized after the signing key is built

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use base64::engine::general_purpose;
use base64::Engine;
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::domain::{abi, CallbackTag, RequestId};
use crate::ports::{DecryptionOracle, OracleError, PlaintextDecryptor};

const PROOF_DOMAIN: &[u8] = b"genovault-decryption-v1";

#[derive(Zeroize, ZeroizeOnDrop)]
struct Seed([u8; 32]);

/// A request the oracle has accepted.
///
/// Once fulfilled, the ciphertexts are dropped and only the digest (needed to
/// check proofs) and the cleartexts (to answer a repeated fulfil) are kept.
#[derive(Debug, Clone)]
struct PendingRequest {
    ciphertexts: Vec<Vec<u8>>,
    digest: [u8; 32],
    callback: CallbackTag,
    cleartexts: Option<Vec<u8>>,
}

/// A fulfilled decryption, ready to be delivered to the lifecycle callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleResponse {
    pub request_id: RequestId,
    pub callback: CallbackTag,
    pub cleartexts: Vec<u8>,
    pub proof: Vec<u8>,
}

/// Ed25519-attesting decryption oracle.
pub struct SigningOracle {
    signing_key: SigningKey,
    pending: Mutex<HashMap<RequestId, PendingRequest>>,

    /// CSPRNG for request ids
    rng: Mutex<ChaCha20Rng>,
}

impl std::fmt::Debug for SigningOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningOracle")
            .field("authority", &self.authority_fingerprint())
            .finish_non_exhaustive()
    }
}

impl SigningOracle {
    /// Create an oracle with a freshly generated authority key.
    #[must_use]
    pub fn generate() -> Self {
        Self::new(SigningKey::generate(&mut OsRng))
    }

    /// Create an oracle around an existing authority key.
    #[must_use]
    pub fn new(signing_key: SigningKey) -> Self {
        Self {
            signing_key,
            pending: Mutex::new(HashMap::new()),
            rng: Mutex::new(ChaCha20Rng::from_entropy()),
        }
    }

    #[cfg(test)]
    fn with_test_seed(signing_key: SigningKey, seed: [u8; 32]) -> Self {
        Self {
            signing_key,
            pending: Mutex::new(HashMap::new()),
            rng: Mutex::new(ChaCha20Rng::from_seed(seed)),
        }
    }

    /// Load the authority key from a file holding a base64 32-byte seed.
    ///
    /// # Errors
    /// Returns `OracleError::KeyMaterial` if the file cannot be read or does
    /// not hold a valid seed.
    pub fn from_seed_file(path: &Path) -> Result<Self, OracleError> {
        let content = zeroize::Zeroizing::new(
            std::fs::read_to_string(path)
                .map_err(|e| OracleError::KeyMaterial(format!("Failed to read {path:?}: {e}")))?,
        );
        let decoded = zeroize::Zeroizing::new(
            general_purpose::STANDARD
                .decode(content.trim())
                .map_err(|e| OracleError::KeyMaterial(format!("Invalid base64 seed: {e}")))?,
        );

        let bytes: [u8; 32] = decoded.as_slice().try_into().map_err(|_| {
            OracleError::KeyMaterial(format!("Seed must be 32 bytes, got {}", decoded.len()))
        })?;
        let seed = Seed(bytes);

        tracing::info!("Loaded oracle authority key from {}", path.display());
        Ok(Self::new(SigningKey::from_bytes(&seed.0)))
    }

    /// Public key used to verify proofs.
    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Hex prefix of the SHA-256 of the verifying key.
    #[must_use]
    pub fn authority_fingerprint(&self) -> String {
        let hash = Sha256::digest(self.verifying_key().as_bytes());
        hash[..8].iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Ids of requests not yet fulfilled, in ascending order.
    #[must_use]
    pub fn pending_requests(&self) -> Vec<RequestId> {
        let pending = self.pending.lock().expect("Lock failed");
        let mut ids: Vec<RequestId> = pending
            .iter()
            .filter(|(_, r)| r.cleartexts.is_none())
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        ids
    }

    /// Decrypt a request's ciphertexts and sign the ABI-encoded cleartexts.
    ///
    /// Fulfilling the same request again produces the same cleartexts and a
    /// fresh (equally valid) proof.
    ///
    /// # Errors
    /// - `OracleError::UnknownRequest` if the request was never accepted
    /// - `OracleError::Decryption` if a ciphertext cannot be decrypted
    /// - `OracleError::Unavailable` if the batch does not fit its callback
    pub fn fulfil<D>(&self, request_id: RequestId, decryptor: &D) -> Result<OracleResponse, OracleError>
    where
        D: PlaintextDecryptor + ?Sized,
    {
        let request = self
            .pending
            .lock()
            .expect("Lock failed")
            .get(&request_id)
            .cloned()
            .ok_or(OracleError::UnknownRequest(request_id))?;

        let cleartexts = match (request.cleartexts, request.callback) {
            (Some(cached), _) => cached,
            (None, CallbackTag::RevealRecord) => {
                let texts = request
                    .ciphertexts
                    .iter()
                    .map(|ct| decryptor.decrypt_text(ct))
                    .collect::<Result<Vec<_>, _>>()?;
                abi::encode_strings(&texts)
            }
            (None, CallbackTag::RevealSampleCount) => {
                let [ciphertext] = request.ciphertexts.as_slice() else {
                    return Err(OracleError::Unavailable(format!(
                        "Count request {request_id} carries {} ciphertexts, expected 1",
                        request.ciphertexts.len()
                    )));
                };
                abi::encode_u32(decryptor.decrypt_count(ciphertext)?)
            }
        };

        let message = Self::proof_message(request_id, &request.digest, &cleartexts);
        let signature: Signature = self.signing_key.sign(&message);

        if let Some(entry) = self.pending.lock().expect("Lock failed").get_mut(&request_id) {
            entry.ciphertexts = Vec::new();
            entry.cleartexts = Some(cleartexts.clone());
        }

        tracing::info!("Fulfilled decryption request {request_id}");
        Ok(OracleResponse {
            request_id,
            callback: request.callback,
            cleartexts,
            proof: signature.to_bytes().to_vec(),
        })
    }

    fn ciphertext_digest(ciphertexts: &[Vec<u8>]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        for ct in ciphertexts {
            hasher.update((ct.len() as u64).to_be_bytes());
            hasher.update(ct);
        }
        hasher.finalize().into()
    }

    fn proof_message(request_id: RequestId, digest: &[u8; 32], cleartexts: &[u8]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(PROOF_DOMAIN);
        hasher.update(request_id.get().to_be_bytes());
        hasher.update(digest);
        hasher.update(cleartexts);
        hasher.finalize().into()
    }

    fn next_request_id(&self, pending: &HashMap<RequestId, PendingRequest>) -> Result<RequestId, OracleError> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| OracleError::Unavailable("Request id RNG lock poisoned".into()))?;
        loop {
            let raw: u64 = rng.gen();
            let id = RequestId::new(raw);
            if raw != 0 && !pending.contains_key(&id) {
                return Ok(id);
            }
        }
    }
}

impl DecryptionOracle for SigningOracle {
    fn request_decryption(
        &self,
        ciphertexts: &[Vec<u8>],
        callback: CallbackTag,
    ) -> Result<RequestId, OracleError> {
        if ciphertexts.is_empty() {
            return Err(OracleError::Unavailable("Empty decryption batch".into()));
        }

        let mut pending = self.pending.lock().expect("Lock failed");
        let request_id = self.next_request_id(&pending)?;
        pending.insert(
            request_id,
            PendingRequest {
                ciphertexts: ciphertexts.to_vec(),
                digest: Self::ciphertext_digest(ciphertexts),
                callback,
                cleartexts: None,
            },
        );

        tracing::debug!(
            "Accepted decryption request {request_id} ({} ciphertexts, {:?})",
            ciphertexts.len(),
            callback
        );
        Ok(request_id)
    }

    fn check_signatures(
        &self,
        request_id: RequestId,
        cleartexts: &[u8],
        proof: &[u8],
    ) -> Result<(), OracleError> {
        let digest = self
            .pending
            .lock()
            .expect("Lock failed")
            .get(&request_id)
            .map(|r| r.digest)
            .ok_or(OracleError::UnknownRequest(request_id))?;

        let signature = Signature::from_slice(proof)
            .map_err(|_| OracleError::InvalidProof(format!("Malformed signature ({} bytes)", proof.len())))?;
        let message = Self::proof_message(request_id, &digest, cleartexts);

        self.verifying_key()
            .verify_strict(&message, &signature)
            .map_err(|_| OracleError::InvalidProof("Signature verification failed".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::FakeCapability;
    use crate::ports::EncryptionCapability;

    fn create_test_oracle() -> SigningOracle {
        SigningOracle::with_test_seed(SigningKey::from_bytes(&[7u8; 32]), [42u8; 32])
    }

    fn record_batch(capability: &FakeCapability, read: &str, sample: &str) -> Vec<Vec<u8>> {
        [
            capability.encrypt_text(read),
            capability.encrypt_text("meta"),
            capability.encrypt_text(sample),
        ]
        .iter()
        .map(|h| capability.to_transport_form(h).expect("Should serialize"))
        .collect()
    }

    #[test]
    fn test_fulfil_record_request_verifies() {
        let oracle = create_test_oracle();
        let capability = FakeCapability::new();
        let batch = record_batch(&capability, "ACGT", "S1");

        let request_id = oracle
            .request_decryption(&batch, CallbackTag::RevealRecord)
            .expect("Should accept");
        assert_ne!(request_id.get(), 0);
        assert_eq!(oracle.pending_requests(), vec![request_id]);

        let response = oracle.fulfil(request_id, &capability).expect("Should fulfil");
        assert_eq!(response.callback, CallbackTag::RevealRecord);
        assert_eq!(
            abi::decode_strings::<3>(&response.cleartexts).expect("Should decode"),
            ["ACGT".to_string(), "meta".to_string(), "S1".to_string()]
        );
        oracle
            .check_signatures(request_id, &response.cleartexts, &response.proof)
            .expect("Proof should verify");
        assert!(oracle.pending_requests().is_empty());

        // Still verifiable after fulfilment.
        oracle
            .check_signatures(request_id, &response.cleartexts, &response.proof)
            .expect("Proof should still verify");
    }

    #[test]
    fn test_fulfil_count_request() {
        let oracle = create_test_oracle();
        let capability = FakeCapability::new();
        let count = capability.encrypt_count(5);
        let batch = vec![capability.to_transport_form(&count).expect("Should serialize")];

        let request_id = oracle
            .request_decryption(&batch, CallbackTag::RevealSampleCount)
            .expect("Should accept");
        let response = oracle.fulfil(request_id, &capability).expect("Should fulfil");

        assert_eq!(abi::decode_u32(&response.cleartexts).expect("Should decode"), 5);
        oracle
            .check_signatures(request_id, &response.cleartexts, &response.proof)
            .expect("Proof should verify");
    }

    #[test]
    fn test_fulfilled_request_drops_ciphertexts() {
        let oracle = create_test_oracle();
        let capability = FakeCapability::new();
        let batch = record_batch(&capability, "ACGT", "S1");

        let request_id = oracle
            .request_decryption(&batch, CallbackTag::RevealRecord)
            .expect("Should accept");
        let first = oracle.fulfil(request_id, &capability).expect("Should fulfil");

        {
            let pending = oracle.pending.lock().expect("Lock failed");
            let entry = pending.get(&request_id).expect("Should be tracked");
            assert!(entry.ciphertexts.is_empty());
            assert_eq!(entry.cleartexts.as_deref(), Some(first.cleartexts.as_slice()));
        }

        // Answered from the cached cleartexts; the decryptor is not consulted.
        let empty = FakeCapability::new();
        let second = oracle.fulfil(request_id, &empty).expect("Should fulfil again");
        assert_eq!(second.cleartexts, first.cleartexts);
        oracle
            .check_signatures(request_id, &second.cleartexts, &second.proof)
            .expect("Repeated proof should verify");
    }

    #[test]
    fn test_proof_is_bound_to_request_and_cleartexts() {
        let oracle = create_test_oracle();
        let capability = FakeCapability::new();

        let first = oracle
            .request_decryption(&record_batch(&capability, "ACGT", "S1"), CallbackTag::RevealRecord)
            .expect("Should accept");
        let second = oracle
            .request_decryption(&record_batch(&capability, "ACGT", "S1"), CallbackTag::RevealRecord)
            .expect("Should accept");
        assert_ne!(first, second);

        let response = oracle.fulfil(first, &capability).expect("Should fulfil");

        // Different request id
        assert!(matches!(
            oracle.check_signatures(second, &response.cleartexts, &response.proof),
            Err(OracleError::InvalidProof(_))
        ));

        // Tampered cleartexts
        let forged = abi::encode_strings(&["TTTT", "meta", "S1"]);
        assert!(matches!(
            oracle.check_signatures(first, &forged, &response.proof),
            Err(OracleError::InvalidProof(_))
        ));

        // Truncated proof
        assert!(matches!(
            oracle.check_signatures(first, &response.cleartexts, &response.proof[..32]),
            Err(OracleError::InvalidProof(_))
        ));

        // Another authority
        let other = SigningOracle::with_test_seed(SigningKey::from_bytes(&[8u8; 32]), [42u8; 32]);
        let other_id = other
            .request_decryption(&record_batch(&capability, "ACGT", "S1"), CallbackTag::RevealRecord)
            .expect("Should accept");
        let other_response = other.fulfil(other_id, &capability).expect("Should fulfil");
        assert!(oracle
            .check_signatures(first, &other_response.cleartexts, &other_response.proof)
            .is_err());
    }

    #[test]
    fn test_unknown_request() {
        let oracle = create_test_oracle();
        let capability = FakeCapability::new();
        let unknown = RequestId::new(1);

        assert!(matches!(
            oracle.fulfil(unknown, &capability),
            Err(OracleError::UnknownRequest(_))
        ));
        assert!(matches!(
            oracle.check_signatures(unknown, &[], &[0u8; 64]),
            Err(OracleError::UnknownRequest(_))
        ));
        assert!(oracle
            .request_decryption(&[], CallbackTag::RevealRecord)
            .is_err());
    }

    #[test]
    fn test_seed_file_loading() {
        let dir = tempfile::tempdir().expect("Should create temp dir");
        let path = dir.path().join("oracle.seed");

        std::fs::write(&path, format!("{}\n", general_purpose::STANDARD.encode([9u8; 32])))
            .expect("Should write seed");
        let oracle = SigningOracle::from_seed_file(&path).expect("Should load");
        assert_eq!(
            oracle.verifying_key(),
            SigningKey::from_bytes(&[9u8; 32]).verifying_key()
        );
        assert_eq!(oracle.authority_fingerprint().len(), 16);

        std::fs::write(&path, general_purpose::STANDARD.encode([9u8; 16])).expect("Should write");
        assert!(matches!(
            SigningOracle::from_seed_file(&path),
            Err(OracleError::KeyMaterial(_))
        ));
        assert!(SigningOracle::from_seed_file(&dir.path().join("missing")).is_err());
    }
}
