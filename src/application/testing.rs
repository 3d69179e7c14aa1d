//! Deterministic test doubles for the encryption capability and the oracle.
//!
//! `FakeCapability` keeps plaintext behind its handles so tests can "decrypt"
//! aggregate counts by construction. `FakeOracle` issues sequential request
//! ids and accepts only proofs produced by `FakeOracle::prove`.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::{CallbackTag, CiphertextHandle, CryptoError, RequestId};
use crate::ports::{
    DecryptionOracle, EncryptionCapability, OracleError, PlaintextDecryptor, PlaintextEncryptor,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FakeValue {
    Count(u32),
    Text(String),
}

#[derive(Debug, Default)]
pub struct FakeCapability {
    values: Mutex<HashMap<CiphertextHandle, FakeValue>>,
    next: AtomicU64,
    fail_additions: AtomicBool,
}

impl FakeCapability {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn encrypt_text(&self, text: &str) -> CiphertextHandle {
        self.issue(FakeValue::Text(text.to_string()))
    }

    pub fn encrypt_count(&self, count: u32) -> CiphertextHandle {
        self.issue(FakeValue::Count(count))
    }

    /// Plaintext count behind a handle.
    pub fn reveal_count(&self, handle: &CiphertextHandle) -> Option<u32> {
        match self.values.lock().expect("Lock failed").get(handle) {
            Some(FakeValue::Count(n)) => Some(*n),
            _ => None,
        }
    }

    /// Number of ciphertexts not yet released.
    pub fn live(&self) -> usize {
        self.values.lock().expect("Lock failed").len()
    }

    pub fn fail_additions(&self, fail: bool) {
        self.fail_additions.store(fail, Ordering::SeqCst);
    }

    fn issue(&self, value: FakeValue) -> CiphertextHandle {
        let handle = CiphertextHandle::from_raw(self.next.fetch_add(1, Ordering::SeqCst) + 1);
        self.values.lock().expect("Lock failed").insert(handle, value);
        handle
    }

    fn from_transport(bytes: &[u8]) -> Result<FakeValue, CryptoError> {
        serde_json::from_slice(bytes).map_err(|e| CryptoError::Decryption(e.to_string()))
    }
}

impl EncryptionCapability for FakeCapability {
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
        if self.fail_additions.load(Ordering::SeqCst) {
            return Err(CryptoError::Computation("injected failure".into()));
        }
        let a = self.reveal_count(lhs).ok_or(CryptoError::KindMismatch(*lhs))?;
        let b = self.reveal_count(rhs).ok_or(CryptoError::KindMismatch(*rhs))?;
        Ok(self.encrypt_count(a.wrapping_add(b)))
    }

    fn is_initialized(&self, handle: &CiphertextHandle) -> bool {
        self.values.lock().expect("Lock failed").contains_key(handle)
    }

    fn to_transport_form(&self, handle: &CiphertextHandle) -> Result<Vec<u8>, CryptoError> {
        let values = self.values.lock().expect("Lock failed");
        let value = values.get(handle).ok_or(CryptoError::UnknownHandle(*handle))?;
        serde_json::to_vec(value).map_err(|e| CryptoError::Serialization(e.to_string()))
    }

    fn release(&self, handle: &CiphertextHandle) {
        self.values.lock().expect("Lock failed").remove(handle);
    }
}

impl PlaintextEncryptor for FakeCapability {
    fn encrypt_text(&self, text: &str) -> Result<CiphertextHandle, CryptoError> {
        Ok(self.issue(FakeValue::Text(text.to_string())))
    }
}

impl PlaintextDecryptor for FakeCapability {
    fn decrypt_text(&self, ciphertext: &[u8]) -> Result<String, CryptoError> {
        match Self::from_transport(ciphertext)? {
            FakeValue::Text(s) => Ok(s),
            FakeValue::Count(_) => Err(CryptoError::Decryption("expected text".into())),
        }
    }

    fn decrypt_count(&self, ciphertext: &[u8]) -> Result<u32, CryptoError> {
        match Self::from_transport(ciphertext)? {
            FakeValue::Count(n) => Ok(n),
            FakeValue::Text(_) => Err(CryptoError::Decryption("expected count".into())),
        }
    }
}

#[derive(Debug, Default)]
pub struct FakeOracle {
    next: AtomicU64,
    requests: Mutex<HashMap<RequestId, (Vec<Vec<u8>>, CallbackTag)>>,
    forced_ids: Mutex<VecDeque<RequestId>>,
    unavailable: AtomicBool,
}

impl FakeOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Proof accepted by `check_signatures` for this pair.
    pub fn prove(request_id: RequestId, cleartexts: &[u8]) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(b"fake-oracle");
        hasher.update(request_id.get().to_be_bytes());
        hasher.update(cleartexts);
        hasher.finalize().to_vec()
    }

    /// Make the next request reuse `id`.
    pub fn force_next_id(&self, id: RequestId) {
        self.forced_ids.lock().expect("Lock failed").push_back(id);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().expect("Lock failed").len()
    }

    pub fn submitted(&self, request_id: RequestId) -> Option<(Vec<Vec<u8>>, CallbackTag)> {
        self.requests.lock().expect("Lock failed").get(&request_id).cloned()
    }
}

impl DecryptionOracle for FakeOracle {
    fn request_decryption(
        &self,
        ciphertexts: &[Vec<u8>],
        callback: CallbackTag,
    ) -> Result<RequestId, OracleError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(OracleError::Unavailable("fake oracle offline".into()));
        }
        let forced = self.forced_ids.lock().expect("Lock failed").pop_front();
        let id = forced
            .unwrap_or_else(|| RequestId::new(self.next.fetch_add(1, Ordering::SeqCst) + 100));
        self.requests
            .lock()
            .expect("Lock failed")
            .insert(id, (ciphertexts.to_vec(), callback));
        Ok(id)
    }

    fn check_signatures(
        &self,
        request_id: RequestId,
        cleartexts: &[u8],
        proof: &[u8],
    ) -> Result<(), OracleError> {
        if !self.requests.lock().expect("Lock failed").contains_key(&request_id) {
            return Err(OracleError::UnknownRequest(request_id));
        }
        if Self::prove(request_id, cleartexts) != proof {
            return Err(OracleError::InvalidProof("proof mismatch".into()));
        }
        Ok(())
    }
}
