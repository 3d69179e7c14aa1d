//! Record lifecycle controller: submit → request decryption → verified reveal.
//!
//! Per record: `Submitted → DecryptionRequested → Revealed` (terminal).
//!
//! Requests and callbacks are independent entry points joined only through
//! the request tracker. Nothing blocks waiting for the oracle: `submit` and
//! `request_decryption` return as soon as the work is issued, and the oracle
//! calls `resolve` / `resolve_sample_count_decryption` later, in any order.
//!
//! Every mutating call takes `&mut self`, so each call is atomic with respect
//! to the others. A failed call leaves all state as it was.

use std::sync::Arc;

use crate::application::{AggregateLedger, RecordStore, RequestTracker, TrackerError};
use crate::domain::{
    abi, AbiError, CallbackTag, CiphertextHandle, CryptoError, DecryptedRecord,
    DecryptionRequest, DecryptionTarget, EncryptedRecord, RecordId, RecordState, RequestId,
    SampleCount, SampleKey,
};
use crate::ports::{DecryptionOracle, EncryptionCapability, OracleError};

/// Errors produced by lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("Record {0} not found")]
    RecordNotFound(RecordId),

    #[error("Record {0} has already been decrypted")]
    AlreadyDecrypted(RecordId),

    #[error("Request {0} does not target a decryptable entity")]
    InvalidRequest(RequestId),

    #[error("Unknown decryption request {0}")]
    UnknownRequest(RequestId),

    #[error("Decryption proof rejected for request {request_id}: {reason}")]
    ProofInvalid { request_id: RequestId, reason: String },

    #[error("No aggregate count for sample {0}")]
    SampleNotFound(String),

    #[error("Request id {0} is already registered")]
    DuplicateRequestId(RequestId),

    #[error("Malformed cleartexts: {0}")]
    MalformedCleartexts(#[from] AbiError),

    #[error("Encryption capability failed: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Decryption oracle failed: {0}")]
    Oracle(#[from] OracleError),
}

impl From<TrackerError> for LifecycleError {
    fn from(e: TrackerError) -> Self {
        match e {
            TrackerError::DuplicateRequestId(id) => Self::DuplicateRequestId(id),
            TrackerError::UnknownRequest(id) => Self::UnknownRequest(id),
        }
    }
}

/// Result of delivering an oracle callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// A record's plaintext fields were revealed
    Revealed(RecordId),
    /// A sample's aggregate count was decrypted
    SampleCount(SampleCount),
}

/// Orchestrates the encrypted-record lifecycle.
pub struct RecordLifecycle<E, O>
where
    E: EncryptionCapability,
    O: DecryptionOracle,
{
    capability: Arc<E>,
    oracle: Arc<O>,
    records: RecordStore,
    requests: RequestTracker,
    aggregates: AggregateLedger,
}

impl<E, O> RecordLifecycle<E, O>
where
    E: EncryptionCapability,
    O: DecryptionOracle,
{
    /// Create an empty lifecycle over the given capability and oracle.
    pub fn new(capability: Arc<E>, oracle: Arc<O>) -> Self {
        Self::continuing_after(capability, oracle, RecordId::NONE)
    }

    /// Create an empty lifecycle whose record ids start after `last_id`,
    /// e.g. the highest id already mirrored to a ledger.
    pub fn continuing_after(capability: Arc<E>, oracle: Arc<O>, last_id: RecordId) -> Self {
        Self {
            capability,
            oracle,
            records: RecordStore::continuing_after(last_id),
            requests: RequestTracker::new(),
            aggregates: AggregateLedger::new(),
        }
    }

    /// Store a new encrypted record and return its id (1-based, sequential).
    pub fn submit(
        &mut self,
        encrypted_read: CiphertextHandle,
        encrypted_metadata: CiphertextHandle,
        encrypted_sample_id: CiphertextHandle,
    ) -> RecordId {
        let id = self.records.insert(
            encrypted_read,
            encrypted_metadata,
            encrypted_sample_id,
            chrono::Utc::now(),
        );
        tracing::info!("Submitted encrypted record {id}");
        id
    }

    /// Ask the oracle to decrypt a record's three fields.
    ///
    /// Several requests may be in flight for the same record; only the first
    /// verified callback reveals it.
    ///
    /// # Errors
    /// - `RecordNotFound` if the record does not exist
    /// - `AlreadyDecrypted` if it is already revealed
    /// - `Crypto` / `Oracle` if the request cannot be issued
    /// - `DuplicateRequestId` if the oracle reuses an id
    pub fn request_decryption(&mut self, record_id: RecordId) -> Result<RequestId, LifecycleError> {
        let record = self
            .records
            .encrypted(record_id)
            .ok_or(LifecycleError::RecordNotFound(record_id))?;
        if self.is_revealed(record_id) {
            tracing::warn!("Rejected decryption request for revealed record {record_id}");
            return Err(LifecycleError::AlreadyDecrypted(record_id));
        }

        let ciphertexts = record
            .handles()
            .iter()
            .map(|handle| self.capability.to_transport_form(handle))
            .collect::<Result<Vec<_>, _>>()?;

        let request_id = self
            .oracle
            .request_decryption(&ciphertexts, CallbackTag::RevealRecord)?;
        self.requests
            .register(request_id, DecryptionTarget::Record(record_id))?;
        self.records.mark_requested(record_id);

        tracing::info!("Requested decryption of record {record_id} (request {request_id})");
        Ok(request_id)
    }

    /// Oracle callback for a record decryption.
    ///
    /// Cleartexts are the ABI tuple `(read, metadata, sample_id)`. On success
    /// the record is revealed and its sample's encrypted count incremented.
    ///
    /// # Errors
    /// - `InvalidRequest` if the request is unknown or does not target a record
    /// - `ProofInvalid` if the oracle proof does not verify
    /// - `AlreadyDecrypted` if the record was revealed by an earlier callback
    /// - `MalformedCleartexts` / `Crypto` if the reveal cannot be applied
    pub fn resolve(
        &mut self,
        request_id: RequestId,
        cleartexts: &[u8],
        proof: &[u8],
    ) -> Result<RecordId, LifecycleError> {
        let record_id = match self.requests.resolve(request_id) {
            Ok(DecryptionTarget::Record(id)) if !id.is_none() => id,
            _ => {
                tracing::warn!("Rejected callback for invalid request {request_id}");
                return Err(LifecycleError::InvalidRequest(request_id));
            }
        };

        self.verify(request_id, cleartexts, proof)?;

        let revealed = self
            .records
            .decrypted(record_id)
            .ok_or(LifecycleError::RecordNotFound(record_id))?
            .revealed;
        if revealed {
            tracing::warn!("Ignored repeated reveal of record {record_id} (request {request_id})");
            return Err(LifecycleError::AlreadyDecrypted(record_id));
        }

        let [read, metadata, sample_id] = abi::decode_strings::<3>(cleartexts)?;

        // The count is updated first: it is the only step that can fail.
        self.aggregates
            .increment(&sample_id, self.capability.as_ref())?;
        if !self.records.reveal(record_id, read, metadata, sample_id) {
            return Err(LifecycleError::AlreadyDecrypted(record_id));
        }

        tracing::info!("Revealed record {record_id} (request {request_id})");
        Ok(record_id)
    }

    /// Plaintext fields of a record.
    ///
    /// Unknown and unrevealed records read as the empty, unrevealed record.
    #[must_use]
    pub fn get_decrypted_record(&self, record_id: RecordId) -> DecryptedRecord {
        self.records
            .decrypted(record_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Encrypted half of a record.
    #[must_use]
    pub fn encrypted_record(&self, record_id: RecordId) -> Option<&EncryptedRecord> {
        self.records.encrypted(record_id)
    }

    #[must_use]
    pub fn record_state(&self, record_id: RecordId) -> Option<RecordState> {
        self.records.state(record_id)
    }

    /// Number of submitted records.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Ids of all submitted records in submission order.
    #[must_use]
    pub fn record_ids(&self) -> Vec<RecordId> {
        self.records.ids().collect()
    }

    /// Create an encrypted-zero count for a sample if it has none.
    ///
    /// # Errors
    /// Returns `Crypto` if the capability cannot encrypt zero.
    pub fn ensure_sample(&mut self, sample_id: &str) -> Result<(), LifecycleError> {
        self.aggregates
            .ensure_sample(sample_id, self.capability.as_ref())?;
        Ok(())
    }

    /// Encrypted count of revealed records for a sample.
    ///
    /// # Errors
    /// Returns `SampleNotFound` if the sample has no count entry.
    pub fn encrypted_count(&self, sample_id: &str) -> Result<CiphertextHandle, LifecycleError> {
        self.aggregates
            .encrypted_count(sample_id)
            .ok_or_else(|| LifecycleError::SampleNotFound(sample_id.to_string()))
    }

    /// Sample ids with a count entry, in first-seen order.
    #[must_use]
    pub fn samples(&self) -> &[String] {
        self.aggregates.samples()
    }

    /// Ask the oracle to decrypt a sample's aggregate count.
    ///
    /// # Errors
    /// - `SampleNotFound` if the sample has no count entry
    /// - `Crypto` / `Oracle` if the request cannot be issued
    /// - `DuplicateRequestId` if the oracle reuses an id
    pub fn request_sample_count_decryption(
        &mut self,
        sample_id: &str,
    ) -> Result<RequestId, LifecycleError> {
        let handle = self.encrypted_count(sample_id)?;
        let key = SampleKey::for_sample(sample_id);
        let ciphertext = self.capability.to_transport_form(&handle)?;

        let request_id = self
            .oracle
            .request_decryption(&[ciphertext], CallbackTag::RevealSampleCount)?;
        self.requests
            .register(request_id, DecryptionTarget::Sample(key))?;

        tracing::info!("Requested count decryption for sample key {key} (request {request_id})");
        Ok(request_id)
    }

    /// Oracle callback for a sample-count decryption.
    ///
    /// Read-only: the decoded count is returned to the caller and nothing is
    /// stored.
    ///
    /// # Errors
    /// - `InvalidRequest` if the request is unknown or does not target a sample
    /// - `ProofInvalid` if the oracle proof does not verify
    /// - `SampleNotFound` if the sample key cannot be reversed
    /// - `MalformedCleartexts` if the count cannot be decoded
    pub fn resolve_sample_count_decryption(
        &self,
        request_id: RequestId,
        cleartexts: &[u8],
        proof: &[u8],
    ) -> Result<SampleCount, LifecycleError> {
        let key = match self.requests.resolve(request_id) {
            Ok(DecryptionTarget::Sample(key)) => key,
            _ => {
                tracing::warn!("Rejected count callback for invalid request {request_id}");
                return Err(LifecycleError::InvalidRequest(request_id));
            }
        };

        self.verify(request_id, cleartexts, proof)?;

        let sample_id = self
            .aggregates
            .find_sample(&key)
            .ok_or_else(|| LifecycleError::SampleNotFound(key.to_string()))?;
        let count = abi::decode_u32(cleartexts)?;

        tracing::info!("Decrypted count for sample key {key} (request {request_id})");
        Ok(SampleCount {
            sample_id: sample_id.to_string(),
            count,
        })
    }

    /// Route an oracle callback by its tag.
    ///
    /// # Errors
    /// Propagates the error of `resolve` or `resolve_sample_count_decryption`.
    pub fn deliver(
        &mut self,
        callback: CallbackTag,
        request_id: RequestId,
        cleartexts: &[u8],
        proof: &[u8],
    ) -> Result<CallbackOutcome, LifecycleError> {
        match callback {
            CallbackTag::RevealRecord => self
                .resolve(request_id, cleartexts, proof)
                .map(CallbackOutcome::Revealed),
            CallbackTag::RevealSampleCount => self
                .resolve_sample_count_decryption(request_id, cleartexts, proof)
                .map(CallbackOutcome::SampleCount),
        }
    }

    /// Target of a registered request.
    ///
    /// # Errors
    /// Returns `UnknownRequest` if the request was never registered.
    pub fn request(&self, request_id: RequestId) -> Result<DecryptionRequest, LifecycleError> {
        let target = self.requests.resolve(request_id)?;
        Ok(DecryptionRequest { request_id, target })
    }

    /// Shared encryption capability.
    #[must_use]
    pub fn capability(&self) -> &Arc<E> {
        &self.capability
    }

    fn is_revealed(&self, record_id: RecordId) -> bool {
        self.records
            .decrypted(record_id)
            .is_some_and(|r| r.revealed)
    }

    fn verify(
        &self,
        request_id: RequestId,
        cleartexts: &[u8],
        proof: &[u8],
    ) -> Result<(), LifecycleError> {
        self.oracle
            .check_signatures(request_id, cleartexts, proof)
            .map_err(|e| {
                tracing::warn!("Rejected proof for request {request_id}: {e}");
                LifecycleError::ProofInvalid {
                    request_id,
                    reason: e.to_string(),
                }
            })
    }
}
