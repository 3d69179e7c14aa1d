//! Decryption request types.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::RecordId;

/// Oracle-assigned decryption request identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(u64);

impl RequestId {
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Fixed-width key for a sample: SHA-256 of the sample id string.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SampleKey([u8; 32]);

impl SampleKey {
    /// Stable key for `sample_id`.
    #[must_use]
    pub fn for_sample(sample_id: &str) -> Self {
        Self(Sha256::digest(sample_id.as_bytes()).into())
    }
}

impl std::fmt::Debug for SampleKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SampleKey({self})")
    }
}

impl std::fmt::Display for SampleKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Short prefix is enough to tell keys apart in logs.
        for b in &self.0[..8] {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

/// What a decryption request reveals when it resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DecryptionTarget {
    /// The three plaintext fields of one record
    Record(RecordId),
    /// The encrypted running count of one sample
    Sample(SampleKey),
}

/// Which callback the oracle must invoke when a request completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallbackTag {
    /// Cleartexts are an ABI tuple of strings (read, metadata, sample id)
    RevealRecord,
    /// Cleartexts are a single ABI-encoded 32-bit count
    RevealSampleCount,
}

/// A registered request and the target it resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecryptionRequest {
    pub request_id: RequestId,
    pub target: DecryptionTarget,
}

/// Decrypted aggregate count for one sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleCount {
    pub sample_id: String,
    pub count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_key_is_stable() {
        assert_eq!(SampleKey::for_sample("S1"), SampleKey::for_sample("S1"));
        assert_ne!(SampleKey::for_sample("S1"), SampleKey::for_sample("S2"));
    }

    #[test]
    fn test_sample_key_display_is_short_hex() {
        let key = SampleKey::for_sample("S1");
        let shown = key.to_string();
        assert_eq!(shown.len(), 16);
        assert!(shown.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_request_id_display() {
        assert_eq!(RequestId::new(255).to_string(), "00000000000000ff");
    }
}
