//! Aggregate ledger: encrypted running count of revealed records per sample.
//!
//! The sample id is plaintext (known once a record reveals it), the count is
//! not. An entry exists iff at least one record of that sample has been
//! revealed, and its value only ever grows by one encrypted unit per reveal.
//!
//! `sample_list` keeps insertion order and backs the reverse lookup from a
//! `SampleKey` to its sample id. The lookup is a linear scan: samples get no id
//! up front, and sample cardinality stays small next to record cardinality.

use std::collections::HashMap;

use crate::domain::{CiphertextHandle, CryptoError, SampleKey};
use crate::ports::EncryptionCapability;

#[derive(Debug, Default)]
pub struct AggregateLedger {
    counts: HashMap<String, CiphertextHandle>,
    sample_list: Vec<String>,
}

impl AggregateLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an encrypted-zero entry for `sample_id` if none exists.
    ///
    /// # Errors
    /// Returns `CryptoError` if the capability cannot produce an encrypted zero.
    pub fn ensure_sample<E>(&mut self, sample_id: &str, capability: &E) -> Result<(), CryptoError>
    where
        E: EncryptionCapability + ?Sized,
    {
        if !self.counts.contains_key(sample_id) {
            let zero = capability.encrypted_zero()?;
            self.store(sample_id, zero);
        }
        Ok(())
    }

    /// Add an encrypted one to the count of `sample_id`.
    ///
    /// The new count is computed before anything is stored, so a failed
    /// capability call leaves the ledger unchanged. The superseded count and
    /// the encrypted one are released afterwards; a handle returned by an
    /// earlier `encrypted_count` stops resolving.
    ///
    /// # Errors
    /// Returns `CryptoError` if encryption or homomorphic addition fails.
    pub fn increment<E>(
        &mut self,
        sample_id: &str,
        capability: &E,
    ) -> Result<CiphertextHandle, CryptoError>
    where
        E: EncryptionCapability + ?Sized,
    {
        let stored = self
            .counts
            .get(sample_id)
            .copied()
            .filter(|handle| capability.is_initialized(handle));
        let current = match stored {
            Some(handle) => handle,
            None => capability.encrypted_zero()?,
        };

        let sum = capability.encrypted_one().and_then(|one| {
            let sum = capability.add(&current, &one);
            capability.release(&one);
            sum
        });
        let updated = match sum {
            Ok(handle) => handle,
            Err(e) => {
                if stored.is_none() {
                    capability.release(&current);
                }
                return Err(e);
            }
        };

        self.store(sample_id, updated);
        capability.release(&current);
        tracing::debug!(
            "Incremented encrypted count for sample key {} ({} samples tracked)",
            SampleKey::for_sample(sample_id),
            self.sample_list.len()
        );
        Ok(updated)
    }

    /// Encrypted count for `sample_id`, if the sample has an entry.
    #[must_use]
    pub fn encrypted_count(&self, sample_id: &str) -> Option<CiphertextHandle> {
        self.counts.get(sample_id).copied()
    }

    /// Reverse-map a sample key to its sample id (linear scan).
    #[must_use]
    pub fn find_sample(&self, key: &SampleKey) -> Option<&str> {
        self.sample_list
            .iter()
            .find(|sample_id| SampleKey::for_sample(sample_id) == *key)
            .map(String::as_str)
    }

    /// Sample ids with a count entry, in first-seen order.
    #[must_use]
    pub fn samples(&self) -> &[String] {
        &self.sample_list
    }

    fn store(&mut self, sample_id: &str, handle: CiphertextHandle) {
        if self.counts.insert(sample_id.to_string(), handle).is_none() {
            self.sample_list.push(sample_id.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::FakeCapability;

    #[test]
    fn test_ensure_sample_is_idempotent() {
        let capability = FakeCapability::new();
        let mut ledger = AggregateLedger::new();

        ledger.ensure_sample("S1", &capability).expect("Should ensure");
        let first = ledger.encrypted_count("S1").expect("Should exist");
        ledger.ensure_sample("S1", &capability).expect("Should ensure");

        assert_eq!(ledger.samples(), ["S1".to_string()]);
        assert_eq!(ledger.encrypted_count("S1"), Some(first));
        assert_eq!(capability.reveal_count(&first), Some(0));
    }

    #[test]
    fn test_increment_creates_and_accumulates() {
        let capability = FakeCapability::new();
        let mut ledger = AggregateLedger::new();
        assert!(ledger.encrypted_count("S1").is_none());

        let one = ledger.increment("S1", &capability).expect("Should increment");
        assert_eq!(capability.reveal_count(&one), Some(1));

        ledger.increment("S2", &capability).expect("Should increment");
        let two = ledger.increment("S1", &capability).expect("Should increment");
        assert_eq!(capability.reveal_count(&two), Some(2));

        assert_eq!(ledger.samples(), ["S1".to_string(), "S2".to_string()]);
    }

    #[test]
    fn test_failed_increment_leaves_ledger_unchanged() {
        let capability = FakeCapability::new();
        let mut ledger = AggregateLedger::new();

        capability.fail_additions(true);
        assert!(ledger.increment("S1", &capability).is_err());
        assert!(ledger.encrypted_count("S1").is_none());
        assert!(ledger.samples().is_empty());

        capability.fail_additions(false);
        let handle = ledger.increment("S1", &capability).expect("Should increment");
        assert_eq!(capability.reveal_count(&handle), Some(1));
    }

    #[test]
    fn test_increment_releases_superseded_counts() {
        let capability = FakeCapability::new();
        let mut ledger = AggregateLedger::new();

        ledger.ensure_sample("S1", &capability).expect("Should ensure");
        let zero = ledger.encrypted_count("S1").expect("Should exist");
        let one = ledger.increment("S1", &capability).expect("Should increment");
        let two = ledger.increment("S1", &capability).expect("Should increment");

        assert!(!capability.is_initialized(&zero));
        assert!(!capability.is_initialized(&one));
        assert_eq!(capability.reveal_count(&two), Some(2));
        assert_eq!(capability.live(), 1);

        // Temporaries from a failed increment are released too.
        capability.fail_additions(true);
        assert!(ledger.increment("S2", &capability).is_err());
        assert!(ledger.increment("S1", &capability).is_err());
        assert_eq!(capability.live(), 1);
        assert_eq!(ledger.encrypted_count("S1"), Some(two));
    }

    #[test]
    fn test_find_sample_by_key() {
        let capability = FakeCapability::new();
        let mut ledger = AggregateLedger::new();
        ledger.increment("S1", &capability).expect("Should increment");
        ledger.increment("S2", &capability).expect("Should increment");

        assert_eq!(ledger.find_sample(&SampleKey::for_sample("S2")), Some("S2"));
        assert_eq!(ledger.find_sample(&SampleKey::for_sample("S9")), None);
    }
}
