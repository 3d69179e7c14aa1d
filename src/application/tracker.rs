//! Decryption request tracker: request id → target, write-once.
//!
//! Entries are never removed. Replays of an already-resolved request are
//! rejected by the lifecycle controller through the record's `revealed` flag,
//! because sample-count requests share this map and have no such flag.

use std::collections::HashMap;

use crate::domain::{DecryptionRequest, DecryptionTarget, RequestId};

/// Errors from the request tracker.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrackerError {
    #[error("Request id {0} is already registered")]
    DuplicateRequestId(RequestId),

    #[error("Unknown request {0}")]
    UnknownRequest(RequestId),
}

#[derive(Debug, Default)]
pub struct RequestTracker {
    targets: HashMap<RequestId, DecryptionTarget>,
}

impl RequestTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the target of a freshly issued request.
    ///
    /// # Errors
    /// Returns `TrackerError::DuplicateRequestId` if the id is already known.
    pub fn register(
        &mut self,
        request_id: RequestId,
        target: DecryptionTarget,
    ) -> Result<DecryptionRequest, TrackerError> {
        if self.targets.contains_key(&request_id) {
            return Err(TrackerError::DuplicateRequestId(request_id));
        }
        self.targets.insert(request_id, target);
        Ok(DecryptionRequest { request_id, target })
    }

    /// Look up the target of a request.
    ///
    /// # Errors
    /// Returns `TrackerError::UnknownRequest` if the id was never registered.
    pub fn resolve(&self, request_id: RequestId) -> Result<DecryptionTarget, TrackerError> {
        self.targets
            .get(&request_id)
            .copied()
            .ok_or(TrackerError::UnknownRequest(request_id))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
