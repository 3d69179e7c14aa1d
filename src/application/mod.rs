//! Application layer: Use cases and services.
//!
//! This module orchestrates domain logic with ports to implement
//! the record lifecycle, its request tracker, the per-sample aggregate
//! ledger and the persistent ledger mirror.

mod aggregate;
mod lifecycle;
mod mirror;
mod record_store;
mod tracker;

#[cfg(test)]
pub(crate) mod testing;

pub use aggregate::AggregateLedger;
pub use lifecycle::{CallbackOutcome, LifecycleError, RecordLifecycle};
pub use mirror::{LedgerMirror, StoredRecord};
pub use record_store::RecordStore;
pub use tracker::{RequestTracker, TrackerError};
