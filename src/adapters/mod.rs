//! Adapters layer: Concrete implementations of ports.
//!
//! These modules contain the actual integration with external libraries:
//! - `tfhe`: tfhe-rs for FHE operations
//! - `oracle`: Ed25519-signing decryption oracle
//! - `sqlite`: SQLite for the ledger mirror
//! - `memory`: in-memory ledger store
//! - `sanitize`: sensitive-data filtering for logs

pub mod memory;
pub mod oracle;
pub mod sanitize;
pub mod sqlite;
pub mod tfhe;

// Re-export storage error for lib.rs
pub use sqlite::StorageError;
