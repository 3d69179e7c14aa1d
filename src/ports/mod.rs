//! Ports layer: Trait definitions for external operations.
//!
//! Following Hexagonal Architecture, these traits define the boundaries
//! between the record lifecycle and external systems (FHE library,
//! decryption oracle, key-value ledger).

mod encryption;
mod oracle;
mod storage;

pub use encryption::{EncryptionCapability, PlaintextEncryptor};
pub use oracle::{DecryptionOracle, OracleError, PlaintextDecryptor};
pub use storage::KeyValueStore;
