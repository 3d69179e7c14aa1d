//! # Genovault
//!
//! Encrypted genomic-record lifecycle using Fully Homomorphic Encryption.
//!
//! This crate provides:
//! - Submission of encrypted sequence reads with metadata and sample ids
//! - Asynchronous, proof-verified decryption through an external oracle
//! - Per-sample encrypted counts of revealed records
//! - A JSON ledger mirror over SQLite
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture:
//! - `domain`: Core business types (records, requests, ciphertext handles, ABI codec)
//! - `ports`: Trait definitions for external operations
//! - `adapters`: Concrete implementations (tfhe-rs, Ed25519 oracle, SQLite)
//! - `application`: Use cases orchestrating domain and ports
//! - `cli`: The `genovault run` flow

pub mod adapters;
pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod ports;

pub use application::{LifecycleError, RecordLifecycle};
pub use domain::{DecryptedRecord, RecordId, RequestId};

/// Result type for Genovault operations
pub type Result<T> = std::result::Result<T, GenovaultError>;

/// Main error type for Genovault
#[derive(Debug, thiserror::Error)]
pub enum GenovaultError {
    #[error("Record lifecycle error: {0}")]
    Lifecycle(#[from] application::LifecycleError),

    #[error("Cryptographic operation failed: {0}")]
    Crypto(#[from] domain::CryptoError),

    #[error("Decryption oracle error: {0}")]
    Oracle(#[from] ports::OracleError),

    #[error("Storage operation failed: {0}")]
    Storage(#[from] adapters::StorageError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
