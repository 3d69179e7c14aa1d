//! Domain layer: Core record, request and ciphertext types.
//!
//! This module contains plain Rust types with no dependency on the FHE
//! library, the oracle, or storage.

pub mod abi;
mod crypto;
mod record;
mod request;

pub use abi::AbiError;
pub use crypto::{CiphertextHandle, CryptoError};
pub use record::{DecryptedRecord, EncryptedRecord, RecordId, RecordState};
pub use request::{
    CallbackTag, DecryptionRequest, DecryptionTarget, RequestId, SampleCount, SampleKey,
};
