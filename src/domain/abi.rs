//! Cleartext codec for oracle callbacks.
//!
//! Cleartexts travel in the Solidity ABI layout:
//! - a tuple of strings is one 32-byte offset word per field (relative to the
//!   start of the tuple), then per field a 32-byte length word and the UTF-8
//!   bytes right-padded with zeros to a word boundary
//! - a `u32` is one 32-byte big-endian word

use thiserror::Error;

const WORD: usize = 32;

/// Errors while decoding ABI cleartexts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AbiError {
    #[error("Payload truncated: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("Offset or length {0} out of range")]
    OutOfRange(usize),

    #[error("Value does not fit in {0} bits")]
    Overflow(u32),

    #[error("Expected {expected} fields, decoded {found}")]
    FieldCount { expected: usize, found: usize },

    #[error("String field {0} is not valid UTF-8")]
    InvalidUtf8(usize),
}

/// Encode a tuple of strings.
#[must_use]
pub fn encode_strings<S: AsRef<str>>(values: &[S]) -> Vec<u8> {
    let head_len = values.len() * WORD;
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();

    for value in values {
        let bytes = value.as_ref().as_bytes();
        head.extend_from_slice(&usize_word(head_len + tail.len()));
        tail.extend_from_slice(&usize_word(bytes.len()));
        tail.extend_from_slice(bytes);
        tail.resize(tail.len() + padding(bytes.len()), 0);
    }

    head.extend_from_slice(&tail);
    head
}

/// Decode a tuple of exactly `N` strings.
///
/// # Errors
/// Returns `AbiError` if the payload is truncated, an offset or length is out
/// of range, or a field is not UTF-8.
pub fn decode_strings<const N: usize>(data: &[u8]) -> Result<[String; N], AbiError> {
    let mut fields = Vec::with_capacity(N);

    for index in 0..N {
        let offset = word_to_usize(read_word(data, index * WORD)?)?;
        let len = word_to_usize(read_word(data, offset)?)?;
        let start = offset.checked_add(WORD).ok_or(AbiError::OutOfRange(offset))?;
        let end = start.checked_add(len).ok_or(AbiError::OutOfRange(len))?;
        let bytes = data.get(start..end).ok_or(AbiError::Truncated {
            needed: end,
            available: data.len(),
        })?;
        let field = String::from_utf8(bytes.to_vec()).map_err(|_| AbiError::InvalidUtf8(index))?;
        fields.push(field);
    }

    <[String; N]>::try_from(fields).map_err(|v| AbiError::FieldCount {
        expected: N,
        found: v.len(),
    })
}

/// Encode a single `u32`.
#[must_use]
pub fn encode_u32(value: u32) -> Vec<u8> {
    let mut word = vec![0u8; WORD];
    word[WORD - 4..].copy_from_slice(&value.to_be_bytes());
    word
}

/// Decode a single `u32`.
///
/// # Errors
/// Returns `AbiError::Truncated` for short input and `AbiError::Overflow` if
/// any of the upper 28 bytes is set.
pub fn decode_u32(data: &[u8]) -> Result<u32, AbiError> {
    let word = read_word(data, 0)?;
    if word[..WORD - 4].iter().any(|&b| b != 0) {
        return Err(AbiError::Overflow(32));
    }
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&word[WORD - 4..]);
    Ok(u32::from_be_bytes(buf))
}

fn padding(len: usize) -> usize {
    (WORD - len % WORD) % WORD
}

fn usize_word(value: usize) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[WORD - 8..].copy_from_slice(&(value as u64).to_be_bytes());
    word
}

fn read_word(data: &[u8], offset: usize) -> Result<&[u8], AbiError> {
    let end = offset
        .checked_add(WORD)
        .ok_or(AbiError::OutOfRange(offset))?;
    data.get(offset..end).ok_or(AbiError::Truncated {
        needed: end,
        available: data.len(),
    })
}

fn word_to_usize(word: &[u8]) -> Result<usize, AbiError> {
    if word[..WORD - 8].iter().any(|&b| b != 0) {
        return Err(AbiError::Overflow(64));
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&word[WORD - 8..]);
    usize::try_from(u64::from_be_bytes(buf)).map_err(|_| AbiError::Overflow(64))
}
