//! Address and value codec.
//!
//! Translates between the raw encodings the ledger API returns (hex strings
//! of versioned addresses, 32-byte log topics, hex-encoded integers) and the
//! base58check addresses users see, plus the 32-byte ABI words used as
//! contract call arguments.

use once_cell::sync::Lazy;
use sha2::{Digest, Sha256};
use sha3::Keccak256;

use crate::error::CodecError;

/// Length of a bare address payload (no version marker, no checksum)
pub const ADDRESS_LEN: usize = 20;

/// Length of an ABI word / log topic in bytes
pub const WORD_LEN: usize = 32;

/// Length of the base58check checksum suffix
pub const CHECKSUM_LEN: usize = 4;

/// Textual signature of the token Transfer event
pub const TRANSFER_EVENT: &str = "Transfer(address,address,uint256)";

/// keccak-256 of [`TRANSFER_EVENT`] as lowercase hex, without `0x`.
/// Log topic[0] is compared against this string.
pub static TRANSFER_EVENT_SIGNATURE: Lazy<String> =
    Lazy::new(|| hex::encode(Keccak256::digest(TRANSFER_EVENT.as_bytes())));

/// A decoded base58check address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawAddress {
    pub version: u8,
    pub payload: [u8; ADDRESS_LEN],
}

impl RawAddress {
    /// Versioned form: marker byte followed by the 20-byte payload
    pub fn versioned(&self) -> [u8; ADDRESS_LEN + 1] {
        let mut out = [0u8; ADDRESS_LEN + 1];
        out[0] = self.version;
        out[1..].copy_from_slice(&self.payload);
        out
    }

    pub fn to_base58(&self) -> String {
        base58check(&self.versioned())
    }
}

/// First four bytes of SHA-256(SHA-256(bytes))
fn checksum(versioned: &[u8]) -> [u8; CHECKSUM_LEN] {
    let first = Sha256::digest(versioned);
    let second = Sha256::digest(first);
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&second[..CHECKSUM_LEN]);
    out
}

fn base58check(versioned: &[u8]) -> String {
    let mut buf = Vec::with_capacity(versioned.len() + CHECKSUM_LEN);
    buf.extend_from_slice(versioned);
    buf.extend_from_slice(&checksum(versioned));
    bs58::encode(buf).into_string()
}

/// Lowercase a hex string and drop an optional `0x` prefix
pub fn normalize_hex(value: &str) -> String {
    let trimmed = value.trim();
    let stripped = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    stripped.to_ascii_lowercase()
}

fn decode_hex(value: &str) -> Result<Vec<u8>, CodecError> {
    let normalized = normalize_hex(value);
    if normalized.is_empty() {
        return Err(CodecError::Empty);
    }
    hex::decode(&normalized).map_err(|e| CodecError::InvalidHex(format!("{}: {}", value, e)))
}

/// Encode a bare 20-byte payload, prepending the network version marker.
pub fn encode_address(payload: &[u8; ADDRESS_LEN], version: u8) -> String {
    RawAddress {
        version,
        payload: *payload,
    }
    .to_base58()
}

/// Encode bytes that already carry their version marker (21 bytes).
///
/// The marker is kept as given; it is never prepended a second time.
pub fn encode_versioned(versioned: &[u8]) -> Result<String, CodecError> {
    if versioned.len() != ADDRESS_LEN + 1 {
        return Err(CodecError::InvalidLength {
            expected: ADDRESS_LEN + 1,
            got: versioned.len(),
        });
    }
    Ok(base58check(versioned))
}

/// Hex form of a versioned address (as found in transfer contract
/// `owner_address` / `to_address`) to its base58check address.
pub fn decode_versioned_hex(value: &str) -> Result<String, CodecError> {
    let bytes = decode_hex(value)?;
    encode_versioned(&bytes)
}

/// Decode an address from a 32-byte log topic.
///
/// Only the low-order 20 bytes hold the address; the topic carries no
/// version marker, so `version` is prepended before encoding.
pub fn decode_log_topic_address(topic: &str, version: u8) -> Result<String, CodecError> {
    let bytes = decode_hex(topic)?;
    if bytes.len() != WORD_LEN {
        return Err(CodecError::InvalidLength {
            expected: WORD_LEN,
            got: bytes.len(),
        });
    }

    let mut payload = [0u8; ADDRESS_LEN];
    payload.copy_from_slice(&bytes[WORD_LEN - ADDRESS_LEN..]);
    Ok(encode_address(&payload, version))
}

/// Decode a base58check address, verifying length and checksum.
pub fn decode_address(address: &str) -> Result<RawAddress, CodecError> {
    let bytes = bs58::decode(address.trim())
        .into_vec()
        .map_err(|e| CodecError::InvalidBase58(format!("{}: {}", address, e)))?;

    let expected = 1 + ADDRESS_LEN + CHECKSUM_LEN;
    if bytes.len() != expected {
        return Err(CodecError::InvalidLength {
            expected,
            got: bytes.len(),
        });
    }

    let (versioned, sum) = bytes.split_at(1 + ADDRESS_LEN);
    if checksum(versioned) != sum {
        return Err(CodecError::ChecksumMismatch(address.to_string()));
    }

    let mut payload = [0u8; ADDRESS_LEN];
    payload.copy_from_slice(&versioned[1..]);
    Ok(RawAddress {
        version: versioned[0],
        payload,
    })
}

/// ABI word for an address argument: the 20-byte payload (version marker and
/// checksum stripped) left-padded with 12 zero bytes, hex-encoded.
pub fn abi_encode_address(address: &str) -> Result<String, CodecError> {
    let raw = decode_address(address)?;
    let mut word = [0u8; WORD_LEN];
    word[WORD_LEN - ADDRESS_LEN..].copy_from_slice(&raw.payload);
    Ok(hex::encode(word))
}

/// ABI word for an unsigned integer argument (big-endian, zero-padded).
pub fn abi_encode_uint(value: u128) -> String {
    let bytes = value.to_be_bytes();
    let mut word = [0u8; WORD_LEN];
    word[WORD_LEN - bytes.len()..].copy_from_slice(&bytes);
    hex::encode(word)
}

/// Parse a base-16 unsigned integer such as a log `data` field or a
/// constant-call result word.
///
/// Empty input is an error, not zero. Values wider than 128 bits overflow.
pub fn decode_hex_uint(value: &str) -> Result<u128, CodecError> {
    let normalized = normalize_hex(value);
    if normalized.is_empty() {
        return Err(CodecError::Empty);
    }
    if !normalized.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(CodecError::InvalidHex(value.to_string()));
    }

    let significant = normalized.trim_start_matches('0');
    if significant.is_empty() {
        return Ok(0);
    }
    if significant.len() > 32 {
        return Err(CodecError::Overflow(value.to_string()));
    }

    u128::from_str_radix(significant, 16).map_err(|e| CodecError::InvalidHex(format!("{}: {}", value, e)))
}
