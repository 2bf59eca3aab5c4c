//! Cryptographic primitives for ProvChain
//!
//! Block content hashes are SHA-256 over a length-prefixed encoding of the
//! block fields. Every field is preceded by its length as a little-endian
//! `u64`, so no choice of payload bytes can make two different
//! `(previous_hash, payload)` pairs serialize to the same byte string.

use crate::error::ChainError;
use sha2::{Digest, Sha256};

/// A 32-byte SHA-256 digest.
pub type Sha256Hash = [u8; 32];

/// `previous_hash` of the genesis block. Never the output of a real digest.
pub const GENESIS_PREVIOUS_HASH: Sha256Hash = [0u8; 32];

/// Domain tag mixed into every block hash.
pub const BLOCK_DOMAIN_TAG: &[u8] = b"provchain.block.v1";

/// Plain SHA-256 of arbitrary bytes.
pub fn sha256(data: &[u8]) -> Sha256Hash {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Length-prefixed concatenation of `fields`.
///
/// The field count is written first, then each field as `len (u64 LE) || bytes`.
pub fn encode_fields(fields: &[&[u8]]) -> Vec<u8> {
    let total: usize = fields.iter().map(|f| f.len() + 8).sum();
    let mut out = Vec::with_capacity(8 + total);
    out.extend_from_slice(&(fields.len() as u64).to_le_bytes());
    for field in fields {
        out.extend_from_slice(&(field.len() as u64).to_le_bytes());
        out.extend_from_slice(field);
    }
    out
}

/// Canonical encoding of a block's hashed fields.
pub fn encode_block_fields(previous_hash: &Sha256Hash, payload: &[u8]) -> Vec<u8> {
    encode_fields(&[BLOCK_DOMAIN_TAG, previous_hash, payload])
}

/// Content hash of a block: `SHA-256(encode(previous_hash, payload))`.
pub fn block_digest(previous_hash: &Sha256Hash, payload: &[u8]) -> Sha256Hash {
    // Streams the same bytes as `encode_block_fields` without the intermediate buffer.
    let mut hasher = Sha256::new();
    hasher.update(3u64.to_le_bytes());
    for field in [BLOCK_DOMAIN_TAG, previous_hash.as_slice(), payload] {
        hasher.update((field.len() as u64).to_le_bytes());
        hasher.update(field);
    }
    hasher.finalize().into()
}

/// Convert a hash to a hex string for display.
pub fn hash_to_hex(hash: &Sha256Hash) -> String {
    hex::encode(hash)
}

/// First `n` hex characters of a hash, for compact tables.
pub fn short_hex(hash: &Sha256Hash, n: usize) -> String {
    let full = hex::encode(hash);
    full[..n.min(full.len())].to_string()
}

/// Convert a hex string to a hash.
pub fn hash_from_hex(hex_str: &str) -> Result<Sha256Hash, ChainError> {
    let bytes = hex::decode(hex_str.trim())
        .map_err(|e| ChainError::InvalidHash(format!("Invalid hex digest: {}", e)))?;
    if bytes.len() != 32 {
        return Err(ChainError::InvalidHash(format!(
            "Digest must be 32 bytes, got {}",
            bytes.len()
        )));
    }
    bytes
        .try_into()
        .map_err(|_| ChainError::InvalidHash("Failed to convert bytes into digest".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_digest_matches_encoding() {
        let prev = sha256(b"previous");
        let payload = b"Nike,Free Runners,12";
        assert_eq!(
            block_digest(&prev, payload),
            sha256(&encode_block_fields(&prev, payload))
        );
    }

    #[test]
    fn test_encode_fields_is_injective_across_splits() {
        // Same concatenated bytes, different field boundaries.
        let a = encode_fields(&[b"ab", b"c"]);
        let b = encode_fields(&[b"a", b"bc"]);
        let c = encode_fields(&[b"abc"]);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(b, c);
    }

    #[test]
    fn test_encode_fields_with_embedded_length_prefix() {
        // A payload that contains what looks like a length prefix and a second field.
        let mut forged = Vec::new();
        forged.extend_from_slice(b"x");
        forged.extend_from_slice(&1u64.to_le_bytes());
        forged.extend_from_slice(b"y");
        let honest = encode_fields(&[b"x", b"y"]);
        let tricky = encode_fields(&[&forged]);
        assert_ne!(honest, tricky);
    }

    #[test]
    fn test_hex_roundtrip_and_errors() {
        let h = sha256(b"abc");
        assert_eq!(hash_from_hex(&hash_to_hex(&h)).unwrap(), h);
        assert!(matches!(hash_from_hex("zz"), Err(ChainError::InvalidHash(_))));
        assert!(matches!(hash_from_hex("abcd"), Err(ChainError::InvalidHash(_))));
    }

    #[test]
    fn test_short_hex() {
        let h = [0xffu8; 32];
        assert_eq!(short_hex(&h, 8), "ffffffff");
        assert_eq!(short_hex(&h, 100).len(), 64);
    }
}
