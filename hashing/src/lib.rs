//! SHA-256 of fixed-size values as they are hashed in the beacon chain.
//!
//! Integers are hashed in their little-endian encoding.

use ethereum_types::H256;
use sha2::{Digest as _, Sha256};

#[inline]
#[must_use]
pub fn hash_64(value: u64) -> H256 {
    hash_bytes(value.to_le_bytes())
}

#[inline]
#[must_use]
pub fn hash_256(bytes: H256) -> H256 {
    hash_bytes(bytes)
}

/// Hashes a `u64` padded to 32 bytes, the way 32 byte roots are derived from integers.
#[inline]
#[must_use]
pub fn hash_64_padded_to_256(value: u64) -> H256 {
    let mut bytes = H256::zero();
    bytes[..size_of::<u64>()].copy_from_slice(&value.to_le_bytes());
    hash_256(bytes)
}

#[must_use]
pub fn hash_bytes(bytes: impl AsRef<[u8]>) -> H256 {
    H256(Sha256::digest(bytes).into())
}
