//! Hashing helpers shared by the identifier types.

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

/// A 32-byte hash value.
pub type Hash256 = [u8; 32];

/// A 20-byte hash value.
pub type Hash160 = [u8; 20];

/// SHA-256 of the input bytes.
#[must_use]
pub fn hash256(data: &[u8]) -> Hash256 {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// RIPEMD-160 of the input bytes.
///
/// Used for node ids, which are the RIPEMD-160 of the SHA-256 of the
/// node's certificate.
#[must_use]
pub fn hash160(data: &[u8]) -> Hash160 {
    let mut hasher = Ripemd160::new();
    hasher.update(data);
    hasher.finalize().into()
}
