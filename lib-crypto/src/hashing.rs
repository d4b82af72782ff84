//! Hashing
//!
//! Double SHA-256 is the canonical hash for this subsystem: it feeds the
//! unencrypted-group key derivation and the byte-signature digest. Keep any
//! new consensus-critical commitment on sha256d; mixing hash functions
//! across rule variants breaks derivation reproducibility.

use sha2::{Digest, Sha256};

/// Double SHA-256
pub fn sha256d(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    second.into()
}

/// Single SHA-256
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}
