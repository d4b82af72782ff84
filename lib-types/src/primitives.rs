//! Canonical Primitive Types for VEIL Consensus
//!
//! Rule: No String identifiers in consensus state. Ever.
//!
//! These types are the foundational building blocks for all consensus-critical
//! data structures. They are designed to be:
//! - Fixed-size (no dynamic allocation)
//! - Deterministically serializable
//! - Efficient to copy and compare

use serde::{Deserialize, Serialize};
use serde_big_array::BigArray;
use std::fmt;

// ============================================================================
// TYPE ALIASES
// ============================================================================

/// Block height in the chain (0-indexed)
pub type BlockHeight = u64;

/// Native coin amounts in base units
pub type Amount = u64;

/// Length of a compressed secp256k1 public key
pub const PUBLIC_KEY_LEN: usize = 33;

/// Length of a padded group key name
pub const GROUP_KEY_NAME_LEN: usize = 32;

/// Minimum length of a group key name on the wire
pub const MIN_GROUP_KEY_NAME_LEN: usize = 1;

/// Maximum length of a group key name on the wire
pub const MAX_GROUP_KEY_NAME_LEN: usize = 32;

// ============================================================================
// HASH TYPES
// ============================================================================

/// 32-byte transaction hash
#[derive(Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize, Default)]
pub struct TxHash(pub [u8; 32]);

impl TxHash {
    /// Create a new TxHash from raw bytes
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Create a zeroed TxHash
    pub const fn zero() -> Self {
        Self([0u8; 32])
    }

    /// Get the underlying bytes
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Check if this is the zero hash
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxHash({})", hex::encode(&self.0[..8]))
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl From<[u8; 32]> for TxHash {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for TxHash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

// ============================================================================
// PUBLIC KEY
// ============================================================================

/// 33-byte compressed secp256k1 public key.
///
/// This is the raw wire form; curve-membership validation lives in
/// lib-crypto. Consensus state stores and compares these byte-wise.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct PublicKey(#[serde(with = "BigArray")] pub [u8; PUBLIC_KEY_LEN]);

impl PublicKey {
    /// Create a new PublicKey from raw bytes
    pub const fn new(bytes: [u8; PUBLIC_KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Create a PublicKey from a byte slice, if it has the right length
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != PUBLIC_KEY_LEN {
            return None;
        }
        let mut out = [0u8; PUBLIC_KEY_LEN];
        out.copy_from_slice(bytes);
        Some(Self(out))
    }

    /// Get the underlying bytes
    pub const fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.0
    }

    /// Convert to Vec<u8>
    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }
}

impl Default for PublicKey {
    fn default() -> Self {
        Self([0u8; PUBLIC_KEY_LEN])
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(&self.0[..8]))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl From<[u8; PUBLIC_KEY_LEN]> for PublicKey {
    fn from(bytes: [u8; PUBLIC_KEY_LEN]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for PublicKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

// ============================================================================
// GROUP KEY NAME
// ============================================================================

/// 32-byte group key name, right-padded with zero bytes.
///
/// Names are 1-32 bytes on the wire and always stored in the padded form.
/// The all-zero name is the reserved base name: every owner implicitly owns
/// a group at `(owner, base)` whose access key equals the owner key, and no
/// transaction may create or modify it.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize, Default)]
pub struct GroupKeyName(pub [u8; GROUP_KEY_NAME_LEN]);

impl GroupKeyName {
    /// Create a GroupKeyName from already-padded bytes
    pub const fn new(bytes: [u8; GROUP_KEY_NAME_LEN]) -> Self {
        Self(bytes)
    }

    /// Pad a wire-form name to the fixed 32-byte form.
    ///
    /// Callers must length-validate the wire form first; bytes beyond the
    /// padded width are ignored.
    pub fn from_wire(name: &[u8]) -> Self {
        let mut out = [0u8; GROUP_KEY_NAME_LEN];
        let n = name.len().min(GROUP_KEY_NAME_LEN);
        out[..n].copy_from_slice(&name[..n]);
        Self(out)
    }

    /// The reserved all-zero base name
    pub const fn base() -> Self {
        Self([0u8; GROUP_KEY_NAME_LEN])
    }

    /// The well-known default name, used to key derived-key messaging
    pub fn default_key() -> Self {
        Self::from_wire(b"default-key")
    }

    /// Check whether this is the reserved base name
    pub fn is_base(&self) -> bool {
        self.0 == [0u8; GROUP_KEY_NAME_LEN]
    }

    /// Get the underlying padded bytes
    pub const fn as_bytes(&self) -> &[u8; GROUP_KEY_NAME_LEN] {
        &self.0
    }

    /// Convert to Vec<u8>
    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }
}

impl fmt::Debug for GroupKeyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Names are usually ASCII labels; fall back to hex when they aren't.
        let end = self.0.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
        let trimmed = &self.0[..end];
        if !trimmed.is_empty() && trimmed.iter().all(|b| b.is_ascii_graphic()) {
            write!(f, "GroupKeyName({})", String::from_utf8_lossy(trimmed))
        } else {
            write!(f, "GroupKeyName(0x{})", hex::encode(trimmed))
        }
    }
}

impl From<[u8; GROUP_KEY_NAME_LEN]> for GroupKeyName {
    fn from(bytes: [u8; GROUP_KEY_NAME_LEN]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for GroupKeyName {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

// ============================================================================
// TESTS
// ============================================================================
