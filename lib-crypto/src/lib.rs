//! VEIL Cryptography Collaborators
//!
//! Narrow wrappers consumed by the access-group engine: compressed-point
//! validation, the reserved base point, deterministic key derivation for
//! unencrypted groups, double SHA-256, and byte-signature verification.
//! Nothing here holds secret material at rest.

pub mod errors;
pub mod hashing;
pub mod keys;
pub mod verification;

pub use errors::{CryptoError, CryptoResult};
pub use hashing::{sha256, sha256d};
pub use keys::{
    base_point_public_key, derive_public_key, validate_public_key, BASE_POINT_COMPRESSED,
};
pub use verification::{sign_bytes, verify_bytes_signature};
