//! Public-Key Validation and Derivation
//!
//! Wrappers over secp256k1 point arithmetic consumed by the access engine.
//! Consensus code treats keys as opaque 33-byte strings; this module is the
//! only place that interprets them as curve points.

use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::ecdsa::SigningKey;

use lib_types::{PublicKey, PUBLIC_KEY_LEN};

use crate::errors::{CryptoError, CryptoResult};

/// The secp256k1 base point G in compressed form.
///
/// Reserved in the access-group data model: groups owned by G are the
/// public, discoverable ("unencrypted") groups.
pub const BASE_POINT_COMPRESSED: [u8; PUBLIC_KEY_LEN] = [
    0x02, 0x79, 0xbe, 0x66, 0x7e, 0xf9, 0xdc, 0xbb, 0xac, 0x55, 0xa0, 0x62, 0x95, 0xce, 0x87,
    0x0b, 0x07, 0x02, 0x9b, 0xfc, 0xdb, 0x2d, 0xce, 0x28, 0xd9, 0x59, 0xf2, 0x81, 0x5b, 0x16,
    0xf8, 0x17, 0x98,
];

/// The base point as a consensus [`PublicKey`]
pub fn base_point_public_key() -> PublicKey {
    PublicKey::new(BASE_POINT_COMPRESSED)
}

/// Validate that `bytes` is a 33-byte compressed secp256k1 point on the curve.
pub fn validate_public_key(bytes: &[u8]) -> CryptoResult<()> {
    if bytes.len() != PUBLIC_KEY_LEN {
        return Err(CryptoError::InvalidPublicKeyLength { len: bytes.len() });
    }
    k256::PublicKey::from_sec1_bytes(bytes).map_err(|_| CryptoError::InvalidPublicKey)?;
    Ok(())
}

/// Derive the public key of the secret scalar given by a 32-byte seed.
///
/// Used for unencrypted groups, where the access key is derived from
/// `sha256d(group key name)` so that anyone can recompute it.
pub fn derive_public_key(seed: &[u8; 32]) -> CryptoResult<PublicKey> {
    let signing_key =
        SigningKey::from_slice(seed).map_err(|_| CryptoError::InvalidPrivateScalar)?;
    let point = signing_key.verifying_key().to_encoded_point(true);
    PublicKey::from_slice(point.as_bytes()).ok_or(CryptoError::InvalidPublicKey)
}
