//! Byte-Signature Verification
//!
//! ECDSA over secp256k1, DER-encoded signatures, sha256d message digest.
//! The access engine uses this for exactly one rule: pre-fork default-name
//! group registration must be authorized by the owner key.

use k256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};

use crate::errors::{CryptoError, CryptoResult};
use crate::hashing::sha256d;

/// Verify a DER-encoded ECDSA signature over `sha256d(message)`.
pub fn verify_bytes_signature(
    public_key: &[u8],
    message: &[u8],
    signature: &[u8],
) -> CryptoResult<()> {
    let verifying_key =
        VerifyingKey::from_sec1_bytes(public_key).map_err(|_| CryptoError::InvalidPublicKey)?;
    let signature =
        Signature::from_der(signature).map_err(|_| CryptoError::InvalidSignatureEncoding)?;
    let digest = sha256d(message);
    verifying_key
        .verify_prehash(&digest, &signature)
        .map_err(|_| CryptoError::SignatureMismatch)
}

/// Produce a DER-encoded ECDSA signature over `sha256d(message)`.
pub fn sign_bytes(secret_key: &[u8; 32], message: &[u8]) -> CryptoResult<Vec<u8>> {
    let signing_key =
        SigningKey::from_slice(secret_key).map_err(|_| CryptoError::InvalidPrivateScalar)?;
    let digest = sha256d(message);
    let signature: Signature = signing_key
        .sign_prehash(&digest)
        .map_err(|_| CryptoError::SignatureMismatch)?;
    Ok(signature.to_der().as_bytes().to_vec())
}
