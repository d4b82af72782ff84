//! Crypto Errors

use thiserror::Error;

/// Error from curve or signature operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("Public key must be {expected} bytes, got {len}", expected = lib_types::PUBLIC_KEY_LEN)]
    InvalidPublicKeyLength { len: usize },

    #[error("Not a valid compressed secp256k1 point")]
    InvalidPublicKey,

    #[error("Seed is not a valid non-zero curve scalar")]
    InvalidPrivateScalar,

    #[error("Signature is not valid DER")]
    InvalidSignatureEncoding,

    #[error("Signature does not verify against the given key")]
    SignatureMismatch,
}

/// Result type for crypto operations
pub type CryptoResult<T> = Result<T, CryptoError>;
