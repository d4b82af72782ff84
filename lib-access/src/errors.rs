//! Rule Errors
//!
//! Every consensus rejection is a typed kind; the block processor surfaces
//! the kind for diagnostics and rejects the containing block. None of these
//! are retried. The staging-corruption variants are different in nature:
//! they mean a connect/disconnect invariant has been broken and the view
//! must be discarded, not that a transaction was invalid.

use thiserror::Error;

use lib_crypto::CryptoError;
use lib_types::{BlockHeight, PublicKey};
use lib_utxo::UtxoError;

use crate::storage::StorageError;
use crate::transaction::TxnType;

/// Consensus-rule violation or infrastructure failure during connect/disconnect.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    // =========================================================================
    // Fork gating and framing
    // =========================================================================

    #[error("Transaction at height {block_height} is before its enabling fork height {fork_height}")]
    TooEarly {
        block_height: BlockHeight,
        fork_height: BlockHeight,
    },

    #[error("Wrong transaction type: expected {expected:?}, got {actual:?}")]
    BadTxnType { expected: TxnType, actual: TxnType },

    #[error("Reserved operation: {0}")]
    NotSupported(&'static str),

    // =========================================================================
    // Key and name shape
    // =========================================================================

    #[error("Group key name cannot be the reserved all-zero base name")]
    NameCannotBeZeros,

    #[error("Group key name too short: {len} bytes")]
    NameTooShort { len: usize },

    #[error("Group key name too long: {len} bytes")]
    NameTooLong { len: usize },

    #[error("Invalid public key: {0}")]
    PublicKeyInvalid(CryptoError),

    #[error("Access public key cannot equal the transaction public key")]
    PKCannotBeOwnerKey,

    #[error("Access public key cannot differ from the existing entry")]
    PKCannotBeDifferent,

    // =========================================================================
    // Membership rules
    // =========================================================================

    #[error("Member already exists in group: {0:?}")]
    MemberAlreadyExists(PublicKey),

    #[error("Member's admitting group does not exist: {0:?}")]
    MemberKeyDoesntExist(PublicKey),

    #[error("Member encrypted key too short: {len} bytes, minimum {min}")]
    MemberEncryptedKeyTooShort { len: usize, min: usize },

    #[error("Group does not exist")]
    GroupDoesntExist,

    #[error("Updating an existing group must add at least one member")]
    KeyDoesntAddMembers,

    #[error("Member not in group: {0:?}")]
    MemberNotInGroup(PublicKey),

    // =========================================================================
    // Mute rules
    // =========================================================================

    #[error("Group owner cannot mute themselves")]
    OwnerMutingSelf,

    #[error("Group owner cannot unmute themselves")]
    OwnerUnmutingSelf,

    #[error("Member is already muted: {0:?}")]
    AlreadyMuted(PublicKey),

    #[error("Member is not muted: {0:?}")]
    AlreadyUnmuted(PublicKey),

    // =========================================================================
    // Authorization
    // =========================================================================

    #[error("Group owner signature does not verify")]
    SignatureInvalid,

    #[error("Only the group owner may mutate attributes")]
    OperationDenied,

    #[error("Attribute holder tag does not match the holder key shape")]
    InvalidAttributeHolder,

    // =========================================================================
    // Collaborators and infrastructure
    // =========================================================================

    #[error("Basic transfer failed: {0}")]
    Utxo(#[from] UtxoError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// A connect-time deep copy failed to decode, or a disconnect-time sanity
    /// re-check found state the matching connect could not have produced.
    /// Fatal: discard the view.
    #[error("Corrupt staging: {0}")]
    StagingCorrupted(String),
}

/// Result type for connect/disconnect and view operations
pub type RuleResult<T> = Result<T, RuleError>;

impl From<CryptoError> for RuleError {
    fn from(err: CryptoError) -> Self {
        RuleError::PublicKeyInvalid(err)
    }
}
