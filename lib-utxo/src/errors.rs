//! UTXO Errors

use thiserror::Error;

use lib_types::Amount;

use crate::types::OutPoint;

/// Error during UTXO operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UtxoError {
    #[error("UTXO not found: {0}")]
    NotFound(OutPoint),

    #[error("UTXO already spent: {0}")]
    AlreadySpent(OutPoint),

    #[error("Duplicate input: {0}")]
    DuplicateInput(OutPoint),

    #[error("Insufficient input value: have {have}, need {need}")]
    InsufficientInput { have: Amount, need: Amount },

    #[error("Output amount cannot be zero")]
    ZeroOutput,

    #[error("Empty inputs")]
    EmptyInputs,

    #[error("Empty outputs")]
    EmptyOutputs,

    #[error("Arithmetic overflow")]
    Overflow,

    #[error("Storage error: {0}")]
    Storage(String),

    /// Disconnect found overlay state that connect could not have produced.
    /// The view must be discarded.
    #[error("Corrupt coin staging: {0}")]
    CorruptStaging(String),
}

/// Result type for UTXO operations
pub type UtxoResult<T> = Result<T, UtxoError>;
