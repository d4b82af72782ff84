//! UTXO Types
//!
//! Core types for the coin side of metadata transactions.

use serde::{Deserialize, Serialize};
use std::fmt;

use lib_types::{Amount, BlockHeight, PublicKey, TxHash};

use crate::errors::UtxoResult;

/// Reference to a specific output in a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    /// Transaction containing this output
    pub tx_hash: TxHash,
    /// Index of the output within the transaction (0-based)
    pub index: u32,
}

impl OutPoint {
    pub const fn new(tx_hash: TxHash, index: u32) -> Self {
        Self { tx_hash, index }
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tx_hash, self.index)
    }
}

/// Unspent transaction output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    /// Amount held by the output
    pub amount: Amount,
    /// Key the output pays to
    pub owner: PublicKey,
    /// Block height when created
    pub created_at: BlockHeight,
}

impl Utxo {
    pub fn new(amount: Amount, owner: PublicKey, created_at: BlockHeight) -> Self {
        Self {
            amount,
            owner,
            created_at,
        }
    }
}

/// Transaction input (reference to the UTXO being spent)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    pub outpoint: OutPoint,
}

impl TxInput {
    pub const fn new(outpoint: OutPoint) -> Self {
        Self { outpoint }
    }
}

/// Transaction output (new UTXO being created)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub amount: Amount,
    pub recipient: PublicKey,
}

/// Read access to durable coin state.
///
/// The ledger overlay reads through this on a miss and never writes;
/// implementations only need point lookups.
pub trait UtxoStore {
    /// Get a UTXO by outpoint
    fn get_utxo(&self, outpoint: &OutPoint) -> UtxoResult<Option<Utxo>>;
}
