//! Ledger Overlay
//!
//! The coin side of every metadata transaction: spend inputs, create
//! outputs, and emit a [`TransferOp`] that the disconnect path replays in
//! reverse. Mutations land in an overlay owned by the ledger; the durable
//! store is only read on overlay miss.
//!
//! # Rules
//!
//! 1. **Inputs must exist**: all referenced UTXOs must be present and unspent
//! 2. **No double spend**: within a transaction and across the session
//! 3. **Implicit fee**: `sum(inputs) - sum(outputs)`; inputs must cover outputs
//! 4. **No mutation on failure**: all writes happen after validation passes

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use lib_types::{Amount, BlockHeight, TxHash};

use crate::errors::{UtxoError, UtxoResult};
use crate::types::{OutPoint, TxInput, TxOutput, Utxo, UtxoStore};

/// Overlay state of a single outpoint
#[derive(Debug, Clone, PartialEq, Eq)]
enum Staged {
    Live(Utxo),
    Spent(Utxo),
}

/// Rollback record of one connected transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferOp {
    /// Outpoints this transfer consumed, in input order
    pub spent: Vec<OutPoint>,
    /// Outpoints this transfer created, in output order
    pub created: Vec<OutPoint>,
}

/// Per-session coin overlay stacked on a durable [`UtxoStore`].
pub struct UtxoLedger<'a> {
    store: &'a dyn UtxoStore,
    overlay: HashMap<OutPoint, Staged>,
}

impl<'a> UtxoLedger<'a> {
    pub fn new(store: &'a dyn UtxoStore) -> Self {
        Self {
            store,
            overlay: HashMap::new(),
        }
    }

    /// Read an outpoint through the overlay. Spent outpoints read as absent.
    pub fn get_utxo(&self, outpoint: &OutPoint) -> UtxoResult<Option<Utxo>> {
        match self.overlay.get(outpoint) {
            Some(Staged::Live(utxo)) => Ok(Some(utxo.clone())),
            Some(Staged::Spent(_)) => Ok(None),
            None => self.store.get_utxo(outpoint),
        }
    }

    /// Connect the coin side of a transaction.
    ///
    /// Returns `(total_input, total_output)` and the rollback record. On any
    /// error the overlay is untouched.
    pub fn connect_transfer(
        &mut self,
        inputs: &[TxInput],
        outputs: &[TxOutput],
        tx_hash: TxHash,
        height: BlockHeight,
    ) -> UtxoResult<(Amount, Amount, TransferOp)> {
        if inputs.is_empty() {
            return Err(UtxoError::EmptyInputs);
        }
        if outputs.is_empty() {
            return Err(UtxoError::EmptyOutputs);
        }

        // No double spend within the transaction.
        let mut seen: HashSet<OutPoint> = HashSet::with_capacity(inputs.len());
        for input in inputs {
            if !seen.insert(input.outpoint) {
                return Err(UtxoError::DuplicateInput(input.outpoint));
            }
        }

        // Resolve every input before mutating anything.
        let mut total_input: Amount = 0;
        let mut resolved: Vec<(OutPoint, Utxo)> = Vec::with_capacity(inputs.len());
        for input in inputs {
            let utxo = match self.overlay.get(&input.outpoint) {
                Some(Staged::Live(utxo)) => utxo.clone(),
                Some(Staged::Spent(_)) => {
                    return Err(UtxoError::AlreadySpent(input.outpoint));
                }
                None => self
                    .store
                    .get_utxo(&input.outpoint)?
                    .ok_or(UtxoError::NotFound(input.outpoint))?,
            };
            total_input = total_input
                .checked_add(utxo.amount)
                .ok_or(UtxoError::Overflow)?;
            resolved.push((input.outpoint, utxo));
        }

        let mut total_output: Amount = 0;
        for output in outputs {
            if output.amount == 0 {
                return Err(UtxoError::ZeroOutput);
            }
            total_output = total_output
                .checked_add(output.amount)
                .ok_or(UtxoError::Overflow)?;
        }

        // The difference is the implicit fee; inputs must cover outputs.
        if total_input < total_output {
            return Err(UtxoError::InsufficientInput {
                have: total_input,
                need: total_output,
            });
        }

        // Validation passed; stage the mutations.
        let mut op = TransferOp {
            spent: Vec::with_capacity(inputs.len()),
            created: Vec::with_capacity(outputs.len()),
        };
        for (outpoint, utxo) in resolved {
            self.overlay.insert(outpoint, Staged::Spent(utxo));
            op.spent.push(outpoint);
        }
        for (index, output) in outputs.iter().enumerate() {
            let outpoint = OutPoint::new(tx_hash, index as u32);
            let utxo = Utxo::new(output.amount, output.recipient, height);
            self.overlay.insert(outpoint, Staged::Live(utxo));
            op.created.push(outpoint);
        }

        Ok((total_input, total_output, op))
    }

    /// Reverse a connected transfer. Any state mismatch means the staging
    /// layer is corrupt and the session must be discarded.
    pub fn disconnect_transfer(&mut self, op: &TransferOp) -> UtxoResult<()> {
        for outpoint in op.created.iter().rev() {
            match self.overlay.remove(outpoint) {
                Some(Staged::Live(_)) => {}
                other => {
                    return Err(UtxoError::CorruptStaging(format!(
                        "created outpoint {outpoint} is {other:?} at disconnect"
                    )));
                }
            }
        }
        for outpoint in op.spent.iter().rev() {
            match self.overlay.get(outpoint) {
                Some(Staged::Spent(utxo)) => {
                    let utxo = utxo.clone();
                    self.overlay.insert(*outpoint, Staged::Live(utxo));
                }
                other => {
                    return Err(UtxoError::CorruptStaging(format!(
                        "spent outpoint {outpoint} is {other:?} at disconnect"
                    )));
                }
            }
        }
        Ok(())
    }
}
