//! In-Memory UTXO Store
//!
//! Backing store for tests and light tooling.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::errors::{UtxoError, UtxoResult};
use crate::types::{OutPoint, Utxo, UtxoStore};

/// HashMap-backed [`UtxoStore`]
#[derive(Default)]
pub struct MemoryUtxoStore {
    utxos: RwLock<HashMap<OutPoint, Utxo>>,
}

impl MemoryUtxoStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an output directly into durable state
    pub fn insert(&self, outpoint: OutPoint, utxo: Utxo) {
        if let Ok(mut utxos) = self.utxos.write() {
            utxos.insert(outpoint, utxo);
        }
    }
}

impl UtxoStore for MemoryUtxoStore {
    fn get_utxo(&self, outpoint: &OutPoint) -> UtxoResult<Option<Utxo>> {
        let utxos = self
            .utxos
            .read()
            .map_err(|e| UtxoError::Storage(e.to_string()))?;
        Ok(utxos.get(outpoint).cloned())
    }
}
