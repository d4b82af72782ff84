//! Attribute Transaction
//!
//! Owner-gated named values on groups and members. `Add` over an existing
//! attribute is a value change, not an error; `Remove` stores the
//! explicitly-cleared state rather than deleting, so downstream readers
//! can distinguish "cleared" from "never set".

use tracing::debug;

use lib_crypto::validate_public_key;
use lib_types::{Amount, BlockHeight, TxHash};

use crate::entries::AttributeEntry;
use crate::errors::{RuleError, RuleResult};
use crate::operation::UtxoOperation;
use crate::transaction::{AttributeOperation, HolderKey, Transaction, TxnMeta, TxnType};
use crate::view::AccessGroupView;

impl<'a> AccessGroupView<'a> {
    pub fn connect_access_group_attributes(
        &mut self,
        txn: &Transaction,
        tx_hash: TxHash,
        block_height: BlockHeight,
        _verify_signatures: bool,
    ) -> RuleResult<(Amount, Amount, Vec<UtxoOperation>)> {
        let forks = self.params.fork_heights;
        if block_height < forks.access_groups_block_height {
            return Err(RuleError::TooEarly {
                block_height,
                fork_height: forks.access_groups_block_height,
            });
        }
        let meta = match &txn.meta {
            TxnMeta::AccessGroupAttributes(meta) => meta.clone(),
            other => {
                return Err(RuleError::BadTxnType {
                    expected: TxnType::AccessGroupAttributes,
                    actual: other.txn_type(),
                });
            }
        };

        // The wire carries the holder tag and the key separately; they must
        // agree.
        if meta.holder != meta.holder_key.holder() {
            return Err(RuleError::InvalidAttributeHolder);
        }
        validate_public_key(txn.public_key.as_bytes()).map_err(RuleError::PublicKeyInvalid)?;

        // Only the group owner resolved from inside the holder key may
        // mutate attributes under it.
        if meta.holder_key.owner_public_key() != txn.public_key {
            return Err(RuleError::OperationDenied);
        }

        let group_key = meta.holder_key.group_key();
        if self.group_entry(&group_key)?.is_none() {
            return Err(RuleError::GroupDoesntExist);
        }

        let staged = match meta.operation {
            AttributeOperation::Add => AttributeEntry::set(meta.attribute_value.clone()),
            AttributeOperation::Remove => AttributeEntry::unset(meta.attribute_value.clone()),
        };
        let prev_entry = self.get_attribute(&meta.holder_key, meta.attribute_type)?;

        let (total_input, total_output, mut ops) =
            self.connect_basic_transfer_side(txn, tx_hash, block_height)?;

        match &meta.holder_key {
            HolderKey::Member(key) => {
                self.set_member_attribute(*key, meta.attribute_type, staged);
            }
            HolderKey::Group(key) => {
                self.set_group_attribute(*key, meta.attribute_type, staged);
            }
        }
        debug!(
            attribute_type = meta.attribute_type,
            op = ?meta.operation,
            "connected attribute transaction"
        );

        ops.push(UtxoOperation::AccessGroupAttributes {
            holder_key: meta.holder_key,
            operation: meta.operation,
            attribute_type: meta.attribute_type,
            attribute_value: meta.attribute_value,
            prev_entry,
        });
        Ok((total_input, total_output, ops))
    }

    pub fn disconnect_access_group_attributes(
        &mut self,
        txn: &Transaction,
        _tx_hash: TxHash,
        mut ops: Vec<UtxoOperation>,
        _block_height: BlockHeight,
    ) -> RuleResult<()> {
        let op = ops.pop().ok_or_else(|| {
            RuleError::StagingCorrupted("operation log empty at attribute disconnect".into())
        })?;
        let (holder_key, operation, attribute_type, attribute_value, prev_entry) = match op {
            UtxoOperation::AccessGroupAttributes {
                holder_key,
                operation,
                attribute_type,
                attribute_value,
                prev_entry,
            } => (holder_key, operation, attribute_type, attribute_value, prev_entry),
            other => {
                return Err(RuleError::StagingCorrupted(format!(
                    "expected attribute record, found {:?}",
                    other.op_type()
                )));
            }
        };

        let meta = match &txn.meta {
            TxnMeta::AccessGroupAttributes(meta) => meta,
            other => {
                return Err(RuleError::BadTxnType {
                    expected: TxnType::AccessGroupAttributes,
                    actual: other.txn_type(),
                });
            }
        };
        if meta.holder_key != holder_key || meta.attribute_type != attribute_type {
            return Err(RuleError::StagingCorrupted(
                "operation record does not match the transaction".into(),
            ));
        }

        // The staged attribute must be exactly what connect wrote.
        let staged = self
            .get_attribute(&holder_key, attribute_type)?
            .ok_or_else(|| {
                RuleError::StagingCorrupted("staged attribute missing at disconnect".into())
            })?;
        let expected_is_set = operation == AttributeOperation::Add;
        if staged.is_set != expected_is_set || staged.value != attribute_value {
            return Err(RuleError::StagingCorrupted(
                "staged attribute does not match the operation record".into(),
            ));
        }

        match (&holder_key, prev_entry) {
            (HolderKey::Member(key), Some(prior)) => {
                self.set_member_attribute(*key, attribute_type, prior);
            }
            (HolderKey::Member(key), None) => {
                self.delete_member_attribute(*key, attribute_type, &staged);
            }
            (HolderKey::Group(key), Some(prior)) => {
                self.set_group_attribute(*key, attribute_type, prior);
            }
            (HolderKey::Group(key), None) => {
                self.delete_group_attribute(*key, attribute_type, &staged);
            }
        }

        self.disconnect_basic_transfer_side(ops)
    }
}
