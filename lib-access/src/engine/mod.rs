//! Connect/Disconnect Engine
//!
//! One connect and one disconnect per transaction kind, all with the same
//! shape: gate by fork height, validate metadata, validate against view
//! state, connect the coin side, stage the mutations, and append one
//! operation record carrying the prior state rollback needs.
//!
//! All validation completes before the first mutation: a rejected
//! transaction leaves the view untouched, so there is no partial-failure
//! rollback path.

mod attributes;
mod create_group;
mod members;

use std::collections::HashSet;

use lib_crypto::validate_public_key;
use lib_types::{
    AccessGroupKey, Amount, BlockHeight, PublicKey, TxHash, MAX_GROUP_KEY_NAME_LEN,
    MIN_GROUP_KEY_NAME_LEN,
};

use crate::entries::{AccessGroupMember, MIN_ENCRYPTED_KEY_LEN};
use crate::errors::{RuleError, RuleResult};
use crate::operation::UtxoOperation;
use crate::transaction::{Transaction, TxnType};
use crate::view::AccessGroupView;

/// Check that an access key is a curve point and a name is wire-legal.
pub(crate) fn validate_group_public_key_and_name(
    public_key: &PublicKey,
    name: &[u8],
) -> RuleResult<()> {
    validate_public_key(public_key.as_bytes()).map_err(RuleError::PublicKeyInvalid)?;
    if name.len() < MIN_GROUP_KEY_NAME_LEN {
        return Err(RuleError::NameTooShort { len: name.len() });
    }
    if name.len() > MAX_GROUP_KEY_NAME_LEN {
        return Err(RuleError::NameTooLong { len: name.len() });
    }
    Ok(())
}

impl<'a> AccessGroupView<'a> {
    /// Connect one transaction of any kind.
    pub fn connect_transaction(
        &mut self,
        txn: &Transaction,
        tx_hash: TxHash,
        block_height: BlockHeight,
        verify_signatures: bool,
    ) -> RuleResult<(Amount, Amount, Vec<UtxoOperation>)> {
        match txn.meta.txn_type() {
            TxnType::BasicTransfer => self.connect_basic_transfer_side(txn, tx_hash, block_height),
            TxnType::AccessGroup => {
                self.connect_access_group(txn, tx_hash, block_height, verify_signatures)
            }
            TxnType::AccessGroupMembers => {
                self.connect_access_group_members(txn, tx_hash, block_height, verify_signatures)
            }
            TxnType::AccessGroupAttributes => {
                self.connect_access_group_attributes(txn, tx_hash, block_height, verify_signatures)
            }
        }
    }

    /// Disconnect one transaction of any kind, consuming its operation log.
    pub fn disconnect_transaction(
        &mut self,
        txn: &Transaction,
        tx_hash: TxHash,
        ops: Vec<UtxoOperation>,
        block_height: BlockHeight,
    ) -> RuleResult<()> {
        match txn.meta.txn_type() {
            TxnType::BasicTransfer => self.disconnect_basic_transfer_side(ops),
            TxnType::AccessGroup => {
                self.disconnect_access_group(txn, tx_hash, ops, block_height)
            }
            TxnType::AccessGroupMembers => {
                self.disconnect_access_group_members(txn, tx_hash, ops, block_height)
            }
            TxnType::AccessGroupAttributes => {
                self.disconnect_access_group_attributes(txn, tx_hash, ops, block_height)
            }
        }
    }

    /// Shared per-member admission checks: ciphertext floor, key shape,
    /// admitting-group existence, and in-transaction uniqueness. `seen`
    /// starts out holding every key the member may not collide with.
    pub(crate) fn validate_new_member(
        &mut self,
        member: &AccessGroupMember,
        seen: &mut HashSet<PublicKey>,
    ) -> RuleResult<()> {
        // The ciphertext must hold at least one private key's worth of
        // bytes; unencrypted-group self-admits pad with zeros.
        if member.encrypted_key.len() < MIN_ENCRYPTED_KEY_LEN {
            return Err(RuleError::MemberEncryptedKeyTooShort {
                len: member.encrypted_key.len(),
                min: MIN_ENCRYPTED_KEY_LEN,
            });
        }
        validate_group_public_key_and_name(
            &member.member_public_key,
            member.member_group_key_name.as_bytes(),
        )?;

        // The admitting chain of encryption: the group the member's key is
        // encrypted to must itself be registered and live.
        let admitting = AccessGroupKey::new(
            member.member_public_key,
            member.member_group_key_name,
        );
        if self.group_entry(&admitting)?.is_none() {
            return Err(RuleError::MemberKeyDoesntExist(member.member_public_key));
        }

        if !seen.insert(member.member_public_key) {
            return Err(RuleError::MemberAlreadyExists(member.member_public_key));
        }
        Ok(())
    }
}
