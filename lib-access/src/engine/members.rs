//! Dedicated Member Transaction
//!
//! Post-fork member management against the membership index. `Add` admits
//! members into an existing group without rewriting its entry; `Remove` is
//! reserved on the wire and always rejected. Removal-like behavior goes
//! through muting: consensus cannot make removed members forget a group
//! private key they already hold.

use std::collections::HashSet;

use tracing::debug;

use lib_crypto::validate_public_key;
use lib_types::{AccessGroupKey, Amount, BlockHeight, GroupKeyName, GroupMembershipKey, TxHash};

use crate::entries::AccessGroupMember;
use crate::errors::{RuleError, RuleResult};
use crate::operation::UtxoOperation;
use crate::transaction::{MemberOperation, Transaction, TxnMeta, TxnType};
use crate::view::AccessGroupView;

use super::validate_group_public_key_and_name;

impl<'a> AccessGroupView<'a> {
    pub fn connect_access_group_members(
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
            TxnMeta::AccessGroupMembers(meta) => meta.clone(),
            other => {
                return Err(RuleError::BadTxnType {
                    expected: TxnType::AccessGroupMembers,
                    actual: other.txn_type(),
                });
            }
        };

        validate_group_public_key_and_name(&meta.access_public_key, &meta.group_key_name)?;
        let padded_name = GroupKeyName::from_wire(&meta.group_key_name);
        if padded_name.is_base() {
            return Err(RuleError::NameCannotBeZeros);
        }
        validate_public_key(txn.public_key.as_bytes()).map_err(RuleError::PublicKeyInvalid)?;
        if meta.access_public_key == txn.public_key {
            return Err(RuleError::PKCannotBeOwnerKey);
        }

        if meta.operation == MemberOperation::Remove {
            return Err(RuleError::NotSupported("member removal"));
        }

        let group_key = AccessGroupKey::new(txn.public_key, padded_name);
        let existing = self
            .group_entry(&group_key)?
            .ok_or(RuleError::GroupDoesntExist)?;
        if existing.access_public_key != meta.access_public_key {
            return Err(RuleError::PKCannotBeDifferent);
        }

        let mut seen = HashSet::new();
        seen.insert(existing.access_public_key);
        let mut additions: Vec<(GroupMembershipKey, Option<AccessGroupMember>, AccessGroupMember)> =
            Vec::new();
        for member in &meta.members {
            self.validate_new_member(member, &mut seen)?;
            let membership = GroupMembershipKey::new(
                group_key.owner_public_key,
                group_key.group_key_name,
                member.member_public_key,
            );
            let prior = self.member_entry(&membership)?;
            if prior.is_some() {
                return Err(RuleError::MemberAlreadyExists(member.member_public_key));
            }
            additions.push((membership, prior, member.clone()));
        }

        let (total_input, total_output, mut ops) =
            self.connect_basic_transfer_side(txn, tx_hash, block_height)?;

        let mut added_members = Vec::with_capacity(additions.len());
        let mut prev_members = Vec::with_capacity(additions.len());
        for (membership, prior, member) in additions {
            added_members.push(membership);
            prev_members.push(prior);
            self.set_member(membership, member);
        }
        debug!(
            group = ?group_key.group_key_name,
            count = added_members.len(),
            "connected member admissions"
        );

        ops.push(UtxoOperation::AccessGroupMembers {
            added_members,
            prev_members,
        });
        Ok((total_input, total_output, ops))
    }

    pub fn disconnect_access_group_members(
        &mut self,
        txn: &Transaction,
        _tx_hash: TxHash,
        mut ops: Vec<UtxoOperation>,
        _block_height: BlockHeight,
    ) -> RuleResult<()> {
        let op = ops.pop().ok_or_else(|| {
            RuleError::StagingCorrupted("operation log empty at member disconnect".into())
        })?;
        let (added_members, prev_members) = match op {
            UtxoOperation::AccessGroupMembers {
                added_members,
                prev_members,
            } => (added_members, prev_members),
            other => {
                return Err(RuleError::StagingCorrupted(format!(
                    "expected member record, found {:?}",
                    other.op_type()
                )));
            }
        };

        let meta = match &txn.meta {
            TxnMeta::AccessGroupMembers(meta) => meta,
            other => {
                return Err(RuleError::BadTxnType {
                    expected: TxnType::AccessGroupMembers,
                    actual: other.txn_type(),
                });
            }
        };
        let group_key =
            AccessGroupKey::new(txn.public_key, GroupKeyName::from_wire(&meta.group_key_name));

        for (membership, prior) in added_members.iter().zip(prev_members.iter()).rev() {
            if membership.owner_public_key != group_key.owner_public_key
                || membership.group_key_name != group_key.group_key_name
            {
                return Err(RuleError::StagingCorrupted(
                    "membership record does not belong to this transaction's group".into(),
                ));
            }
            match self.member_entry(membership)? {
                Some(member) => self.delete_member(*membership, member),
                None => {
                    return Err(RuleError::StagingCorrupted(format!(
                        "admitted member missing at disconnect: {:?}",
                        membership.member_public_key
                    )));
                }
            }
            if let Some(prior) = prior {
                self.set_member(*membership, prior.clone());
            }
        }

        self.disconnect_basic_transfer_side(ops)
    }
}
