//! Legacy Combined Group Transaction
//!
//! `CreateAccessGroup` registers a group, admits members, and (after the
//! access-groups fork) mutes or unmutes them, all under one transaction
//! kind. Below the fork only the AddMembers form exists; membership is
//! stored embedded in the entry there, and in the membership index
//! afterwards.

use std::collections::HashSet;

use tracing::debug;

use lib_crypto::{base_point_public_key, derive_public_key, sha256d, verify_bytes_signature};
use lib_types::{
    AccessGroupKey, Amount, BlockHeight, ExtraData, GroupEnumerationKey, GroupKeyName,
    GroupMembershipKey, TxHash,
};

use crate::entries::{
    AccessGroupEntry, AccessGroupMember, AttributeEntry, MemberAttributeType,
};
use crate::errors::{RuleError, RuleResult};
use crate::operation::UtxoOperation;
use crate::transaction::{AccessGroupOperation, Transaction, TxnMeta, TxnType};
use crate::view::AccessGroupView;

use super::validate_group_public_key_and_name;

impl<'a> AccessGroupView<'a> {
    pub fn connect_access_group(
        &mut self,
        txn: &Transaction,
        tx_hash: TxHash,
        block_height: BlockHeight,
        verify_signatures: bool,
    ) -> RuleResult<(Amount, Amount, Vec<UtxoOperation>)> {
        let forks = self.params.fork_heights;
        if block_height < forks.v3_messages_block_height {
            return Err(RuleError::TooEarly {
                block_height,
                fork_height: forks.v3_messages_block_height,
            });
        }
        let meta = match &txn.meta {
            TxnMeta::AccessGroup(meta) => meta.clone(),
            other => {
                return Err(RuleError::BadTxnType {
                    expected: TxnType::AccessGroup,
                    actual: other.txn_type(),
                });
            }
        };

        // Metadata well-formedness.
        validate_group_public_key_and_name(&meta.access_public_key, &meta.group_key_name)?;
        let padded_name = GroupKeyName::from_wire(&meta.group_key_name);
        if padded_name.is_base() {
            return Err(RuleError::NameCannotBeZeros);
        }
        lib_crypto::validate_public_key(txn.public_key.as_bytes())
            .map_err(RuleError::PublicKeyInvalid)?;
        if meta.access_public_key == txn.public_key {
            return Err(RuleError::PKCannotBeOwnerKey);
        }

        // Below the access-groups fork, a default-name registration must be
        // authorized by the owner key: sig(access key || wire name). The
        // constraint is dropped at the fork.
        if verify_signatures
            && block_height < forks.access_groups_block_height
            && padded_name == GroupKeyName::default_key()
        {
            let mut message = meta.access_public_key.to_vec();
            message.extend_from_slice(&meta.group_key_name);
            verify_bytes_signature(
                txn.public_key.as_bytes(),
                &message,
                &meta.group_owner_signature,
            )
            .map_err(|_| RuleError::SignatureInvalid)?;
        }

        // Unencrypted groups: supplying the curve base point as the access
        // key registers the group under the base point itself, with an
        // access key anyone can re-derive from the name. That is what makes
        // these groups publicly discoverable and readable.
        let (group_key, access_public_key) = if meta.access_public_key == base_point_public_key() {
            let derived = derive_public_key(&sha256d(padded_name.as_bytes()))?;
            (
                AccessGroupKey::new(base_point_public_key(), padded_name),
                derived,
            )
        } else {
            (
                AccessGroupKey::new(txn.public_key, padded_name),
                meta.access_public_key,
            )
        };

        let existing = self.group_entry(&group_key)?;
        if let Some(existing) = &existing {
            if existing.access_public_key != access_public_key {
                return Err(RuleError::PKCannotBeDifferent);
            }
        }

        // The dedicated operation tags only exist on the wire from the
        // access-groups fork onward; before it every transaction is an
        // AddMembers and anything else is malformed.
        let operation = if block_height < forks.access_groups_block_height {
            if meta.operation != AccessGroupOperation::AddMembers {
                return Err(RuleError::NotSupported(
                    "group operations other than member addition before the access-groups fork",
                ));
            }
            AccessGroupOperation::AddMembers
        } else {
            meta.operation
        };

        let mut embedded_members: Vec<AccessGroupMember> = Vec::new();
        let mut added_members: Vec<(GroupMembershipKey, AccessGroupMember)> = Vec::new();
        // (key, type, staged entry, prior entry)
        let mut attribute_writes: Vec<(GroupEnumerationKey, u16, AttributeEntry, Option<AttributeEntry>)> =
            Vec::new();

        match operation {
            AccessGroupOperation::AddMembers => {
                let mut seen: HashSet<lib_types::PublicKey> = HashSet::new();
                // The group's own access key can never be admitted.
                seen.insert(access_public_key);

                if block_height < forks.access_groups_block_height {
                    // Embedded storage era. Updating an existing group must
                    // admit somebody, and may not touch existing members.
                    if let Some(existing) = &existing {
                        if meta.members.is_empty() {
                            return Err(RuleError::KeyDoesntAddMembers);
                        }
                        for member in &existing.members {
                            if !seen.insert(member.member_public_key) {
                                return Err(RuleError::MemberAlreadyExists(
                                    member.member_public_key,
                                ));
                            }
                            embedded_members.push(member.clone());
                        }
                    }
                    for member in &meta.members {
                        self.validate_new_member(member, &mut seen)?;
                        embedded_members.push(member.clone());
                    }
                } else {
                    // Membership-index era: the entry's embedded list is
                    // frozen and admissions land in the index.
                    if let Some(existing) = &existing {
                        embedded_members = existing.members.clone();
                    }
                    for member in &meta.members {
                        self.validate_new_member(member, &mut seen)?;
                        let membership = GroupMembershipKey::new(
                            group_key.owner_public_key,
                            group_key.group_key_name,
                            member.member_public_key,
                        );
                        if self.member_entry(&membership)?.is_some() {
                            return Err(RuleError::MemberAlreadyExists(
                                member.member_public_key,
                            ));
                        }
                        added_members.push((membership, member.clone()));
                    }
                }
            }

            AccessGroupOperation::MuteMembers => {
                // Muting assumes the group was already created. A muted
                // member can still read past and future messages; they just
                // cannot post until unmuted.
                let existing_entry = existing.as_ref().ok_or(RuleError::GroupDoesntExist)?;
                embedded_members = existing_entry.members.clone();

                for target in &meta.members {
                    // Legacy wire flag must be false going in.
                    if target.is_muted {
                        return Err(RuleError::AlreadyMuted(target.member_public_key));
                    }
                    if target.member_public_key == existing_entry.group_owner_public_key {
                        return Err(RuleError::OwnerMutingSelf);
                    }
                    let membership = GroupMembershipKey::new(
                        group_key.owner_public_key,
                        group_key.group_key_name,
                        target.member_public_key,
                    );
                    if self.member_entry(&membership)?.is_none() {
                        return Err(RuleError::MemberNotInGroup(target.member_public_key));
                    }
                    let enum_key = GroupEnumerationKey::new(
                        group_key.owner_public_key,
                        group_key.group_key_name,
                        target.member_public_key,
                    );
                    let attribute_type = MemberAttributeType::IsMuted.as_u16();
                    let prior = self.get_member_attribute(&enum_key, attribute_type)?;
                    if prior.as_ref().is_some_and(|entry| entry.is_set) {
                        return Err(RuleError::AlreadyMuted(target.member_public_key));
                    }
                    attribute_writes.push((
                        enum_key,
                        attribute_type,
                        AttributeEntry::set(Vec::new()),
                        prior,
                    ));
                }
            }

            AccessGroupOperation::UnmuteMembers => {
                let existing_entry = existing.as_ref().ok_or(RuleError::GroupDoesntExist)?;
                embedded_members = existing_entry.members.clone();

                for target in &meta.members {
                    let membership = GroupMembershipKey::new(
                        group_key.owner_public_key,
                        group_key.group_key_name,
                        target.member_public_key,
                    );
                    if self.member_entry(&membership)?.is_none() {
                        return Err(RuleError::MemberNotInGroup(target.member_public_key));
                    }
                    // The owner is never muted in the first place.
                    if target.member_public_key == existing_entry.group_owner_public_key {
                        return Err(RuleError::OwnerUnmutingSelf);
                    }
                    let enum_key = GroupEnumerationKey::new(
                        group_key.owner_public_key,
                        group_key.group_key_name,
                        target.member_public_key,
                    );
                    let attribute_type = MemberAttributeType::IsMuted.as_u16();
                    let prior = self.get_member_attribute(&enum_key, attribute_type)?;
                    if !prior.as_ref().is_some_and(|entry| entry.is_set) {
                        return Err(RuleError::AlreadyUnmuted(target.member_public_key));
                    }
                    attribute_writes.push((
                        enum_key,
                        attribute_type,
                        AttributeEntry::unset(Vec::new()),
                        prior,
                    ));
                }
            }

            AccessGroupOperation::RemoveMembers => {
                return Err(RuleError::NotSupported(
                    "member removal via the combined group transaction",
                ));
            }
        }

        let extra_data = if block_height >= forks.extra_data_on_entries_block_height {
            let existing_extra = existing.as_ref().map(|entry| &entry.extra_data);
            lib_types::merge_extra_data(existing_extra, &txn.extra_data)
        } else {
            ExtraData::new()
        };

        let block_height_created = existing
            .as_ref()
            .map(|entry| entry.block_height_created)
            .unwrap_or(block_height);

        // The operation record owns a deep copy of the prior entry; a
        // decode failure here is fatal.
        let prev_entry = match &existing {
            Some(entry) => Some(entry.deep_copy()?),
            None => None,
        };

        // All validation passed. Coin side first, then the staged writes.
        let (total_input, total_output, mut ops) =
            self.connect_basic_transfer_side(txn, tx_hash, block_height)?;

        for (enum_key, attribute_type, entry, _) in &attribute_writes {
            self.set_member_attribute(*enum_key, *attribute_type, entry.clone());
        }
        let mut added_keys = Vec::with_capacity(added_members.len());
        for (membership, member) in added_members {
            added_keys.push(membership);
            self.set_member(membership, member);
        }
        let new_entry = AccessGroupEntry {
            group_owner_public_key: group_key.owner_public_key,
            access_public_key,
            group_key_name: padded_name,
            members: embedded_members,
            extra_data,
            block_height_created,
            tombstone: false,
        };
        debug!(
            group = ?group_key.group_key_name,
            op = ?operation,
            "connected access-group transaction"
        );
        self.set_group(group_key.owner_public_key, new_entry);

        ops.push(UtxoOperation::AccessGroup {
            prev_entry,
            added_members: added_keys,
            prev_member_attrs: attribute_writes
                .into_iter()
                .map(|(key, attribute_type, _, prior)| (key, attribute_type, prior))
                .collect(),
        });
        Ok((total_input, total_output, ops))
    }

    pub fn disconnect_access_group(
        &mut self,
        txn: &Transaction,
        _tx_hash: TxHash,
        mut ops: Vec<UtxoOperation>,
        _block_height: BlockHeight,
    ) -> RuleResult<()> {
        let op = ops.pop().ok_or_else(|| {
            RuleError::StagingCorrupted("operation log empty at access-group disconnect".into())
        })?;
        let (prev_entry, added_members, prev_member_attrs) = match op {
            UtxoOperation::AccessGroup {
                prev_entry,
                added_members,
                prev_member_attrs,
            } => (prev_entry, added_members, prev_member_attrs),
            other => {
                return Err(RuleError::StagingCorrupted(format!(
                    "expected access-group record, found {:?}",
                    other.op_type()
                )));
            }
        };

        let meta = match &txn.meta {
            TxnMeta::AccessGroup(meta) => meta,
            other => {
                return Err(RuleError::BadTxnType {
                    expected: TxnType::AccessGroup,
                    actual: other.txn_type(),
                });
            }
        };
        validate_group_public_key_and_name(&meta.access_public_key, &meta.group_key_name)?;
        let padded_name = GroupKeyName::from_wire(&meta.group_key_name);
        let group_key = if meta.access_public_key == base_point_public_key() {
            AccessGroupKey::new(base_point_public_key(), padded_name)
        } else {
            AccessGroupKey::new(txn.public_key, padded_name)
        };

        // The staged entry must be exactly what connect produced.
        let current = self.group_entry(&group_key)?.ok_or_else(|| {
            RuleError::StagingCorrupted(format!(
                "no live entry for {:?} at disconnect",
                group_key.group_key_name
            ))
        })?;
        if let Some(prev) = &prev_entry {
            if current.access_public_key != prev.access_public_key
                || current.group_owner_public_key != prev.group_owner_public_key
                || current.group_key_name != prev.group_key_name
            {
                return Err(RuleError::StagingCorrupted(
                    "staged entry does not match the operation record".into(),
                ));
            }
        }

        // Undo membership-index admissions, newest first.
        for membership in added_members.iter().rev() {
            match self.member_entry(membership)? {
                Some(member) => self.delete_member(*membership, member),
                None => {
                    return Err(RuleError::StagingCorrupted(format!(
                        "admitted member missing at disconnect: {:?}",
                        membership.member_public_key
                    )));
                }
            }
        }

        // Undo mute/unmute attribute writes, newest first. The staged
        // attribute must be exactly what the connect-time write produced:
        // a set entry for Mute, a cleared one for Unmute, empty value in
        // both cases.
        if !prev_member_attrs.is_empty() {
            let expected_is_set = match meta.operation {
                AccessGroupOperation::MuteMembers => true,
                AccessGroupOperation::UnmuteMembers => false,
                _ => {
                    return Err(RuleError::StagingCorrupted(
                        "attribute rollback state on a non-mute operation".into(),
                    ));
                }
            };
            for (enum_key, attribute_type, prior) in prev_member_attrs.iter().rev() {
                let staged = self
                    .get_member_attribute(enum_key, *attribute_type)?
                    .ok_or_else(|| {
                        RuleError::StagingCorrupted(
                            "staged attribute missing at disconnect".into(),
                        )
                    })?;
                if staged.is_set != expected_is_set || !staged.value.is_empty() {
                    return Err(RuleError::StagingCorrupted(
                        "staged attribute does not match the operation record".into(),
                    ));
                }
                match prior {
                    Some(entry) => {
                        self.set_member_attribute(*enum_key, *attribute_type, entry.clone());
                    }
                    None => {
                        self.delete_member_attribute(*enum_key, *attribute_type, &staged);
                    }
                }
            }
        }

        // Tombstone the staged entry and write back the prior one, if any.
        self.delete_group(group_key.owner_public_key, &current);
        if let Some(prev) = prev_entry {
            self.set_group(group_key.owner_public_key, prev);
        }

        self.disconnect_basic_transfer_side(ops)
    }
}
