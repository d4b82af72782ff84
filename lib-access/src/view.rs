//! Staged Access-Group View
//!
//! One view instance exists per chain-state-transition session. All pending
//! mutations accumulate in overlay maps the view owns exclusively; the
//! durable store is read on overlay miss and written only at flush. A
//! tombstoned overlay record masks any durable record under the same key:
//! it reads as absent to callers but stays visible to the flusher, which
//! turns it into a physical delete.
//!
//! The view is single-threaded cooperative: the caller serializes
//! transaction application, and nothing here suspends.

use std::collections::HashMap;

use tracing::info;

use lib_types::{
    AccessGroupKey, Amount, BlockHeight, GroupEnumerationKey, GroupKeyName, GroupMembershipKey,
    MessageKey, PublicKey, TxHash,
};
use lib_utxo::{OutPoint, Utxo, UtxoLedger, UtxoStore};

use crate::entries::{
    AccessGroupEntry, AccessGroupMember, AttributeEntry, MemberAttributeType, MemberRecord,
};
use crate::errors::{RuleError, RuleResult};
use crate::operation::UtxoOperation;
use crate::params::ChainParams;
use crate::storage::{AccessStore, StorageResult};
use crate::transaction::{HolderKey, Transaction};

/// The staged overlay over durable access-group state.
pub struct AccessGroupView<'a> {
    pub(crate) params: ChainParams,
    pub(crate) store: &'a dyn AccessStore,
    pub(crate) ledger: UtxoLedger<'a>,

    // Overlay maps. Exclusively owned; released when the view is dropped
    // or flushed.
    pub(crate) groups: HashMap<AccessGroupKey, AccessGroupEntry>,
    pub(crate) members: HashMap<GroupMembershipKey, MemberRecord>,
    pub(crate) group_attributes: HashMap<AccessGroupKey, HashMap<u16, AttributeEntry>>,
    pub(crate) member_attributes: HashMap<GroupEnumerationKey, HashMap<u16, AttributeEntry>>,
    pub(crate) message_attributes: HashMap<MessageKey, HashMap<u16, AttributeEntry>>,
}

impl<'a> AccessGroupView<'a> {
    pub fn new(
        store: &'a dyn AccessStore,
        utxo_store: &'a dyn UtxoStore,
        params: ChainParams,
    ) -> Self {
        Self {
            params,
            store,
            ledger: UtxoLedger::new(utxo_store),
            groups: HashMap::new(),
            members: HashMap::new(),
            group_attributes: HashMap::new(),
            member_attributes: HashMap::new(),
            message_attributes: HashMap::new(),
        }
    }

    pub fn params(&self) -> &ChainParams {
        &self.params
    }

    /// Read a staged coin output (overlay first, durable store second).
    pub fn get_utxo(&self, outpoint: &OutPoint) -> RuleResult<Option<Utxo>> {
        Ok(self.ledger.get_utxo(outpoint)?)
    }

    // =========================================================================
    // C1: group registry
    // =========================================================================

    /// Resolve a group entry. Base-name keys synthesize the implicit base
    /// group; tombstoned overlay entries read as absent. Durable hits are
    /// cached into the overlay, so a key present in the overlay never hits
    /// the store again.
    pub(crate) fn group_entry(
        &mut self,
        key: &AccessGroupKey,
    ) -> RuleResult<Option<AccessGroupEntry>> {
        if key.group_key_name.is_base() {
            return Ok(Some(AccessGroupEntry::base(key.owner_public_key)));
        }
        if let Some(entry) = self.groups.get(key) {
            if entry.tombstone {
                return Ok(None);
            }
            return Ok(Some(entry.clone()));
        }
        match self.store.get_group_entry(key)? {
            Some(entry) => {
                self.groups.insert(*key, entry.clone());
                Ok(Some(entry))
            }
            None => Ok(None),
        }
    }

    /// Stage a group entry. The owner is passed explicitly because the
    /// primary index is owner-keyed and, after the access-groups fork, the
    /// entry itself no longer carries its members.
    pub(crate) fn set_group(&mut self, owner: PublicKey, entry: AccessGroupEntry) {
        let key = AccessGroupKey::new(owner, entry.group_key_name);
        self.groups.insert(key, entry);
    }

    /// Stage a tombstone copy of `entry`.
    pub(crate) fn delete_group(&mut self, owner: PublicKey, entry: &AccessGroupEntry) {
        let mut tombstone = entry.clone();
        tombstone.tombstone = true;
        self.set_group(owner, tombstone);
    }

    /// Query surface: resolve a group by owner and name.
    pub fn get_group(
        &mut self,
        owner: &PublicKey,
        name: &GroupKeyName,
        _block_height: BlockHeight,
    ) -> RuleResult<Option<AccessGroupEntry>> {
        self.group_entry(&AccessGroupKey::new(*owner, *name))
    }

    /// Every non-tombstoned group in which `user` is owner or member,
    /// including the implicit base group. Overlay wins over the durable
    /// store on conflicting keys.
    pub fn get_all_groups_for_user(
        &mut self,
        user: &PublicKey,
        block_height: BlockHeight,
    ) -> RuleResult<Vec<AccessGroupEntry>> {
        let post_fork = block_height >= self.params.fork_heights.access_groups_block_height;
        let mut found: HashMap<AccessGroupKey, AccessGroupEntry> = HashMap::new();

        let base = AccessGroupEntry::base(*user);
        found.insert(base.key(), base);

        // Overlay pass. Collected up front: membership probes below may
        // fault more records into the overlay.
        let staged: Vec<(AccessGroupKey, AccessGroupEntry)> = self
            .groups
            .iter()
            .filter(|(_, entry)| !entry.tombstone)
            .map(|(key, entry)| (*key, entry.clone()))
            .collect();
        for (key, entry) in staged {
            if key.owner_public_key == *user
                || self.user_is_member(&key, &entry, user, post_fork)?
            {
                found.insert(key, entry);
            }
        }

        // Durable pass. Keys present in the overlay were already decided
        // above, tombstones included.
        for entry in self.store.get_groups_for_user(user)? {
            let key = entry.key();
            if self.groups.contains_key(&key) || found.contains_key(&key) {
                continue;
            }
            if key.owner_public_key == *user
                || self.user_is_member(&key, &entry, user, post_fork)?
            {
                found.insert(key, entry);
            }
        }

        Ok(found.into_values().collect())
    }

    fn user_is_member(
        &mut self,
        key: &AccessGroupKey,
        entry: &AccessGroupEntry,
        user: &PublicKey,
        post_fork: bool,
    ) -> RuleResult<bool> {
        if post_fork {
            let membership =
                GroupMembershipKey::new(key.owner_public_key, key.group_key_name, *user);
            if self.member_entry(&membership)?.is_some() {
                return Ok(true);
            }
        }
        Ok(entry
            .members
            .iter()
            .any(|member| member.member_public_key == *user))
    }

    // =========================================================================
    // C2: membership index
    // =========================================================================

    pub(crate) fn member_entry(
        &mut self,
        key: &GroupMembershipKey,
    ) -> RuleResult<Option<AccessGroupMember>> {
        if let Some(record) = self.members.get(key) {
            if record.tombstone {
                return Ok(None);
            }
            return Ok(Some(record.member.clone()));
        }
        match self.store.get_member(key)? {
            Some(member) => {
                self.members.insert(
                    *key,
                    MemberRecord {
                        member: member.clone(),
                        tombstone: false,
                    },
                );
                Ok(Some(member))
            }
            None => Ok(None),
        }
    }

    pub(crate) fn set_member(&mut self, key: GroupMembershipKey, member: AccessGroupMember) {
        self.members.insert(
            key,
            MemberRecord {
                member,
                tombstone: false,
            },
        );
    }

    pub(crate) fn delete_member(&mut self, key: GroupMembershipKey, member: AccessGroupMember) {
        self.members.insert(
            key,
            MemberRecord {
                member,
                tombstone: true,
            },
        );
    }

    /// Query surface: resolve a membership record.
    pub fn get_member(
        &mut self,
        owner: &PublicKey,
        name: &GroupKeyName,
        member: &PublicKey,
        _block_height: BlockHeight,
    ) -> RuleResult<Option<AccessGroupMember>> {
        self.member_entry(&GroupMembershipKey::new(*owner, *name, *member))
    }

    // =========================================================================
    // C3: attribute indexes
    // =========================================================================

    pub fn get_group_attribute(
        &mut self,
        key: &AccessGroupKey,
        attribute_type: u16,
    ) -> RuleResult<Option<AttributeEntry>> {
        if let Some(entry) = self
            .group_attributes
            .get(key)
            .and_then(|inner| inner.get(&attribute_type))
        {
            if entry.tombstone {
                return Ok(None);
            }
            return Ok(Some(entry.clone()));
        }
        Ok(self.store.get_group_attribute(key, attribute_type)?)
    }

    pub(crate) fn set_group_attribute(
        &mut self,
        key: AccessGroupKey,
        attribute_type: u16,
        entry: AttributeEntry,
    ) {
        self.group_attributes
            .entry(key)
            .or_default()
            .insert(attribute_type, entry);
    }

    pub(crate) fn delete_group_attribute(
        &mut self,
        key: AccessGroupKey,
        attribute_type: u16,
        entry: &AttributeEntry,
    ) {
        let mut tombstone = entry.clone();
        tombstone.tombstone = true;
        self.set_group_attribute(key, attribute_type, tombstone);
    }

    pub fn get_member_attribute(
        &mut self,
        key: &GroupEnumerationKey,
        attribute_type: u16,
    ) -> RuleResult<Option<AttributeEntry>> {
        if let Some(entry) = self
            .member_attributes
            .get(key)
            .and_then(|inner| inner.get(&attribute_type))
        {
            if entry.tombstone {
                return Ok(None);
            }
            return Ok(Some(entry.clone()));
        }
        Ok(self.store.get_member_attribute(key, attribute_type)?)
    }

    pub(crate) fn set_member_attribute(
        &mut self,
        key: GroupEnumerationKey,
        attribute_type: u16,
        entry: AttributeEntry,
    ) {
        self.member_attributes
            .entry(key)
            .or_default()
            .insert(attribute_type, entry);
    }

    pub(crate) fn delete_member_attribute(
        &mut self,
        key: GroupEnumerationKey,
        attribute_type: u16,
        entry: &AttributeEntry,
    ) {
        let mut tombstone = entry.clone();
        tombstone.tombstone = true;
        self.set_member_attribute(key, attribute_type, tombstone);
    }

    pub fn get_message_attribute(
        &mut self,
        key: &MessageKey,
        attribute_type: u16,
    ) -> RuleResult<Option<AttributeEntry>> {
        if let Some(entry) = self
            .message_attributes
            .get(key)
            .and_then(|inner| inner.get(&attribute_type))
        {
            if entry.tombstone {
                return Ok(None);
            }
            return Ok(Some(entry.clone()));
        }
        Ok(self.store.get_message_attribute(key, attribute_type)?)
    }

    /// Message attributes are written by the message subsystem, not by the
    /// transactions in this crate; the setters are public for it.
    pub fn set_message_attribute(
        &mut self,
        key: MessageKey,
        attribute_type: u16,
        entry: AttributeEntry,
    ) {
        self.message_attributes
            .entry(key)
            .or_default()
            .insert(attribute_type, entry);
    }

    pub fn delete_message_attribute(
        &mut self,
        key: MessageKey,
        attribute_type: u16,
        entry: &AttributeEntry,
    ) {
        let mut tombstone = entry.clone();
        tombstone.tombstone = true;
        self.set_message_attribute(key, attribute_type, tombstone);
    }

    /// Query surface: resolve an attribute under either holder shape.
    pub fn get_attribute(
        &mut self,
        holder_key: &HolderKey,
        attribute_type: u16,
    ) -> RuleResult<Option<AttributeEntry>> {
        match holder_key {
            HolderKey::Member(key) => self.get_member_attribute(key, attribute_type),
            HolderKey::Group(key) => self.get_group_attribute(key, attribute_type),
        }
    }

    /// The message-send fast path: mute status without loading the group.
    pub fn is_member_muted(
        &mut self,
        owner: &PublicKey,
        name: &GroupKeyName,
        member: &PublicKey,
    ) -> RuleResult<bool> {
        let key = GroupEnumerationKey::new(*owner, *name, *member);
        let entry = self.get_member_attribute(&key, MemberAttributeType::IsMuted.as_u16())?;
        Ok(entry.is_some_and(|entry| entry.is_set))
    }

    /// Validate an (owner, access key, name) triple against registered
    /// state: the message-send validator entry point.
    pub fn validate_key_and_name_with_view(
        &mut self,
        owner: &PublicKey,
        access_public_key: &PublicKey,
        name: &[u8],
        _block_height: BlockHeight,
    ) -> RuleResult<()> {
        crate::engine::validate_group_public_key_and_name(access_public_key, name)?;
        let key = AccessGroupKey::new(*owner, GroupKeyName::from_wire(name));
        let entry = self.group_entry(&key)?.ok_or(RuleError::GroupDoesntExist)?;
        if entry.access_public_key != *access_public_key {
            return Err(RuleError::PKCannotBeDifferent);
        }
        Ok(())
    }

    // =========================================================================
    // Basic transfer (coin side)
    // =========================================================================

    pub(crate) fn connect_basic_transfer_side(
        &mut self,
        txn: &Transaction,
        tx_hash: TxHash,
        block_height: BlockHeight,
    ) -> RuleResult<(Amount, Amount, Vec<UtxoOperation>)> {
        let (total_input, total_output, transfer) =
            self.ledger
                .connect_transfer(&txn.inputs, &txn.outputs, tx_hash, block_height)?;
        Ok((
            total_input,
            total_output,
            vec![UtxoOperation::BasicTransfer { transfer }],
        ))
    }

    /// Disconnect the coin side, which must be the sole remaining record.
    pub(crate) fn disconnect_basic_transfer_side(
        &mut self,
        mut ops: Vec<UtxoOperation>,
    ) -> RuleResult<()> {
        let op = ops.pop().ok_or_else(|| {
            RuleError::StagingCorrupted("operation log empty at basic-transfer disconnect".into())
        })?;
        match op {
            UtxoOperation::BasicTransfer { transfer } => {
                self.ledger.disconnect_transfer(&transfer)?;
            }
            other => {
                return Err(RuleError::StagingCorrupted(format!(
                    "expected basic-transfer record, found {:?}",
                    other.op_type()
                )));
            }
        }
        if !ops.is_empty() {
            return Err(RuleError::StagingCorrupted(format!(
                "{} unconsumed operation records",
                ops.len()
            )));
        }
        Ok(())
    }

    // =========================================================================
    // Flush
    // =========================================================================

    /// Write the overlay to the durable store and consume the view.
    /// Tombstones become physical deletes; everything else upserts.
    pub fn flush(self) -> StorageResult<()> {
        let mut puts = 0usize;
        let mut deletes = 0usize;

        for (key, entry) in &self.groups {
            if entry.tombstone {
                self.store.delete_group_entry(key)?;
                deletes += 1;
            } else {
                self.store.put_group_entry(key, entry)?;
                puts += 1;
            }
        }
        for (key, record) in &self.members {
            if record.tombstone {
                self.store.delete_member(key)?;
                deletes += 1;
            } else {
                self.store.put_member(key, &record.member)?;
                puts += 1;
            }
        }
        for (key, inner) in &self.group_attributes {
            for (attribute_type, entry) in inner {
                if entry.tombstone {
                    self.store.delete_group_attribute(key, *attribute_type)?;
                    deletes += 1;
                } else {
                    self.store.put_group_attribute(key, *attribute_type, entry)?;
                    puts += 1;
                }
            }
        }
        for (key, inner) in &self.member_attributes {
            for (attribute_type, entry) in inner {
                if entry.tombstone {
                    self.store.delete_member_attribute(key, *attribute_type)?;
                    deletes += 1;
                } else {
                    self.store
                        .put_member_attribute(key, *attribute_type, entry)?;
                    puts += 1;
                }
            }
        }
        for (key, inner) in &self.message_attributes {
            for (attribute_type, entry) in inner {
                if entry.tombstone {
                    self.store.delete_message_attribute(key, *attribute_type)?;
                    deletes += 1;
                } else {
                    self.store
                        .put_message_attribute(key, *attribute_type, entry)?;
                    puts += 1;
                }
            }
        }

        info!(puts, deletes, "flushed staged access-group view");
        Ok(())
    }
}

impl std::fmt::Debug for AccessGroupView<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessGroupView")
            .field("staged_groups", &self.groups.len())
            .field("staged_members", &self.members.len())
            .finish_non_exhaustive()
    }
}
