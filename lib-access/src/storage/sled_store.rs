//! Sled-Based AccessStore Implementation
//!
//! The default persistent backend. Do not rely on sled-specific features
//! beyond basic KV; the view only needs point reads and the two prefix
//! scans used by user enumeration.

use std::path::Path;

use sled::{Db, Tree};
use tracing::debug;

use lib_types::{AccessGroupKey, GroupEnumerationKey, GroupMembershipKey, MessageKey, PublicKey};

use crate::entries::{AccessGroupEntry, AccessGroupMember, AttributeEntry};

use super::{keys, AccessStore, StorageError, StorageResult};

// =============================================================================
// TREE NAMES (FIXED - DO NOT CHANGE)
// =============================================================================
// These names are protocol. Changing them breaks migrations.
// =============================================================================

const TREE_GROUPS: &str = "access_groups";
const TREE_MEMBERS: &str = "group_members";
const TREE_MEMBERSHIPS_BY_MEMBER: &str = "group_memberships_by_member";
const TREE_GROUP_ATTRIBUTES: &str = "group_entry_attributes";
const TREE_MEMBER_ATTRIBUTES: &str = "group_member_attributes";
const TREE_MESSAGE_ATTRIBUTES: &str = "message_attributes";

/// Sled-backed [`AccessStore`]
pub struct SledStore {
    _db: Db,
    groups: Tree,
    members: Tree,
    memberships_by_member: Tree,
    group_attributes: Tree,
    member_attributes: Tree,
    message_attributes: Tree,
}

fn db_err(e: sled::Error) -> StorageError {
    StorageError::Database(e.to_string())
}

fn serialize<T: serde::Serialize>(value: &T) -> StorageResult<Vec<u8>> {
    bincode::serialize(value).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn deserialize<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> StorageResult<T> {
    bincode::deserialize(bytes).map_err(|e| StorageError::Serialization(e.to_string()))
}

impl SledStore {
    /// Open or create a store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let db = sled::open(path).map_err(db_err)?;
        Self::with_db(db)
    }

    /// Open an ephemeral store backed by a temp dir. For tests.
    pub fn temporary() -> StorageResult<Self> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(db_err)?;
        Self::with_db(db)
    }

    fn with_db(db: Db) -> StorageResult<Self> {
        let groups = db.open_tree(TREE_GROUPS).map_err(db_err)?;
        let members = db.open_tree(TREE_MEMBERS).map_err(db_err)?;
        let memberships_by_member =
            db.open_tree(TREE_MEMBERSHIPS_BY_MEMBER).map_err(db_err)?;
        let group_attributes = db.open_tree(TREE_GROUP_ATTRIBUTES).map_err(db_err)?;
        let member_attributes = db.open_tree(TREE_MEMBER_ATTRIBUTES).map_err(db_err)?;
        let message_attributes = db.open_tree(TREE_MESSAGE_ATTRIBUTES).map_err(db_err)?;
        debug!("opened access store with {} groups", groups.len());
        Ok(Self {
            _db: db,
            groups,
            members,
            memberships_by_member,
            group_attributes,
            member_attributes,
            message_attributes,
        })
    }

    /// Maintain the by-member index rows for a legacy embedded member list.
    fn index_embedded_members(
        &self,
        key: &AccessGroupKey,
        entry: &AccessGroupEntry,
        insert: bool,
    ) -> StorageResult<()> {
        for member in &entry.members {
            let membership = GroupMembershipKey::new(
                key.owner_public_key,
                key.group_key_name,
                member.member_public_key,
            );
            let index_key = keys::membership_by_member_key(&membership);
            if insert {
                self.memberships_by_member
                    .insert(&index_key, &keys::group_key(key)[..])
                    .map_err(db_err)?;
            } else {
                self.memberships_by_member
                    .remove(&index_key)
                    .map_err(db_err)?;
            }
        }
        Ok(())
    }

    fn load_group_by_raw_key(&self, raw: &[u8]) -> StorageResult<Option<AccessGroupEntry>> {
        match self.groups.get(raw).map_err(db_err)? {
            Some(bytes) => Ok(Some(deserialize(&bytes)?)),
            None => Ok(None),
        }
    }
}

impl AccessStore for SledStore {
    fn get_group_entry(&self, key: &AccessGroupKey) -> StorageResult<Option<AccessGroupEntry>> {
        self.load_group_by_raw_key(&keys::group_key(key))
    }

    fn get_member(&self, key: &GroupMembershipKey) -> StorageResult<Option<AccessGroupMember>> {
        match self.members.get(keys::member_key(key)).map_err(db_err)? {
            Some(bytes) => Ok(Some(deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    fn get_groups_for_user(&self, user: &PublicKey) -> StorageResult<Vec<AccessGroupEntry>> {
        let mut found: Vec<(Vec<u8>, AccessGroupEntry)> = Vec::new();
        let mut seen: std::collections::HashSet<Vec<u8>> = std::collections::HashSet::new();

        // Groups the user owns.
        for item in self.groups.scan_prefix(keys::groups_by_owner_prefix(user)) {
            let (raw_key, bytes) = item.map_err(db_err)?;
            if seen.insert(raw_key.to_vec()) {
                found.push((raw_key.to_vec(), deserialize(&bytes)?));
            }
        }

        // Groups that admit the user, via the by-member index.
        for item in self
            .memberships_by_member
            .scan_prefix(keys::membership_by_member_prefix(user))
        {
            let (_, group_key_bytes) = item.map_err(db_err)?;
            if !seen.insert(group_key_bytes.to_vec()) {
                continue;
            }
            if let Some(entry) = self.load_group_by_raw_key(&group_key_bytes)? {
                found.push((group_key_bytes.to_vec(), entry));
            }
        }

        Ok(found.into_iter().map(|(_, entry)| entry).collect())
    }

    fn get_group_attribute(
        &self,
        key: &AccessGroupKey,
        attribute_type: u16,
    ) -> StorageResult<Option<AttributeEntry>> {
        match self
            .group_attributes
            .get(keys::group_attribute_key(key, attribute_type))
            .map_err(db_err)?
        {
            Some(bytes) => Ok(Some(deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    fn get_member_attribute(
        &self,
        key: &GroupEnumerationKey,
        attribute_type: u16,
    ) -> StorageResult<Option<AttributeEntry>> {
        match self
            .member_attributes
            .get(keys::member_attribute_key(key, attribute_type))
            .map_err(db_err)?
        {
            Some(bytes) => Ok(Some(deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    fn get_message_attribute(
        &self,
        key: &MessageKey,
        attribute_type: u16,
    ) -> StorageResult<Option<AttributeEntry>> {
        match self
            .message_attributes
            .get(keys::message_attribute_key(key, attribute_type))
            .map_err(db_err)?
        {
            Some(bytes) => Ok(Some(deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_group_entry(
        &self,
        key: &AccessGroupKey,
        entry: &AccessGroupEntry,
    ) -> StorageResult<()> {
        // Drop index rows of any embedded list being replaced.
        if let Some(old) = self.get_group_entry(key)? {
            self.index_embedded_members(key, &old, false)?;
        }
        self.groups
            .insert(keys::group_key(key), serialize(entry)?)
            .map_err(db_err)?;
        self.index_embedded_members(key, entry, true)
    }

    fn delete_group_entry(&self, key: &AccessGroupKey) -> StorageResult<()> {
        if let Some(old) = self.get_group_entry(key)? {
            self.index_embedded_members(key, &old, false)?;
        }
        self.groups.remove(keys::group_key(key)).map_err(db_err)?;
        Ok(())
    }

    fn put_member(
        &self,
        key: &GroupMembershipKey,
        member: &AccessGroupMember,
    ) -> StorageResult<()> {
        self.members
            .insert(keys::member_key(key), serialize(member)?)
            .map_err(db_err)?;
        self.memberships_by_member
            .insert(
                keys::membership_by_member_key(key),
                &keys::group_key(&key.group_key())[..],
            )
            .map_err(db_err)?;
        Ok(())
    }

    fn delete_member(&self, key: &GroupMembershipKey) -> StorageResult<()> {
        self.members.remove(keys::member_key(key)).map_err(db_err)?;
        self.memberships_by_member
            .remove(keys::membership_by_member_key(key))
            .map_err(db_err)?;
        Ok(())
    }

    fn put_group_attribute(
        &self,
        key: &AccessGroupKey,
        attribute_type: u16,
        entry: &AttributeEntry,
    ) -> StorageResult<()> {
        self.group_attributes
            .insert(keys::group_attribute_key(key, attribute_type), serialize(entry)?)
            .map_err(db_err)?;
        Ok(())
    }

    fn delete_group_attribute(
        &self,
        key: &AccessGroupKey,
        attribute_type: u16,
    ) -> StorageResult<()> {
        self.group_attributes
            .remove(keys::group_attribute_key(key, attribute_type))
            .map_err(db_err)?;
        Ok(())
    }

    fn put_member_attribute(
        &self,
        key: &GroupEnumerationKey,
        attribute_type: u16,
        entry: &AttributeEntry,
    ) -> StorageResult<()> {
        self.member_attributes
            .insert(
                keys::member_attribute_key(key, attribute_type),
                serialize(entry)?,
            )
            .map_err(db_err)?;
        Ok(())
    }

    fn delete_member_attribute(
        &self,
        key: &GroupEnumerationKey,
        attribute_type: u16,
    ) -> StorageResult<()> {
        self.member_attributes
            .remove(keys::member_attribute_key(key, attribute_type))
            .map_err(db_err)?;
        Ok(())
    }

    fn put_message_attribute(
        &self,
        key: &MessageKey,
        attribute_type: u16,
        entry: &AttributeEntry,
    ) -> StorageResult<()> {
        self.message_attributes
            .insert(
                keys::message_attribute_key(key, attribute_type),
                serialize(entry)?,
            )
            .map_err(db_err)?;
        Ok(())
    }

    fn delete_message_attribute(&self, key: &MessageKey, attribute_type: u16) -> StorageResult<()> {
        self.message_attributes
            .remove(keys::message_attribute_key(key, attribute_type))
            .map_err(db_err)?;
        Ok(())
    }
}
