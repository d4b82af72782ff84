//! In-Memory Store
//!
//! HashMap-backed [`AccessStore`] for tests and light tooling. Semantics
//! must stay equivalent to the sled backend; the view cannot tell them
//! apart.

use std::collections::HashMap;
use std::sync::RwLock;

use lib_types::{AccessGroupKey, GroupEnumerationKey, GroupMembershipKey, MessageKey, PublicKey};

use crate::entries::{AccessGroupEntry, AccessGroupMember, AttributeEntry};

use super::{keys, AccessStore, StorageError, StorageResult};

#[derive(Default)]
struct Inner {
    groups: HashMap<AccessGroupKey, AccessGroupEntry>,
    members: HashMap<GroupMembershipKey, AccessGroupMember>,
    group_attributes: HashMap<(AccessGroupKey, u16), AttributeEntry>,
    member_attributes: HashMap<(GroupEnumerationKey, u16), AttributeEntry>,
    message_attributes: HashMap<(MessageKey, u16), AttributeEntry>,
}

/// HashMap-backed [`AccessStore`]
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StorageResult<std::sync::RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|e| StorageError::Database(e.to_string()))
    }

    fn write(&self) -> StorageResult<std::sync::RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|e| StorageError::Database(e.to_string()))
    }

    /// Deterministic byte dump of the entire store: rows sorted under their
    /// protocol key encoding. Lets callers assert state equality through
    /// the canonical encoding rather than map iteration order.
    pub fn canonical_dump(&self) -> StorageResult<Vec<u8>> {
        fn encode<T: serde::Serialize>(value: &T) -> StorageResult<Vec<u8>> {
            bincode::serialize(value).map_err(|e| StorageError::Serialization(e.to_string()))
        }
        fn row(table: u8, key: &[u8], value: Vec<u8>) -> (Vec<u8>, Vec<u8>) {
            let mut tagged = Vec::with_capacity(1 + key.len());
            tagged.push(table);
            tagged.extend_from_slice(key);
            (tagged, value)
        }

        let inner = self.read()?;
        let mut rows: Vec<(Vec<u8>, Vec<u8>)> = Vec::new();
        for (key, entry) in &inner.groups {
            rows.push(row(1, &keys::group_key(key), encode(entry)?));
        }
        for (key, member) in &inner.members {
            rows.push(row(2, &keys::member_key(key), encode(member)?));
        }
        for ((key, attribute_type), entry) in &inner.group_attributes {
            rows.push(row(3, &keys::group_attribute_key(key, *attribute_type), encode(entry)?));
        }
        for ((key, attribute_type), entry) in &inner.member_attributes {
            rows.push(row(4, &keys::member_attribute_key(key, *attribute_type), encode(entry)?));
        }
        for ((key, attribute_type), entry) in &inner.message_attributes {
            rows.push(row(5, &keys::message_attribute_key(key, *attribute_type), encode(entry)?));
        }
        rows.sort();
        encode(&rows)
    }
}

impl AccessStore for MemoryStore {
    fn get_group_entry(&self, key: &AccessGroupKey) -> StorageResult<Option<AccessGroupEntry>> {
        Ok(self.read()?.groups.get(key).cloned())
    }

    fn get_member(&self, key: &GroupMembershipKey) -> StorageResult<Option<AccessGroupMember>> {
        Ok(self.read()?.members.get(key).cloned())
    }

    fn get_groups_for_user(&self, user: &PublicKey) -> StorageResult<Vec<AccessGroupEntry>> {
        let inner = self.read()?;
        let mut found: HashMap<AccessGroupKey, AccessGroupEntry> = HashMap::new();

        for (key, entry) in &inner.groups {
            let owned = key.owner_public_key == *user;
            let embedded = entry
                .members
                .iter()
                .any(|member| member.member_public_key == *user);
            if owned || embedded {
                found.insert(*key, entry.clone());
            }
        }

        for key in inner.members.keys() {
            if key.member_public_key != *user {
                continue;
            }
            let group_key = key.group_key();
            if let Some(entry) = inner.groups.get(&group_key) {
                found.insert(group_key, entry.clone());
            }
        }

        Ok(found.into_values().collect())
    }

    fn get_group_attribute(
        &self,
        key: &AccessGroupKey,
        attribute_type: u16,
    ) -> StorageResult<Option<AttributeEntry>> {
        Ok(self.read()?.group_attributes.get(&(*key, attribute_type)).cloned())
    }

    fn get_member_attribute(
        &self,
        key: &GroupEnumerationKey,
        attribute_type: u16,
    ) -> StorageResult<Option<AttributeEntry>> {
        Ok(self
            .read()?
            .member_attributes
            .get(&(*key, attribute_type))
            .cloned())
    }

    fn get_message_attribute(
        &self,
        key: &MessageKey,
        attribute_type: u16,
    ) -> StorageResult<Option<AttributeEntry>> {
        Ok(self
            .read()?
            .message_attributes
            .get(&(*key, attribute_type))
            .cloned())
    }

    fn put_group_entry(
        &self,
        key: &AccessGroupKey,
        entry: &AccessGroupEntry,
    ) -> StorageResult<()> {
        self.write()?.groups.insert(*key, entry.clone());
        Ok(())
    }

    fn delete_group_entry(&self, key: &AccessGroupKey) -> StorageResult<()> {
        self.write()?.groups.remove(key);
        Ok(())
    }

    fn put_member(
        &self,
        key: &GroupMembershipKey,
        member: &AccessGroupMember,
    ) -> StorageResult<()> {
        self.write()?.members.insert(*key, member.clone());
        Ok(())
    }

    fn delete_member(&self, key: &GroupMembershipKey) -> StorageResult<()> {
        self.write()?.members.remove(key);
        Ok(())
    }

    fn put_group_attribute(
        &self,
        key: &AccessGroupKey,
        attribute_type: u16,
        entry: &AttributeEntry,
    ) -> StorageResult<()> {
        self.write()?
            .group_attributes
            .insert((*key, attribute_type), entry.clone());
        Ok(())
    }

    fn delete_group_attribute(
        &self,
        key: &AccessGroupKey,
        attribute_type: u16,
    ) -> StorageResult<()> {
        self.write()?.group_attributes.remove(&(*key, attribute_type));
        Ok(())
    }

    fn put_member_attribute(
        &self,
        key: &GroupEnumerationKey,
        attribute_type: u16,
        entry: &AttributeEntry,
    ) -> StorageResult<()> {
        self.write()?
            .member_attributes
            .insert((*key, attribute_type), entry.clone());
        Ok(())
    }

    fn delete_member_attribute(
        &self,
        key: &GroupEnumerationKey,
        attribute_type: u16,
    ) -> StorageResult<()> {
        self.write()?.member_attributes.remove(&(*key, attribute_type));
        Ok(())
    }

    fn put_message_attribute(
        &self,
        key: &MessageKey,
        attribute_type: u16,
        entry: &AttributeEntry,
    ) -> StorageResult<()> {
        self.write()?
            .message_attributes
            .insert((*key, attribute_type), entry.clone());
        Ok(())
    }

    fn delete_message_attribute(&self, key: &MessageKey, attribute_type: u16) -> StorageResult<()> {
        self.write()?.message_attributes.remove(&(*key, attribute_type));
        Ok(())
    }
}
