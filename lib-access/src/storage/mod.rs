//! Durable Storage Layer
//!
//! The staged view reads through [`AccessStore`] on overlay miss and never
//! writes until flush. Flush is the only writer.
//!
//! # Data Model Invariants
//!
//! 1. **State writes only occur at flush** - connect/disconnect stage
//!    mutations in the view; the store observes them atomically per session.
//! 2. **Key encoding is protocol** - see `keys.rs`. Never inline key
//!    construction in business logic.
//! 3. **Types are canonical** - no ad-hoc types cross the storage boundary;
//!    values are the bincode encoding of the lib-access record types.

pub mod keys;
pub mod memory;
pub mod sled_store;

use thiserror::Error;

use lib_types::{AccessGroupKey, GroupEnumerationKey, GroupMembershipKey, MessageKey, PublicKey};

use crate::entries::{AccessGroupEntry, AccessGroupMember, AttributeEntry};

pub use memory::MemoryStore;
pub use sled_store::SledStore;

/// Infrastructure error from the durable store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage contract of the access subsystem.
///
/// Read methods are consumed by the view on overlay miss; write methods are
/// consumed exclusively by the view's flush. All methods take `&self`:
/// implementations provide their own interior synchronization.
pub trait AccessStore {
    // =========================================================================
    // Reads (view)
    // =========================================================================

    fn get_group_entry(&self, key: &AccessGroupKey) -> StorageResult<Option<AccessGroupEntry>>;

    fn get_member(&self, key: &GroupMembershipKey) -> StorageResult<Option<AccessGroupMember>>;

    /// Every group in which `user` is the owner, an indexed member, or a
    /// legacy embedded member.
    fn get_groups_for_user(&self, user: &PublicKey) -> StorageResult<Vec<AccessGroupEntry>>;

    fn get_group_attribute(
        &self,
        key: &AccessGroupKey,
        attribute_type: u16,
    ) -> StorageResult<Option<AttributeEntry>>;

    fn get_member_attribute(
        &self,
        key: &GroupEnumerationKey,
        attribute_type: u16,
    ) -> StorageResult<Option<AttributeEntry>>;

    fn get_message_attribute(
        &self,
        key: &MessageKey,
        attribute_type: u16,
    ) -> StorageResult<Option<AttributeEntry>>;

    // =========================================================================
    // Writes (flush only)
    // =========================================================================

    fn put_group_entry(
        &self,
        key: &AccessGroupKey,
        entry: &AccessGroupEntry,
    ) -> StorageResult<()>;

    fn delete_group_entry(&self, key: &AccessGroupKey) -> StorageResult<()>;

    fn put_member(
        &self,
        key: &GroupMembershipKey,
        member: &AccessGroupMember,
    ) -> StorageResult<()>;

    fn delete_member(&self, key: &GroupMembershipKey) -> StorageResult<()>;

    fn put_group_attribute(
        &self,
        key: &AccessGroupKey,
        attribute_type: u16,
        entry: &AttributeEntry,
    ) -> StorageResult<()>;

    fn delete_group_attribute(&self, key: &AccessGroupKey, attribute_type: u16)
        -> StorageResult<()>;

    fn put_member_attribute(
        &self,
        key: &GroupEnumerationKey,
        attribute_type: u16,
        entry: &AttributeEntry,
    ) -> StorageResult<()>;

    fn delete_member_attribute(
        &self,
        key: &GroupEnumerationKey,
        attribute_type: u16,
    ) -> StorageResult<()>;

    fn put_message_attribute(
        &self,
        key: &MessageKey,
        attribute_type: u16,
        entry: &AttributeEntry,
    ) -> StorageResult<()>;

    fn delete_message_attribute(&self, key: &MessageKey, attribute_type: u16)
        -> StorageResult<()>;
}
