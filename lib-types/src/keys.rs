//! Composite Index Keys
//!
//! Every map in the staged view and every durable-store table is keyed by
//! one of these composites. Equality is byte-wise over all fields; no key
//! contains variable-length data.

use serde::{Deserialize, Serialize};

use crate::primitives::{GroupKeyName, PublicKey};

/// Primary key of an access group: `(owner, group key name)`.
///
/// Groups are indexed by the owner's signing key, not the access key the
/// group encrypts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccessGroupKey {
    pub owner_public_key: PublicKey,
    pub group_key_name: GroupKeyName,
}

impl AccessGroupKey {
    pub const fn new(owner_public_key: PublicKey, group_key_name: GroupKeyName) -> Self {
        Self {
            owner_public_key,
            group_key_name,
        }
    }
}

/// Key of the membership index: `(owner, group key name, member)`.
///
/// The inverse mapping that answers "is this key a member of that group"
/// without loading the full group entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupMembershipKey {
    pub owner_public_key: PublicKey,
    pub group_key_name: GroupKeyName,
    pub member_public_key: PublicKey,
}

impl GroupMembershipKey {
    pub const fn new(
        owner_public_key: PublicKey,
        group_key_name: GroupKeyName,
        member_public_key: PublicKey,
    ) -> Self {
        Self {
            owner_public_key,
            group_key_name,
            member_public_key,
        }
    }

    /// The group this membership record belongs to
    pub const fn group_key(&self) -> AccessGroupKey {
        AccessGroupKey::new(self.owner_public_key, self.group_key_name)
    }
}

/// Key of the per-member attribute map. Same shape as [`GroupMembershipKey`]
/// but a distinct type: the two indexes evolve independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupEnumerationKey {
    pub owner_public_key: PublicKey,
    pub group_key_name: GroupKeyName,
    pub member_public_key: PublicKey,
}

impl GroupEnumerationKey {
    pub const fn new(
        owner_public_key: PublicKey,
        group_key_name: GroupKeyName,
        member_public_key: PublicKey,
    ) -> Self {
        Self {
            owner_public_key,
            group_key_name,
            member_public_key,
        }
    }
}

/// Key of a direct message: the two party groups plus a timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DmMessageKey {
    pub sender_group: AccessGroupKey,
    pub recipient_group: AccessGroupKey,
    pub timestamp_nanos: u64,
}

/// Key of a group-chat message: the group plus a timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupChatMessageKey {
    pub group: AccessGroupKey,
    pub timestamp_nanos: u64,
}

/// Either kind of message key; per-message attributes are stored under this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKey {
    Dm(DmMessageKey),
    GroupChat(GroupChatMessageKey),
}
