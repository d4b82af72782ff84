//! Access-Group State Records
//!
//! The records held by the staged view and the durable store. Tombstone
//! flags are overlay-only sidecars: they are skipped by serialization so
//! the durable byte layout is unaffected by staging concerns.

use serde::{Deserialize, Serialize};

use lib_types::{
    decode_u64, encode_u64, AccessGroupKey, BlockHeight, ExtraData, GroupKeyName, PublicKey,
    MESSAGE_ROTATING_VERSION,
};

use crate::errors::{RuleError, RuleResult};
use crate::params::{migration_triggered, ChainParams};

/// Minimum length of a member's encrypted group key: one private key's worth
/// of ciphertext.
pub const MIN_ENCRYPTED_KEY_LEN: usize = 32;

// =============================================================================
// MEMBERS
// =============================================================================

/// One admitted member of an access group.
///
/// `member_group_key_name` names an access group owned by the member; the
/// group private key is encrypted to that group's access key, which is how
/// derived keys get to read group messages. The admitting group must exist
/// when the member is added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGroupMember {
    pub member_public_key: PublicKey,
    pub member_group_key_name: GroupKeyName,
    pub encrypted_key: Vec<u8>,
    /// Legacy wire flag consumed by the combined mute flow.
    pub is_muted: bool,
}

impl AccessGroupMember {
    pub fn new(
        member_public_key: PublicKey,
        member_group_key_name: GroupKeyName,
        encrypted_key: Vec<u8>,
    ) -> Self {
        Self {
            member_public_key,
            member_group_key_name,
            encrypted_key,
            is_muted: false,
        }
    }
}

/// Overlay record of one member: the member plus the staging tombstone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRecord {
    pub member: AccessGroupMember,
    pub tombstone: bool,
}

// =============================================================================
// GROUP ENTRIES
// =============================================================================

/// One registered access group.
///
/// `members` is the legacy embedded list: it is only populated by
/// transactions connected below the access-groups fork. After the fork,
/// membership lives exclusively in the membership index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGroupEntry {
    pub group_owner_public_key: PublicKey,
    pub access_public_key: PublicKey,
    pub group_key_name: GroupKeyName,
    pub members: Vec<AccessGroupMember>,
    pub extra_data: ExtraData,
    pub block_height_created: BlockHeight,
    /// Overlay-only deletion marker; never persisted.
    #[serde(skip)]
    pub tombstone: bool,
}

impl AccessGroupEntry {
    /// The synthesized base entry: every owner implicitly has a group at
    /// `(owner, base name)` whose access key is the owner key. It is never
    /// materialized as a writable entry.
    pub fn base(owner: PublicKey) -> Self {
        Self {
            group_owner_public_key: owner,
            access_public_key: owner,
            group_key_name: GroupKeyName::base(),
            members: Vec::new(),
            extra_data: ExtraData::new(),
            block_height_created: 0,
            tombstone: false,
        }
    }

    /// The primary index key of this entry
    pub fn key(&self) -> AccessGroupKey {
        AccessGroupKey::new(self.group_owner_public_key, self.group_key_name)
    }

    /// Deep copy through the canonical encoding.
    ///
    /// Operation records own copies made this way so that rollback state is
    /// exactly what the wire would carry, independent of later mutation.
    /// A decode failure here is fatal.
    pub fn deep_copy(&self) -> RuleResult<Self> {
        let bytes = bincode::serialize(self)
            .map_err(|e| RuleError::StagingCorrupted(format!("entry encode: {e}")))?;
        bincode::deserialize(&bytes)
            .map_err(|e| RuleError::StagingCorrupted(format!("entry decode: {e}")))
    }
}

// =============================================================================
// ATTRIBUTES
// =============================================================================

/// A named attribute value on a group, member, or message.
///
/// `is_set = false` is a real, stored state ("explicitly cleared"), distinct
/// from the attribute being absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AttributeEntry {
    pub is_set: bool,
    pub value: Vec<u8>,
    /// Overlay-only deletion marker; never persisted.
    #[serde(skip)]
    pub tombstone: bool,
}

impl AttributeEntry {
    /// An attribute in the set state
    pub fn set(value: Vec<u8>) -> Self {
        Self {
            is_set: true,
            value,
            tombstone: false,
        }
    }

    /// An attribute in the explicitly-cleared state
    pub fn unset(value: Vec<u8>) -> Self {
        Self {
            is_set: false,
            value,
            tombstone: false,
        }
    }
}

/// Attribute types on members. The type space is open (`u16` on the wire);
/// these are the values consensus itself interprets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberAttributeType {
    /// A muted member cannot post into the group until unmuted.
    IsMuted,
}

impl MemberAttributeType {
    pub const fn as_u16(self) -> u16 {
        match self {
            MemberAttributeType::IsMuted => 1,
        }
    }
}

/// Attribute types on messages interpreted by the query surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageAttributeType {
    Read,
    Hidden,
}

impl MessageAttributeType {
    pub const fn as_u16(self) -> u16 {
        match self {
            MessageAttributeType::Read => 1,
            MessageAttributeType::Hidden => 2,
        }
    }
}

// =============================================================================
// ROTATING VERSION
// =============================================================================

/// Read the rotating-version scalar from a group entry's extra-data.
/// Absent, malformed, or pre-migration all read as 0.
pub fn group_rotating_version(
    entry: &AccessGroupEntry,
    height: BlockHeight,
    params: &ChainParams,
) -> u64 {
    if !migration_triggered(height, params.fork_heights.access_groups_migration_height) {
        return 0;
    }
    entry
        .extra_data
        .get(MESSAGE_ROTATING_VERSION)
        .and_then(|bytes| decode_u64(bytes))
        .unwrap_or(0)
}

/// Write the rotating-version scalar into a group entry's extra-data.
/// A no-op before the migration height.
pub fn set_group_rotating_version(
    entry: &mut AccessGroupEntry,
    height: BlockHeight,
    params: &ChainParams,
    version: u64,
) {
    if !migration_triggered(height, params.fork_heights.access_groups_migration_height) {
        return;
    }
    entry
        .extra_data
        .insert(MESSAGE_ROTATING_VERSION.to_string(), encode_u64(version));
}
