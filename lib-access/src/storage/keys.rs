//! Key Encoding Helpers
//!
//! Key encoding is PROTOCOL. These functions define the canonical byte
//! layout for all storage keys. Never inline key construction in business
//! logic.
//!
//! # Key Design Principles
//!
//! 1. **Deterministic** - Same input always produces same key
//! 2. **Sortable** - Composite keys group under useful prefixes
//! 3. **Fixed-width fields** - No delimiters needed
//!
//! # Format Conventions
//!
//! - Public keys are raw 33 bytes, group key names raw padded 32 bytes
//! - Attribute types are big-endian u16 suffixes
//! - Variable-shape keys (message keys) carry a leading tag byte

use lib_types::{
    AccessGroupKey, GroupEnumerationKey, GroupKeyName, GroupMembershipKey, MessageKey, PublicKey,
};

/// owner (33) + name (32)
pub const GROUP_KEY_LEN: usize = 65;

/// owner (33) + name (32) + member (33)
pub const MEMBER_KEY_LEN: usize = 98;

// =============================================================================
// GROUP KEYS
// =============================================================================

/// Key for the groups tree: owner (33) + name (32) → entry bytes
#[inline]
pub fn group_key(key: &AccessGroupKey) -> [u8; GROUP_KEY_LEN] {
    let mut out = [0u8; GROUP_KEY_LEN];
    out[..33].copy_from_slice(key.owner_public_key.as_bytes());
    out[33..].copy_from_slice(key.group_key_name.as_bytes());
    out
}

/// Parse an [`AccessGroupKey`] from a groups-tree key
#[inline]
pub fn parse_group_key(bytes: &[u8]) -> Option<AccessGroupKey> {
    if bytes.len() != GROUP_KEY_LEN {
        return None;
    }
    let owner = PublicKey::from_slice(&bytes[..33])?;
    let mut name = [0u8; 32];
    name.copy_from_slice(&bytes[33..]);
    Some(AccessGroupKey::new(owner, GroupKeyName::new(name)))
}

/// Prefix for scanning all groups owned by one key
#[inline]
pub fn groups_by_owner_prefix(owner: &PublicKey) -> [u8; 33] {
    *owner.as_bytes()
}

// =============================================================================
// MEMBER KEYS
// =============================================================================

/// Key for the members tree: owner (33) + name (32) + member (33) → member bytes
#[inline]
pub fn member_key(key: &GroupMembershipKey) -> [u8; MEMBER_KEY_LEN] {
    let mut out = [0u8; MEMBER_KEY_LEN];
    out[..33].copy_from_slice(key.owner_public_key.as_bytes());
    out[33..65].copy_from_slice(key.group_key_name.as_bytes());
    out[65..].copy_from_slice(key.member_public_key.as_bytes());
    out
}

/// Key for the by-member index: member (33) + owner (33) + name (32) → group key bytes
///
/// Inverts the members tree so that "which groups admit this key" is a
/// prefix scan instead of a full walk.
#[inline]
pub fn membership_by_member_key(key: &GroupMembershipKey) -> [u8; MEMBER_KEY_LEN] {
    let mut out = [0u8; MEMBER_KEY_LEN];
    out[..33].copy_from_slice(key.member_public_key.as_bytes());
    out[33..66].copy_from_slice(key.owner_public_key.as_bytes());
    out[66..].copy_from_slice(key.group_key_name.as_bytes());
    out
}

/// Prefix for scanning all memberships of one key
#[inline]
pub fn membership_by_member_prefix(member: &PublicKey) -> [u8; 33] {
    *member.as_bytes()
}

// =============================================================================
// ATTRIBUTE KEYS
// =============================================================================

/// Key for the group-attributes tree: group key (65) + type (2 BE)
#[inline]
pub fn group_attribute_key(key: &AccessGroupKey, attribute_type: u16) -> [u8; 67] {
    let mut out = [0u8; 67];
    out[..65].copy_from_slice(&group_key(key));
    out[65..].copy_from_slice(&attribute_type.to_be_bytes());
    out
}

/// Key for the member-attributes tree: owner (33) + name (32) + member (33) + type (2 BE)
#[inline]
pub fn member_attribute_key(key: &GroupEnumerationKey, attribute_type: u16) -> [u8; 100] {
    let mut out = [0u8; 100];
    out[..33].copy_from_slice(key.owner_public_key.as_bytes());
    out[33..65].copy_from_slice(key.group_key_name.as_bytes());
    out[65..98].copy_from_slice(key.member_public_key.as_bytes());
    out[98..].copy_from_slice(&attribute_type.to_be_bytes());
    out
}

/// Leading tag of a DM message-attribute key
const MESSAGE_TAG_DM: u8 = 0x01;
/// Leading tag of a group-chat message-attribute key
const MESSAGE_TAG_GROUP_CHAT: u8 = 0x02;

/// Key for the message-attributes tree. Layout by tag:
///
/// - DM:         0x01 + sender group (65) + recipient group (65) + ts (8 BE) + type (2 BE)
/// - Group chat: 0x02 + group (65) + ts (8 BE) + type (2 BE)
pub fn message_attribute_key(key: &MessageKey, attribute_type: u16) -> Vec<u8> {
    let mut out = Vec::with_capacity(141);
    match key {
        MessageKey::Dm(dm) => {
            out.push(MESSAGE_TAG_DM);
            out.extend_from_slice(&group_key(&dm.sender_group));
            out.extend_from_slice(&group_key(&dm.recipient_group));
            out.extend_from_slice(&dm.timestamp_nanos.to_be_bytes());
        }
        MessageKey::GroupChat(chat) => {
            out.push(MESSAGE_TAG_GROUP_CHAT);
            out.extend_from_slice(&group_key(&chat.group));
            out.extend_from_slice(&chat.timestamp_nanos.to_be_bytes());
        }
    }
    out.extend_from_slice(&attribute_type.to_be_bytes());
    out
}

// =============================================================================
// TESTS
// =============================================================================
