//! Transaction Metadata
//!
//! One tagged union per the redesign of the original's runtime
//! type-switching: the engine matches on [`TxnMeta`] and never downcasts.
//! Wire decoding of these shapes belongs to the codec layer, not here.

use serde::{Deserialize, Serialize};

use lib_types::{AccessGroupKey, ExtraData, GroupEnumerationKey, PublicKey};
use lib_utxo::{TxInput, TxOutput};

/// Transaction kind tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxnType {
    /// Plain coin transfer with no metadata
    BasicTransfer,
    /// Legacy combined group transaction: create, add members, mute, unmute
    AccessGroup,
    /// Dedicated post-fork member management
    AccessGroupMembers,
    /// Named attributes on groups and members
    AccessGroupAttributes,
}

impl TxnType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            TxnType::BasicTransfer => "basic_transfer",
            TxnType::AccessGroup => "access_group",
            TxnType::AccessGroupMembers => "access_group_members",
            TxnType::AccessGroupAttributes => "access_group_attributes",
        }
    }
}

/// Sub-operation of the legacy combined group transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessGroupOperation {
    AddMembers,
    MuteMembers,
    UnmuteMembers,
    /// Reserved; always rejected.
    RemoveMembers,
}

/// Sub-operation of the dedicated member transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberOperation {
    Add,
    /// Reserved; always rejected.
    Remove,
}

/// Sub-operation of the attribute transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeOperation {
    Add,
    Remove,
}

/// Wire tag naming which shape the attribute holder key must have
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeHolder {
    Member,
    Group,
}

/// The key an attribute hangs off of
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HolderKey {
    Member(GroupEnumerationKey),
    Group(AccessGroupKey),
}

impl HolderKey {
    /// The tag this key shape corresponds to
    pub const fn holder(&self) -> AttributeHolder {
        match self {
            HolderKey::Member(_) => AttributeHolder::Member,
            HolderKey::Group(_) => AttributeHolder::Group,
        }
    }

    /// The group owner resolved from inside the key
    pub const fn owner_public_key(&self) -> PublicKey {
        match self {
            HolderKey::Member(key) => key.owner_public_key,
            HolderKey::Group(key) => key.owner_public_key,
        }
    }

    /// The group this attribute's holder belongs to
    pub const fn group_key(&self) -> AccessGroupKey {
        match self {
            HolderKey::Member(key) => {
                AccessGroupKey::new(key.owner_public_key, key.group_key_name)
            }
            HolderKey::Group(key) => *key,
        }
    }
}

/// Metadata of the legacy combined group transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGroupMetadata {
    /// Access key the group encrypts to; the curve base point selects the
    /// unencrypted-group path.
    pub access_public_key: PublicKey,
    /// Wire-form name, 1-32 bytes before padding
    pub group_key_name: Vec<u8>,
    pub operation: AccessGroupOperation,
    pub members: Vec<crate::entries::AccessGroupMember>,
    /// `sig(access_public_key || group_key_name)` by the owner key; checked
    /// for default-name registration below the access-groups fork.
    pub group_owner_signature: Vec<u8>,
}

/// Metadata of the dedicated member transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGroupMembersMetadata {
    pub access_public_key: PublicKey,
    pub group_key_name: Vec<u8>,
    pub operation: MemberOperation,
    pub members: Vec<crate::entries::AccessGroupMember>,
}

/// Metadata of the attribute transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGroupAttributesMetadata {
    pub holder: AttributeHolder,
    pub holder_key: HolderKey,
    pub operation: AttributeOperation,
    pub attribute_type: u16,
    pub attribute_value: Vec<u8>,
}

/// The tagged metadata union
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxnMeta {
    BasicTransfer,
    AccessGroup(AccessGroupMetadata),
    AccessGroupMembers(AccessGroupMembersMetadata),
    AccessGroupAttributes(AccessGroupAttributesMetadata),
}

impl TxnMeta {
    pub const fn txn_type(&self) -> TxnType {
        match self {
            TxnMeta::BasicTransfer => TxnType::BasicTransfer,
            TxnMeta::AccessGroup(_) => TxnType::AccessGroup,
            TxnMeta::AccessGroupMembers(_) => TxnType::AccessGroupMembers,
            TxnMeta::AccessGroupAttributes(_) => TxnType::AccessGroupAttributes,
        }
    }
}

/// A decoded transaction as seen by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Signer and fee payer; the group owner for metadata transactions
    pub public_key: PublicKey,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub extra_data: ExtraData,
    pub meta: TxnMeta,
}
