//! VEIL Canonical Types
//!
//! Shared fixed-size primitives and composite keys for the access-control
//! subsystem. Everything here is consensus state: deterministic encoding,
//! byte-wise equality, no heap-backed identifiers.

pub mod extra_data;
pub mod keys;
pub mod primitives;

pub use extra_data::{
    decode_u64, encode_u64, merge_extra_data, ExtraData, MESSAGE_ROTATING_VERSION,
};
pub use keys::{
    AccessGroupKey, DmMessageKey, GroupChatMessageKey, GroupEnumerationKey, GroupMembershipKey,
    MessageKey,
};
pub use primitives::{
    Amount, BlockHeight, GroupKeyName, PublicKey, TxHash, GROUP_KEY_NAME_LEN,
    MAX_GROUP_KEY_NAME_LEN, MIN_GROUP_KEY_NAME_LEN, PUBLIC_KEY_LEN,
};
