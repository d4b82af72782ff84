//! Operation Log
//!
//! Each connected transaction appends records carrying the prior state a
//! reorg needs to restore. The disconnect path consumes them LIFO; the
//! records own deep copies, so later view mutation cannot alias into them.

use serde::{Deserialize, Serialize};

use lib_types::{GroupEnumerationKey, GroupMembershipKey};
use lib_utxo::TransferOp;

use crate::entries::{AccessGroupEntry, AccessGroupMember, AttributeEntry};
use crate::transaction::{AttributeOperation, HolderKey};

/// Discriminant of an operation record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationType {
    BasicTransfer,
    AccessGroup,
    AccessGroupMembers,
    AccessGroupAttributes,
}

/// One rollback record on the per-transaction operation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UtxoOperation {
    /// Coin side of the transaction
    BasicTransfer { transfer: TransferOp },

    /// Legacy combined group transaction. Besides the prior entry, carries
    /// the membership keys it inserted and the member-attribute entries its
    /// mute/unmute overwrote, so disconnect restores all three indexes.
    AccessGroup {
        prev_entry: Option<AccessGroupEntry>,
        added_members: Vec<GroupMembershipKey>,
        prev_member_attrs: Vec<(GroupEnumerationKey, u16, Option<AttributeEntry>)>,
    },

    /// Dedicated member transaction. `prev_members` is parallel to
    /// `added_members` and is expected to be all-None: an admit over an
    /// existing record is rejected at connect time.
    AccessGroupMembers {
        added_members: Vec<GroupMembershipKey>,
        prev_members: Vec<Option<AccessGroupMember>>,
    },

    /// Attribute transaction; enough for exact rollback.
    AccessGroupAttributes {
        holder_key: HolderKey,
        operation: AttributeOperation,
        attribute_type: u16,
        attribute_value: Vec<u8>,
        prev_entry: Option<AttributeEntry>,
    },
}

impl UtxoOperation {
    pub const fn op_type(&self) -> OperationType {
        match self {
            UtxoOperation::BasicTransfer { .. } => OperationType::BasicTransfer,
            UtxoOperation::AccessGroup { .. } => OperationType::AccessGroup,
            UtxoOperation::AccessGroupMembers { .. } => OperationType::AccessGroupMembers,
            UtxoOperation::AccessGroupAttributes { .. } => OperationType::AccessGroupAttributes,
        }
    }
}
