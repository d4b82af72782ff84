//! VEIL Access-Group Subsystem
//!
//! The on-chain state-transition engine for access groups: the rules by
//! which transactions create groups, admit members, mute and unmute them,
//! and set named attributes, together with the staged view that stacks
//! pending state on the durable store and unwinds it transaction by
//! transaction on chain reorganization.
//!
//! # Shape
//!
//! - [`view::AccessGroupView`] - per-session overlay over an
//!   [`storage::AccessStore`], with the connect/disconnect engine attached
//! - [`entries`] - the consensus state records
//! - [`transaction`] - decoded transaction metadata (tagged unions, no
//!   runtime type-switching)
//! - [`operation`] - rollback records consumed LIFO on reorg
//! - [`params`] - consensus-critical fork heights
//!
//! Wire codecs, signature internals, message delivery, and coin accounting
//! beyond the basic-transfer collaborator live outside this crate.

pub mod entries;
mod engine;
pub mod errors;
pub mod operation;
pub mod params;
pub mod storage;
pub mod transaction;
pub mod view;

pub use entries::{
    AccessGroupEntry, AccessGroupMember, AttributeEntry, MemberAttributeType, MemberRecord,
    MessageAttributeType, group_rotating_version, set_group_rotating_version,
    MIN_ENCRYPTED_KEY_LEN,
};
pub use errors::{RuleError, RuleResult};
pub use operation::{OperationType, UtxoOperation};
pub use params::{migration_triggered, ChainParams, ForkHeights};
pub use storage::{AccessStore, MemoryStore, SledStore, StorageError, StorageResult};
pub use transaction::{
    AccessGroupAttributesMetadata, AccessGroupMembersMetadata, AccessGroupMetadata,
    AccessGroupOperation, AttributeHolder, AttributeOperation, HolderKey, MemberOperation,
    Transaction, TxnMeta, TxnType,
};
pub use view::AccessGroupView;
