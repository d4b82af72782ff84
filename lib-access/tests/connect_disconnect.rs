//! End-to-end connect/disconnect scenarios.
//!
//! Each test drives real transactions through a staged view over a real
//! store, asserts the forward effects, and then checks that disconnecting
//! restores the starting state via the store's canonical encoding.

use std::cell::Cell;

use anyhow::Result;
use k256::ecdsa::SigningKey;
use k256::elliptic_curve::sec1::ToEncodedPoint;

use lib_access::{
    AccessGroupAttributesMetadata, AccessGroupMember, AccessGroupMembersMetadata,
    AccessGroupMetadata, AccessGroupOperation, AccessGroupView, AttributeHolder,
    AttributeOperation, ChainParams, HolderKey, MemberOperation, MemoryStore, RuleError,
    Transaction, TxnMeta, UtxoOperation,
};
use lib_crypto::{base_point_public_key, derive_public_key, sha256d, sign_bytes};
use lib_types::{
    AccessGroupKey, ExtraData, GroupEnumerationKey, GroupKeyName, PublicKey, TxHash,
};
use lib_utxo::{MemoryUtxoStore, OutPoint, TxInput, TxOutput, Utxo};

// =============================================================================
// HARNESS
// =============================================================================

struct Harness {
    store: MemoryStore,
    utxos: MemoryUtxoStore,
    params: ChainParams,
    funding: Cell<u32>,
}

impl Harness {
    fn new(params: ChainParams) -> Self {
        Self {
            store: MemoryStore::new(),
            utxos: MemoryUtxoStore::new(),
            params,
            funding: Cell::new(0),
        }
    }

    fn post_fork() -> Self {
        Self::new(ChainParams::all_forks_at_genesis())
    }

    fn view(&self) -> AccessGroupView<'_> {
        AccessGroupView::new(&self.store, &self.utxos, self.params)
    }

    /// Seed a fresh 1000-coin output for one transaction's fee input.
    fn fund(&self, owner: PublicKey) -> OutPoint {
        let index = self.funding.get();
        self.funding.set(index + 1);
        let outpoint = OutPoint::new(TxHash::new([0xfd; 32]), index);
        self.utxos.insert(outpoint, Utxo::new(1000, owner, 0));
        outpoint
    }
}

fn keypair(tag: u8) -> ([u8; 32], PublicKey) {
    let secret = [tag; 32];
    let signing = SigningKey::from_slice(&secret).expect("test scalar");
    let point = signing.verifying_key().to_encoded_point(true);
    (secret, PublicKey::from_slice(point.as_bytes()).expect("compressed point"))
}

fn tx_hash(tag: u8) -> TxHash {
    TxHash::new([tag; 32])
}

fn base_member(member: PublicKey) -> AccessGroupMember {
    AccessGroupMember::new(member, GroupKeyName::base(), vec![0u8; 32])
}

fn txn(owner: PublicKey, input: OutPoint, meta: TxnMeta) -> Transaction {
    Transaction {
        public_key: owner,
        inputs: vec![TxInput::new(input)],
        outputs: vec![TxOutput {
            amount: 900,
            recipient: owner,
        }],
        extra_data: ExtraData::new(),
        meta,
    }
}

fn group_meta(
    access: PublicKey,
    name: &[u8],
    operation: AccessGroupOperation,
    members: Vec<AccessGroupMember>,
) -> TxnMeta {
    TxnMeta::AccessGroup(AccessGroupMetadata {
        access_public_key: access,
        group_key_name: name.to_vec(),
        operation,
        members,
        group_owner_signature: Vec::new(),
    })
}

fn members_meta(
    access: PublicKey,
    name: &[u8],
    operation: MemberOperation,
    members: Vec<AccessGroupMember>,
) -> TxnMeta {
    TxnMeta::AccessGroupMembers(AccessGroupMembersMetadata {
        access_public_key: access,
        group_key_name: name.to_vec(),
        operation,
        members,
    })
}

fn attributes_meta(
    holder: AttributeHolder,
    holder_key: HolderKey,
    operation: AttributeOperation,
    attribute_type: u16,
    attribute_value: &[u8],
) -> TxnMeta {
    TxnMeta::AccessGroupAttributes(AccessGroupAttributesMetadata {
        holder,
        holder_key,
        operation,
        attribute_type,
        attribute_value: attribute_value.to_vec(),
    })
}

// =============================================================================
// SCENARIOS
// =============================================================================

#[test]
fn create_fresh_group_then_disconnect_restores_absent_state() -> Result<()> {
    let harness = Harness::post_fork();
    let baseline = harness.store.canonical_dump()?;
    let (_, alice) = keypair(1);
    let (_, bob) = keypair(2);
    let access = derive_public_key(&sha256d(b"room access key"))?;

    let mut view = harness.view();
    let create = txn(
        alice,
        harness.fund(alice),
        group_meta(
            access,
            b"room",
            AccessGroupOperation::AddMembers,
            vec![base_member(bob)],
        ),
    );
    let (total_in, total_out, ops) = view.connect_transaction(&create, tx_hash(1), 10, true)?;
    assert_eq!(total_in, 1000);
    assert_eq!(total_out, 900);
    assert_eq!(ops.len(), 2);
    assert!(matches!(ops[0], UtxoOperation::BasicTransfer { .. }));
    assert!(matches!(ops[1], UtxoOperation::AccessGroup { .. }));

    let name = GroupKeyName::from_wire(b"room");
    let entry = view.get_group(&alice, &name, 10)?.expect("group staged");
    assert_eq!(entry.access_public_key, access);
    assert_eq!(entry.group_owner_public_key, alice);
    // Post-fork: membership lives in the index, not in the entry.
    assert!(entry.members.is_empty());
    assert!(view.get_member(&alice, &name, &bob, 10)?.is_some());

    view.disconnect_transaction(&create, tx_hash(1), ops, 10)?;
    assert!(view.get_group(&alice, &name, 10)?.is_none());
    assert!(view.get_member(&alice, &name, &bob, 10)?.is_none());

    view.flush()?;
    assert_eq!(harness.store.canonical_dump()?, baseline);
    Ok(())
}

#[test]
fn duplicate_admit_is_rejected_and_view_unchanged() -> Result<()> {
    let harness = Harness::post_fork();
    let (_, alice) = keypair(1);
    let (_, bob) = keypair(2);
    let access = derive_public_key(&sha256d(b"room access key"))?;

    let mut view = harness.view();
    let create = txn(
        alice,
        harness.fund(alice),
        group_meta(
            access,
            b"room",
            AccessGroupOperation::AddMembers,
            vec![base_member(bob)],
        ),
    );
    view.connect_transaction(&create, tx_hash(1), 10, true)?;

    // Same admit again, through both transaction kinds.
    let again = txn(
        alice,
        harness.fund(alice),
        group_meta(
            access,
            b"room",
            AccessGroupOperation::AddMembers,
            vec![base_member(bob)],
        ),
    );
    let err = view
        .connect_transaction(&again, tx_hash(2), 10, true)
        .unwrap_err();
    assert!(matches!(err, RuleError::MemberAlreadyExists(pk) if pk == bob));

    let dedicated = txn(
        alice,
        harness.fund(alice),
        members_meta(access, b"room", MemberOperation::Add, vec![base_member(bob)]),
    );
    let err = view
        .connect_transaction(&dedicated, tx_hash(3), 10, true)
        .unwrap_err();
    assert!(matches!(err, RuleError::MemberAlreadyExists(pk) if pk == bob));

    // The rejected transactions staged nothing.
    let name = GroupKeyName::from_wire(b"room");
    assert!(view.get_member(&alice, &name, &bob, 10)?.is_some());
    assert_eq!(view.get_all_groups_for_user(&alice, 10)?.len(), 2); // base + room
    Ok(())
}

#[test]
fn mute_round_trip() -> Result<()> {
    let harness = Harness::post_fork();
    let (_, alice) = keypair(1);
    let (_, bob) = keypair(2);
    let access = derive_public_key(&sha256d(b"room access key"))?;
    let name = GroupKeyName::from_wire(b"room");

    let mut view = harness.view();
    let create = txn(
        alice,
        harness.fund(alice),
        group_meta(
            access,
            b"room",
            AccessGroupOperation::AddMembers,
            vec![base_member(bob)],
        ),
    );
    view.connect_transaction(&create, tx_hash(1), 10, true)?;
    assert!(!view.is_member_muted(&alice, &name, &bob)?);

    let mute = txn(
        alice,
        harness.fund(alice),
        group_meta(
            access,
            b"room",
            AccessGroupOperation::MuteMembers,
            vec![base_member(bob)],
        ),
    );
    let (_, _, ops) = view.connect_transaction(&mute, tx_hash(2), 11, true)?;
    assert!(view.is_member_muted(&alice, &name, &bob)?);

    // Muting twice is an idempotency violation.
    let mute_again = txn(
        alice,
        harness.fund(alice),
        group_meta(
            access,
            b"room",
            AccessGroupOperation::MuteMembers,
            vec![base_member(bob)],
        ),
    );
    let err = view
        .connect_transaction(&mute_again, tx_hash(3), 12, true)
        .unwrap_err();
    assert!(matches!(err, RuleError::AlreadyMuted(pk) if pk == bob));

    view.disconnect_transaction(&mute, tx_hash(2), ops, 11)?;
    assert!(!view.is_member_muted(&alice, &name, &bob)?);
    Ok(())
}

#[test]
fn unmute_round_trip() -> Result<()> {
    let harness = Harness::post_fork();
    let (_, alice) = keypair(1);
    let (_, bob) = keypair(2);
    let access = derive_public_key(&sha256d(b"room access key"))?;
    let name = GroupKeyName::from_wire(b"room");

    let mut view = harness.view();
    let create = txn(
        alice,
        harness.fund(alice),
        group_meta(
            access,
            b"room",
            AccessGroupOperation::AddMembers,
            vec![base_member(bob)],
        ),
    );
    view.connect_transaction(&create, tx_hash(1), 10, true)?;

    // Unmuting an unmuted member is rejected.
    let unmute_early = txn(
        alice,
        harness.fund(alice),
        group_meta(
            access,
            b"room",
            AccessGroupOperation::UnmuteMembers,
            vec![base_member(bob)],
        ),
    );
    let err = view
        .connect_transaction(&unmute_early, tx_hash(2), 11, true)
        .unwrap_err();
    assert!(matches!(err, RuleError::AlreadyUnmuted(pk) if pk == bob));

    let mute = txn(
        alice,
        harness.fund(alice),
        group_meta(
            access,
            b"room",
            AccessGroupOperation::MuteMembers,
            vec![base_member(bob)],
        ),
    );
    view.connect_transaction(&mute, tx_hash(3), 11, true)?;

    let unmute = txn(
        alice,
        harness.fund(alice),
        group_meta(
            access,
            b"room",
            AccessGroupOperation::UnmuteMembers,
            vec![base_member(bob)],
        ),
    );
    let (_, _, ops) = view.connect_transaction(&unmute, tx_hash(4), 12, true)?;
    assert!(!view.is_member_muted(&alice, &name, &bob)?);

    // Disconnecting the unmute re-mutes.
    view.disconnect_transaction(&unmute, tx_hash(4), ops, 12)?;
    assert!(view.is_member_muted(&alice, &name, &bob)?);
    Ok(())
}

#[test]
fn owner_cannot_mute_or_unmute_self() -> Result<()> {
    let harness = Harness::post_fork();
    let (_, alice) = keypair(1);
    let access = derive_public_key(&sha256d(b"room access key"))?;

    let mut view = harness.view();
    let create = txn(
        alice,
        harness.fund(alice),
        group_meta(access, b"room", AccessGroupOperation::AddMembers, vec![]),
    );
    view.connect_transaction(&create, tx_hash(1), 10, true)?;

    let mute_self = txn(
        alice,
        harness.fund(alice),
        group_meta(
            access,
            b"room",
            AccessGroupOperation::MuteMembers,
            vec![base_member(alice)],
        ),
    );
    let err = view
        .connect_transaction(&mute_self, tx_hash(2), 11, true)
        .unwrap_err();
    assert!(matches!(err, RuleError::OwnerMutingSelf));
    Ok(())
}

#[test]
fn unencrypted_group_is_remapped_and_derivable() -> Result<()> {
    let harness = Harness::post_fork();
    let (_, alice) = keypair(1);
    let base_point = base_point_public_key();

    let mut view = harness.view();
    let create = txn(
        alice,
        harness.fund(alice),
        group_meta(
            base_point,
            b"public-chat",
            AccessGroupOperation::AddMembers,
            vec![],
        ),
    );
    let (_, _, ops) = view.connect_transaction(&create, tx_hash(1), 10, true)?;

    let name = GroupKeyName::from_wire(b"public-chat");
    // Indexed under the base point, not the transactor.
    assert!(view.get_group(&alice, &name, 10)?.is_none());
    let entry = view.get_group(&base_point, &name, 10)?.expect("unencrypted group");
    assert_eq!(entry.group_owner_public_key, base_point);

    // Anyone can re-derive the access key from the padded name.
    let expected = derive_public_key(&sha256d(name.as_bytes()))?;
    assert_eq!(entry.access_public_key, expected);

    view.disconnect_transaction(&create, tx_hash(1), ops, 10)?;
    assert!(view.get_group(&base_point, &name, 10)?.is_none());
    Ok(())
}

#[test]
fn attribute_add_then_remove_round_trip() -> Result<()> {
    let harness = Harness::post_fork();
    let (_, alice) = keypair(1);
    let access = derive_public_key(&sha256d(b"room access key"))?;
    let name = GroupKeyName::from_wire(b"room");
    let group_key = AccessGroupKey::new(alice, name);
    let holder = HolderKey::Group(group_key);

    // Phase 1: group exists durably.
    let mut setup = harness.view();
    let create = txn(
        alice,
        harness.fund(alice),
        group_meta(access, b"room", AccessGroupOperation::AddMembers, vec![]),
    );
    setup.connect_transaction(&create, tx_hash(1), 10, true)?;
    setup.flush()?;
    let baseline = harness.store.canonical_dump()?;

    // Phase 2: add then remove, then unwind both.
    let mut view = harness.view();
    let add = txn(
        alice,
        harness.fund(alice),
        attributes_meta(AttributeHolder::Group, holder, AttributeOperation::Add, 7, b"hello"),
    );
    let (_, _, add_ops) = view.connect_transaction(&add, tx_hash(2), 11, true)?;
    let attr = view.get_attribute(&holder, 7)?.expect("attribute set");
    assert!(attr.is_set);
    assert_eq!(attr.value, b"hello");

    let remove = txn(
        alice,
        harness.fund(alice),
        attributes_meta(
            AttributeHolder::Group,
            holder,
            AttributeOperation::Remove,
            7,
            b"hello",
        ),
    );
    let (_, _, remove_ops) = view.connect_transaction(&remove, tx_hash(3), 12, true)?;
    let attr = view.get_attribute(&holder, 7)?.expect("attribute cleared, not absent");
    assert!(!attr.is_set);

    view.disconnect_transaction(&remove, tx_hash(3), remove_ops, 12)?;
    assert!(view.get_attribute(&holder, 7)?.expect("restored").is_set);

    view.disconnect_transaction(&add, tx_hash(2), add_ops, 11)?;
    assert!(view.get_attribute(&holder, 7)?.is_none());

    view.flush()?;
    assert_eq!(harness.store.canonical_dump()?, baseline);
    Ok(())
}

#[test]
fn attribute_authorization_rules() -> Result<()> {
    let harness = Harness::post_fork();
    let (_, alice) = keypair(1);
    let (_, mallory) = keypair(3);
    let access = derive_public_key(&sha256d(b"room access key"))?;
    let name = GroupKeyName::from_wire(b"room");
    let holder = HolderKey::Group(AccessGroupKey::new(alice, name));

    let mut view = harness.view();
    let create = txn(
        alice,
        harness.fund(alice),
        group_meta(access, b"room", AccessGroupOperation::AddMembers, vec![]),
    );
    view.connect_transaction(&create, tx_hash(1), 10, true)?;

    // Non-owner mutation.
    let denied = txn(
        mallory,
        harness.fund(mallory),
        attributes_meta(AttributeHolder::Group, holder, AttributeOperation::Add, 7, b"x"),
    );
    assert!(matches!(
        view.connect_transaction(&denied, tx_hash(2), 11, true),
        Err(RuleError::OperationDenied)
    ));

    // Holder tag disagreeing with the key shape.
    let mismatched = txn(
        alice,
        harness.fund(alice),
        attributes_meta(AttributeHolder::Member, holder, AttributeOperation::Add, 7, b"x"),
    );
    assert!(matches!(
        view.connect_transaction(&mismatched, tx_hash(3), 11, true),
        Err(RuleError::InvalidAttributeHolder)
    ));

    // Attribute on a group that does not exist.
    let ghost = HolderKey::Group(AccessGroupKey::new(alice, GroupKeyName::from_wire(b"ghost")));
    let ghosted = txn(
        alice,
        harness.fund(alice),
        attributes_meta(AttributeHolder::Group, ghost, AttributeOperation::Add, 7, b"x"),
    );
    assert!(matches!(
        view.connect_transaction(&ghosted, tx_hash(4), 11, true),
        Err(RuleError::GroupDoesntExist)
    ));
    Ok(())
}

#[test]
fn member_attribute_via_dedicated_transaction() -> Result<()> {
    let harness = Harness::post_fork();
    let (_, alice) = keypair(1);
    let (_, bob) = keypair(2);
    let access = derive_public_key(&sha256d(b"room access key"))?;
    let name = GroupKeyName::from_wire(b"room");

    let mut view = harness.view();
    let create = txn(
        alice,
        harness.fund(alice),
        group_meta(
            access,
            b"room",
            AccessGroupOperation::AddMembers,
            vec![base_member(bob)],
        ),
    );
    view.connect_transaction(&create, tx_hash(1), 10, true)?;

    let holder = HolderKey::Member(GroupEnumerationKey::new(alice, name, bob));
    let tag = txn(
        alice,
        harness.fund(alice),
        attributes_meta(AttributeHolder::Member, holder, AttributeOperation::Add, 40, b"vip"),
    );
    let (_, _, ops) = view.connect_transaction(&tag, tx_hash(2), 11, true)?;
    assert_eq!(view.get_attribute(&holder, 40)?.expect("set").value, b"vip");

    view.disconnect_transaction(&tag, tx_hash(2), ops, 11)?;
    assert!(view.get_attribute(&holder, 40)?.is_none());
    Ok(())
}

// =============================================================================
// FORK GATING AND ERA BEHAVIOR
// =============================================================================

#[test]
fn transactions_below_their_fork_heights_are_rejected() -> Result<()> {
    let harness = Harness::new(ChainParams::testnet());
    let (_, alice) = keypair(1);
    let access = derive_public_key(&sha256d(b"room access key"))?;
    let forks = ChainParams::testnet().fork_heights;

    let mut view = harness.view();
    let create = txn(
        alice,
        harness.fund(alice),
        group_meta(access, b"room", AccessGroupOperation::AddMembers, vec![]),
    );
    let below_v3 = forks.v3_messages_block_height - 1;
    assert!(matches!(
        view.connect_transaction(&create, tx_hash(1), below_v3, true),
        Err(RuleError::TooEarly { .. })
    ));

    // The dedicated transactions need the later access-groups fork.
    let pre_access = forks.access_groups_block_height - 1;
    let members = txn(
        alice,
        harness.fund(alice),
        members_meta(access, b"room", MemberOperation::Add, vec![]),
    );
    assert!(matches!(
        view.connect_transaction(&members, tx_hash(2), pre_access, true),
        Err(RuleError::TooEarly { .. })
    ));
    let attrs = txn(
        alice,
        harness.fund(alice),
        attributes_meta(
            AttributeHolder::Group,
            HolderKey::Group(AccessGroupKey::new(alice, GroupKeyName::from_wire(b"room"))),
            AttributeOperation::Add,
            7,
            b"x",
        ),
    );
    assert!(matches!(
        view.connect_transaction(&attrs, tx_hash(3), pre_access, true),
        Err(RuleError::TooEarly { .. })
    ));
    Ok(())
}

#[test]
fn embedded_member_era_semantics() -> Result<()> {
    let harness = Harness::new(ChainParams::testnet());
    let (_, alice) = keypair(1);
    let (_, bob) = keypair(2);
    let (_, carol) = keypair(4);
    let access = derive_public_key(&sha256d(b"room access key"))?;
    let forks = ChainParams::testnet().fork_heights;
    // Between the V3 fork and the access-groups fork.
    let height = forks.access_groups_block_height - 100;
    let name = GroupKeyName::from_wire(b"room");

    let mut view = harness.view();
    let create = txn(
        alice,
        harness.fund(alice),
        group_meta(
            access,
            b"room",
            AccessGroupOperation::AddMembers,
            vec![base_member(bob)],
        ),
    );
    view.connect_transaction(&create, tx_hash(1), height, true)?;

    // Members live embedded in the entry; the index is untouched.
    let entry = view.get_group(&alice, &name, height)?.expect("group");
    assert_eq!(entry.members.len(), 1);
    assert!(view.get_member(&alice, &name, &bob, height)?.is_none());

    // Updating without adding anyone is rejected.
    let noop = txn(
        alice,
        harness.fund(alice),
        group_meta(access, b"room", AccessGroupOperation::AddMembers, vec![]),
    );
    assert!(matches!(
        view.connect_transaction(&noop, tx_hash(2), height, true),
        Err(RuleError::KeyDoesntAddMembers)
    ));

    // Duplicates are caught against the embedded list.
    let duplicate = txn(
        alice,
        harness.fund(alice),
        group_meta(
            access,
            b"room",
            AccessGroupOperation::AddMembers,
            vec![base_member(bob)],
        ),
    );
    assert!(matches!(
        view.connect_transaction(&duplicate, tx_hash(3), height, true),
        Err(RuleError::MemberAlreadyExists(pk)) if pk == bob
    ));

    // A valid extension appends to the embedded list.
    let extend = txn(
        alice,
        harness.fund(alice),
        group_meta(
            access,
            b"room",
            AccessGroupOperation::AddMembers,
            vec![base_member(carol)],
        ),
    );
    let (_, _, ops) = view.connect_transaction(&extend, tx_hash(4), height, true)?;
    let entry = view.get_group(&alice, &name, height)?.expect("group");
    assert_eq!(entry.members.len(), 2);

    // Mute tags do not exist in this era.
    let mute = txn(
        alice,
        harness.fund(alice),
        group_meta(
            access,
            b"room",
            AccessGroupOperation::MuteMembers,
            vec![base_member(bob)],
        ),
    );
    assert!(matches!(
        view.connect_transaction(&mute, tx_hash(5), height, true),
        Err(RuleError::NotSupported(_))
    ));

    // Disconnect of the extension restores the one-member entry.
    view.disconnect_transaction(&extend, tx_hash(4), ops, height)?;
    let entry = view.get_group(&alice, &name, height)?.expect("group");
    assert_eq!(entry.members.len(), 1);
    assert_eq!(entry.members[0].member_public_key, bob);
    Ok(())
}

#[test]
fn default_name_requires_owner_signature_only_before_fork() -> Result<()> {
    let harness = Harness::new(ChainParams::testnet());
    let (alice_secret, alice) = keypair(1);
    let access = derive_public_key(&sha256d(b"derived access key"))?;
    let forks = ChainParams::testnet().fork_heights;
    let pre_fork = forks.access_groups_block_height - 100;

    let mut view = harness.view();

    // Unsigned registration below the fork fails.
    let unsigned = txn(
        alice,
        harness.fund(alice),
        group_meta(access, b"default-key", AccessGroupOperation::AddMembers, vec![]),
    );
    assert!(matches!(
        view.connect_transaction(&unsigned, tx_hash(1), pre_fork, true),
        Err(RuleError::SignatureInvalid)
    ));

    // A signature over access key || wire name by the owner key passes.
    let mut message = access.to_vec();
    message.extend_from_slice(b"default-key");
    let signature = sign_bytes(&alice_secret, &message)?;
    let mut meta = AccessGroupMetadata {
        access_public_key: access,
        group_key_name: b"default-key".to_vec(),
        operation: AccessGroupOperation::AddMembers,
        members: vec![],
        group_owner_signature: signature,
    };
    let signed = txn(
        alice,
        harness.fund(alice),
        TxnMeta::AccessGroup(meta.clone()),
    );
    view.connect_transaction(&signed, tx_hash(2), pre_fork, true)?;

    // After the fork the constraint is dropped: a different owner can
    // register a default-name group unsigned.
    let (_, dave) = keypair(5);
    meta.group_owner_signature = Vec::new();
    let post_fork = forks.access_groups_block_height;
    let unsigned_after = txn(dave, harness.fund(dave), TxnMeta::AccessGroup(meta));
    view.connect_transaction(&unsigned_after, tx_hash(3), post_fork, true)?;
    Ok(())
}

#[test]
fn extra_data_merges_only_after_its_fork() -> Result<()> {
    let harness = Harness::new(ChainParams::testnet());
    let (_, alice) = keypair(1);
    let (_, bob) = keypair(2);
    let (_, carol) = keypair(4);
    let access = derive_public_key(&sha256d(b"room access key"))?;
    let forks = ChainParams::testnet().fork_heights;
    let name = GroupKeyName::from_wire(b"room");

    let mut view = harness.view();

    // Before the extra-data fork the payload is dropped.
    let before = forks.extra_data_on_entries_block_height - 1;
    let mut create = txn(
        alice,
        harness.fund(alice),
        group_meta(
            access,
            b"room",
            AccessGroupOperation::AddMembers,
            vec![base_member(bob)],
        ),
    );
    create.extra_data.insert("a".to_string(), vec![1]);
    view.connect_transaction(&create, tx_hash(1), before, true)?;
    assert!(view.get_group(&alice, &name, before)?.unwrap().extra_data.is_empty());

    // After it, updates merge right-biased over the existing entry.
    let after = forks.extra_data_on_entries_block_height;
    let mut update = txn(
        alice,
        harness.fund(alice),
        group_meta(
            access,
            b"room",
            AccessGroupOperation::AddMembers,
            vec![base_member(carol)],
        ),
    );
    update.extra_data.insert("a".to_string(), vec![9]);
    update.extra_data.insert("b".to_string(), vec![2]);
    view.connect_transaction(&update, tx_hash(2), after, true)?;
    let extra = view.get_group(&alice, &name, after)?.unwrap().extra_data;
    assert_eq!(extra.get("a"), Some(&vec![9]));
    assert_eq!(extra.get("b"), Some(&vec![2]));
    Ok(())
}

// =============================================================================
// VALIDATION BOUNDARIES
// =============================================================================

#[test]
fn name_length_boundaries() -> Result<()> {
    let harness = Harness::post_fork();
    let (_, alice) = keypair(1);
    let access = derive_public_key(&sha256d(b"room access key"))?;

    let mut view = harness.view();

    let empty = txn(
        alice,
        harness.fund(alice),
        group_meta(access, b"", AccessGroupOperation::AddMembers, vec![]),
    );
    assert!(matches!(
        view.connect_transaction(&empty, tx_hash(1), 10, true),
        Err(RuleError::NameTooShort { len: 0 })
    ));

    let long = [b'x'; 33];
    let too_long = txn(
        alice,
        harness.fund(alice),
        group_meta(access, &long, AccessGroupOperation::AddMembers, vec![]),
    );
    assert!(matches!(
        view.connect_transaction(&too_long, tx_hash(2), 10, true),
        Err(RuleError::NameTooLong { len: 33 })
    ));

    let exact = [b'x'; 32];
    let max = txn(
        alice,
        harness.fund(alice),
        group_meta(access, &exact, AccessGroupOperation::AddMembers, vec![]),
    );
    view.connect_transaction(&max, tx_hash(3), 10, true)?;

    // All-zero wire names are the reserved base name.
    let zeros = [0u8; 4];
    let reserved = txn(
        alice,
        harness.fund(alice),
        group_meta(access, &zeros, AccessGroupOperation::AddMembers, vec![]),
    );
    assert!(matches!(
        view.connect_transaction(&reserved, tx_hash(4), 10, true),
        Err(RuleError::NameCannotBeZeros)
    ));
    Ok(())
}

#[test]
fn encrypted_key_length_boundary() -> Result<()> {
    let harness = Harness::post_fork();
    let (_, alice) = keypair(1);
    let (_, bob) = keypair(2);
    let access = derive_public_key(&sha256d(b"room access key"))?;

    let mut view = harness.view();
    let mut short = base_member(bob);
    short.encrypted_key = vec![0u8; 31];
    let rejected = txn(
        alice,
        harness.fund(alice),
        group_meta(access, b"room", AccessGroupOperation::AddMembers, vec![short]),
    );
    assert!(matches!(
        view.connect_transaction(&rejected, tx_hash(1), 10, true),
        Err(RuleError::MemberEncryptedKeyTooShort { len: 31, min: 32 })
    ));

    let exact = base_member(bob); // 32 bytes
    let accepted = txn(
        alice,
        harness.fund(alice),
        group_meta(access, b"room", AccessGroupOperation::AddMembers, vec![exact]),
    );
    view.connect_transaction(&accepted, tx_hash(2), 10, true)?;
    Ok(())
}

#[test]
fn structural_rejections() -> Result<()> {
    let harness = Harness::post_fork();
    let (_, alice) = keypair(1);
    let (_, bob) = keypair(2);
    let (_, eve) = keypair(6);
    let access = derive_public_key(&sha256d(b"room access key"))?;

    let mut view = harness.view();

    // Access key equal to the transactor key.
    let self_keyed = txn(
        alice,
        harness.fund(alice),
        group_meta(alice, b"room", AccessGroupOperation::AddMembers, vec![]),
    );
    assert!(matches!(
        view.connect_transaction(&self_keyed, tx_hash(1), 10, true),
        Err(RuleError::PKCannotBeOwnerKey)
    ));

    // Admitting a member whose admitting group is unregistered.
    let phantom = AccessGroupMember::new(bob, GroupKeyName::from_wire(b"nope"), vec![0u8; 32]);
    let missing_admit = txn(
        alice,
        harness.fund(alice),
        group_meta(access, b"room", AccessGroupOperation::AddMembers, vec![phantom]),
    );
    assert!(matches!(
        view.connect_transaction(&missing_admit, tx_hash(2), 10, true),
        Err(RuleError::MemberKeyDoesntExist(pk)) if pk == bob
    ));

    // Re-registering with a different access key.
    let create = txn(
        alice,
        harness.fund(alice),
        group_meta(access, b"room", AccessGroupOperation::AddMembers, vec![]),
    );
    view.connect_transaction(&create, tx_hash(3), 10, true)?;
    let other_access = derive_public_key(&sha256d(b"a different key"))?;
    let conflicting = txn(
        alice,
        harness.fund(alice),
        group_meta(other_access, b"room", AccessGroupOperation::AddMembers, vec![]),
    );
    assert!(matches!(
        view.connect_transaction(&conflicting, tx_hash(4), 10, true),
        Err(RuleError::PKCannotBeDifferent)
    ));

    // Reserved operations.
    let removal = txn(
        alice,
        harness.fund(alice),
        group_meta(
            access,
            b"room",
            AccessGroupOperation::RemoveMembers,
            vec![base_member(bob)],
        ),
    );
    assert!(matches!(
        view.connect_transaction(&removal, tx_hash(5), 10, true),
        Err(RuleError::NotSupported(_))
    ));
    let dedicated_removal = txn(
        alice,
        harness.fund(alice),
        members_meta(access, b"room", MemberOperation::Remove, vec![base_member(bob)]),
    );
    assert!(matches!(
        view.connect_transaction(&dedicated_removal, tx_hash(6), 10, true),
        Err(RuleError::NotSupported(_))
    ));

    // Dedicated member admission against someone else's group name.
    let foreign = txn(
        eve,
        harness.fund(eve),
        members_meta(access, b"room", MemberOperation::Add, vec![base_member(bob)]),
    );
    assert!(matches!(
        view.connect_transaction(&foreign, tx_hash(7), 10, true),
        Err(RuleError::GroupDoesntExist)
    ));

    // Muting a non-member.
    let mute_stranger = txn(
        alice,
        harness.fund(alice),
        group_meta(
            access,
            b"room",
            AccessGroupOperation::MuteMembers,
            vec![base_member(eve)],
        ),
    );
    assert!(matches!(
        view.connect_transaction(&mute_stranger, tx_hash(8), 10, true),
        Err(RuleError::MemberNotInGroup(pk)) if pk == eve
    ));
    Ok(())
}

// =============================================================================
// ENUMERATION AND PERSISTENCE
// =============================================================================

#[test]
fn enumeration_spans_overlay_and_store() -> Result<()> {
    let harness = Harness::post_fork();
    let (_, alice) = keypair(1);
    let (_, bob) = keypair(2);
    let access = derive_public_key(&sha256d(b"room access key"))?;

    // Session 1: create and flush.
    let mut setup = harness.view();
    let create = txn(
        alice,
        harness.fund(alice),
        group_meta(
            access,
            b"room",
            AccessGroupOperation::AddMembers,
            vec![base_member(bob)],
        ),
    );
    setup.connect_transaction(&create, tx_hash(1), 10, true)?;
    setup.flush()?;

    // Session 2: a second staged group joins the durable one.
    let mut view = harness.view();
    let lounge_access = derive_public_key(&sha256d(b"lounge access key"))?;
    let second = txn(
        alice,
        harness.fund(alice),
        group_meta(lounge_access, b"lounge", AccessGroupOperation::AddMembers, vec![]),
    );
    view.connect_transaction(&second, tx_hash(2), 11, true)?;

    let alice_groups = view.get_all_groups_for_user(&alice, 11)?;
    assert_eq!(alice_groups.len(), 3); // base + room (durable) + lounge (staged)

    let bob_groups = view.get_all_groups_for_user(&bob, 11)?;
    assert_eq!(bob_groups.len(), 2); // base + room via membership index
    assert!(bob_groups
        .iter()
        .any(|entry| entry.group_key_name == GroupKeyName::from_wire(b"room")));
    Ok(())
}

#[test]
fn mute_state_survives_flush_and_masks_on_reorg() -> Result<()> {
    let harness = Harness::post_fork();
    let (_, alice) = keypair(1);
    let (_, bob) = keypair(2);
    let access = derive_public_key(&sha256d(b"room access key"))?;
    let name = GroupKeyName::from_wire(b"room");

    // Session 1: create, mute, flush.
    let mut setup = harness.view();
    let create = txn(
        alice,
        harness.fund(alice),
        group_meta(
            access,
            b"room",
            AccessGroupOperation::AddMembers,
            vec![base_member(bob)],
        ),
    );
    setup.connect_transaction(&create, tx_hash(1), 10, true)?;
    let mute = txn(
        alice,
        harness.fund(alice),
        group_meta(
            access,
            b"room",
            AccessGroupOperation::MuteMembers,
            vec![base_member(bob)],
        ),
    );
    setup.connect_transaction(&mute, tx_hash(2), 11, true)?;
    setup.flush()?;

    // Session 2: durable mute is visible, and an unmute staged on top of it
    // masks the durable value within the session.
    let mut view = harness.view();
    assert!(view.is_member_muted(&alice, &name, &bob)?);
    let unmute = txn(
        alice,
        harness.fund(alice),
        group_meta(
            access,
            b"room",
            AccessGroupOperation::UnmuteMembers,
            vec![base_member(bob)],
        ),
    );
    let (_, _, ops) = view.connect_transaction(&unmute, tx_hash(3), 12, true)?;
    assert!(!view.is_member_muted(&alice, &name, &bob)?);

    // Reorg: the disconnect restores the durable mute.
    view.disconnect_transaction(&unmute, tx_hash(3), ops, 12)?;
    assert!(view.is_member_muted(&alice, &name, &bob)?);
    Ok(())
}

#[test]
fn many_transactions_disconnect_in_reverse_to_starting_state() -> Result<()> {
    let harness = Harness::post_fork();
    let baseline = harness.store.canonical_dump()?;
    let (_, alice) = keypair(1);
    let (_, bob) = keypair(2);
    let (_, carol) = keypair(4);
    let room_access = derive_public_key(&sha256d(b"room access key"))?;
    let lounge_access = derive_public_key(&sha256d(b"lounge access key"))?;
    let name = GroupKeyName::from_wire(b"room");

    let mut view = harness.view();
    let batch = vec![
        txn(
            alice,
            harness.fund(alice),
            group_meta(
                room_access,
                b"room",
                AccessGroupOperation::AddMembers,
                vec![base_member(bob)],
            ),
        ),
        txn(
            alice,
            harness.fund(alice),
            group_meta(lounge_access, b"lounge", AccessGroupOperation::AddMembers, vec![]),
        ),
        txn(
            alice,
            harness.fund(alice),
            members_meta(room_access, b"room", MemberOperation::Add, vec![base_member(carol)]),
        ),
        txn(
            alice,
            harness.fund(alice),
            group_meta(
                room_access,
                b"room",
                AccessGroupOperation::MuteMembers,
                vec![base_member(bob)],
            ),
        ),
        txn(
            alice,
            harness.fund(alice),
            attributes_meta(
                AttributeHolder::Group,
                HolderKey::Group(AccessGroupKey::new(alice, name)),
                AttributeOperation::Add,
                7,
                b"topic",
            ),
        ),
    ];

    let mut logs = Vec::new();
    for (index, transaction) in batch.iter().enumerate() {
        let height = 10 + index as u64;
        let (_, _, ops) =
            view.connect_transaction(transaction, tx_hash(10 + index as u8), height, true)?;
        logs.push(ops);
    }

    assert!(view.is_member_muted(&alice, &name, &bob)?);
    assert!(view.get_member(&alice, &name, &carol, 14)?.is_some());

    for (index, transaction) in batch.iter().enumerate().rev() {
        let height = 10 + index as u64;
        let ops = logs.pop().expect("one log per transaction");
        view.disconnect_transaction(transaction, tx_hash(10 + index as u8), ops, height)?;
    }

    view.flush()?;
    assert_eq!(harness.store.canonical_dump()?, baseline);
    Ok(())
}

#[test]
fn sled_backend_round_trips_a_session() -> Result<()> {
    let store = lib_access::SledStore::temporary()?;
    let utxos = MemoryUtxoStore::new();
    let params = ChainParams::all_forks_at_genesis();
    let (_, alice) = keypair(1);
    let (_, bob) = keypair(2);
    let access = derive_public_key(&sha256d(b"room access key"))?;
    let name = GroupKeyName::from_wire(b"room");

    let funding = OutPoint::new(TxHash::new([0xfd; 32]), 0);
    utxos.insert(funding, Utxo::new(1000, alice, 0));

    let mut view = AccessGroupView::new(&store, &utxos, params);
    let create = txn(
        alice,
        funding,
        group_meta(
            access,
            b"room",
            AccessGroupOperation::AddMembers,
            vec![base_member(bob)],
        ),
    );
    view.connect_transaction(&create, tx_hash(1), 10, true)?;
    view.flush()?;

    // A fresh session over the same sled tree observes the flushed state.
    let mut reloaded = AccessGroupView::new(&store, &utxos, params);
    let entry = reloaded.get_group(&alice, &name, 11)?.expect("durable group");
    assert_eq!(entry.access_public_key, access);
    assert!(reloaded.get_member(&alice, &name, &bob, 11)?.is_some());
    assert_eq!(reloaded.get_all_groups_for_user(&bob, 11)?.len(), 2);
    Ok(())
}

#[test]
fn disconnect_sanity_checks_are_fatal() -> Result<()> {
    let harness = Harness::post_fork();
    let (_, alice) = keypair(1);
    let access = derive_public_key(&sha256d(b"room access key"))?;

    let mut view = harness.view();
    let create = txn(
        alice,
        harness.fund(alice),
        group_meta(access, b"room", AccessGroupOperation::AddMembers, vec![]),
    );
    let (_, _, ops) = view.connect_transaction(&create, tx_hash(1), 10, true)?;

    // Operation log whose head is the wrong record kind.
    let wrong_kind = vec![ops[0].clone()]; // basic transfer only
    assert!(matches!(
        view.disconnect_transaction(&create, tx_hash(1), wrong_kind, 10),
        Err(RuleError::StagingCorrupted(_))
    ));

    // Empty operation log.
    assert!(matches!(
        view.disconnect_transaction(&create, tx_hash(1), Vec::new(), 10),
        Err(RuleError::StagingCorrupted(_))
    ));
    Ok(())
}

#[test]
fn mute_disconnect_requires_the_staged_attribute() -> Result<()> {
    let harness = Harness::post_fork();
    let (_, alice) = keypair(1);
    let (_, bob) = keypair(2);
    let access = derive_public_key(&sha256d(b"room access key"))?;

    let mut view = harness.view();
    let create = txn(
        alice,
        harness.fund(alice),
        group_meta(
            access,
            b"room",
            AccessGroupOperation::AddMembers,
            vec![base_member(bob)],
        ),
    );
    view.connect_transaction(&create, tx_hash(1), 10, true)?;

    let mute = txn(
        alice,
        harness.fund(alice),
        group_meta(
            access,
            b"room",
            AccessGroupOperation::MuteMembers,
            vec![base_member(bob)],
        ),
    );
    let (_, _, ops) = view.connect_transaction(&mute, tx_hash(2), 11, true)?;

    // First disconnect unwinds the mute; replaying the same operation log
    // finds no staged attribute to roll back, which is fatal.
    view.disconnect_transaction(&mute, tx_hash(2), ops.clone(), 11)?;
    assert!(matches!(
        view.disconnect_transaction(&mute, tx_hash(2), ops, 11),
        Err(RuleError::StagingCorrupted(_))
    ));
    Ok(())
}

#[test]
fn basic_transfer_only_transactions_connect_and_disconnect() -> Result<()> {
    let harness = Harness::post_fork();
    let (_, alice) = keypair(1);

    let mut view = harness.view();
    let funding = harness.fund(alice);
    let transfer = txn(alice, funding, TxnMeta::BasicTransfer);
    let (total_in, total_out, ops) = view.connect_transaction(&transfer, tx_hash(1), 10, true)?;
    assert_eq!((total_in, total_out), (1000, 900));
    assert_eq!(ops.len(), 1);
    assert!(view.get_utxo(&funding)?.is_none());

    view.disconnect_transaction(&transfer, tx_hash(1), ops, 10)?;
    assert_eq!(view.get_utxo(&funding)?.expect("restored").amount, 1000);
    Ok(())
}
