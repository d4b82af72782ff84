//! Entry Extra-Data
//!
//! Free-form `string -> bytes` annotations carried on group entries.
//! A BTreeMap keeps the serialized form deterministic, which the
//! operation-record deep copies depend on.

use std::collections::BTreeMap;

/// Extra-data mapping attached to entries and transactions
pub type ExtraData = BTreeMap<String, Vec<u8>>;

/// Extra-data key of the rotating-version scalar on group entries
pub const MESSAGE_ROTATING_VERSION: &str = "MessageRotatingVersion";

/// Key-wise right-biased merge: values from `update` win over `existing`.
pub fn merge_extra_data(existing: Option<&ExtraData>, update: &ExtraData) -> ExtraData {
    let mut merged = existing.cloned().unwrap_or_default();
    for (key, value) in update {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

/// Encode a u64 scalar for storage inside extra-data (big-endian, 8 bytes).
pub fn encode_u64(value: u64) -> Vec<u8> {
    value.to_be_bytes().to_vec()
}

/// Decode a u64 scalar from extra-data bytes. Returns None when the payload
/// is not exactly 8 bytes.
pub fn decode_u64(bytes: &[u8]) -> Option<u64> {
    let arr: [u8; 8] = bytes.try_into().ok()?;
    Some(u64::from_be_bytes(arr))
}
