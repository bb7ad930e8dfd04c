use serde_json::Value;
use sha2::{Digest, Sha256};

// ---------------------------------------------------------------------------
// Item: an opaque structured content value
// ---------------------------------------------------------------------------

/// A single content item. Items are opaque JSON-like values; the engine only
/// looks inside them for the identity field and for schema validation.
pub type Item = Value;

/// Stable identity of an item, if it exposes one.
///
/// Only records carrying `field` as a string or a number are identified.
/// Strings are kept as they are and numbers get a `#` prefix, so `{"id": 7}`
/// has identity `"#7"` and never collides with `{"id": "7"}`. A string that
/// itself starts with `#` gets one more, keeping the two spaces disjoint.
pub fn identity_of(item: &Item, field: &str) -> Option<String> {
    match item.as_object()?.get(field)? {
        Value::String(s) if s.starts_with(NUMBER_IDENTITY_PREFIX) => {
            Some(format!("{}{}", NUMBER_IDENTITY_PREFIX, s))
        }
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(format!("{}{}", NUMBER_IDENTITY_PREFIX, n)),
        _ => None,
    }
}

const NUMBER_IDENTITY_PREFIX: char = '#';

/// Keys of two records whose values differ, in key order.
///
/// Returns `None` unless both items are records.
pub fn changed_fields(old: &Item, new: &Item) -> Option<Vec<String>> {
    let (old, new) = (old.as_object()?, new.as_object()?);
    let mut keys: Vec<&String> = old.keys().chain(new.keys()).collect();
    keys.sort();
    keys.dedup();
    Some(
        keys.into_iter()
            .filter(|k| old.get(k.as_str()) != new.get(k.as_str()))
            .cloned()
            .collect(),
    )
}

/// SHA-256 over the canonical JSON encoding of a content sequence, hex encoded.
///
/// `serde_json` keeps object keys sorted, so equal content always hashes equal.
pub fn content_hash(items: &[Item]) -> String {
    let mut hasher = Sha256::new();
    for item in items {
        hasher.update(item.to_string().as_bytes());
        hasher.update([0u8]);
    }
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}
