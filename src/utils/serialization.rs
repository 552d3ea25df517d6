// src/utils/serialization.rs
//! Serialization utilities for the DID system.
//!
//! Everything that gets signed, hashed or content-addressed goes through
//! [`to_canonical_bytes`]: compact JSON with object keys sorted at every
//! level, so two equal values always produce identical bytes.

use serde::Serialize;
use serde_json::{Map, Value};

/// Serializes a value to canonical JSON bytes.
///
/// Keys are re-inserted in sorted order, which keeps the output stable even
/// when `serde_json` is built with `preserve_order`.
pub fn to_canonical_bytes<T: Serialize>(data: &T) -> Result<Vec<u8>, serde_json::Error> {
    let value = canonicalize(serde_json::to_value(data)?);
    serde_json::to_vec(&value)
}

/// Canonical JSON as a string.
pub fn to_canonical_string<T: Serialize>(data: &T) -> Result<String, serde_json::Error> {
    let value = canonicalize(serde_json::to_value(data)?);
    serde_json::to_string(&value)
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = Map::new();
            for (key, value) in entries {
                sorted.insert(key, canonicalize(value));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// Uppercase hex, the form ledger blob fields use.
pub fn to_ledger_hex(data: &[u8]) -> String {
    hex::encode_upper(data)
}

/// Decodes hex in either case.
pub fn from_hex(data: &str) -> Result<Vec<u8>, hex::FromHexError> {
    hex::decode(data)
}
