//! Deterministic SHA-256 hashing over canonicalized data.
//!
//! Any serializable value is first lowered to a `serde_json::Value`, object
//! keys are sorted at every depth, and the result is written as compact JSON.
//! Two values that differ only in map key order produce identical bytes and
//! therefore identical digests. Nothing here reads a clock or a random source.

use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Length of a hex-encoded SHA-256 digest.
pub const DIGEST_HEX_LEN: usize = 64;

/// Lower `data` to its canonical JSON value (objects sorted by key).
pub fn canonical_value<T: Serialize + ?Sized>(data: &T) -> Result<Value> {
    let value = serde_json::to_value(data).map_err(|e| Error::Encoding(e.to_string()))?;
    Ok(sort_keys(value))
}

/// Canonical byte encoding of `data`.
pub fn canonical_bytes<T: Serialize + ?Sized>(data: &T) -> Result<Vec<u8>> {
    let value = canonical_value(data)?;
    serde_json::to_vec(&value).map_err(|e| Error::Encoding(e.to_string()))
}

/// SHA-256 of the canonical encoding of `data`, as lowercase hex.
pub fn digest<T: Serialize + ?Sized>(data: &T) -> Result<String> {
    Ok(digest_bytes(&canonical_bytes(data)?))
}

/// SHA-256 of raw bytes, as lowercase hex.
pub fn digest_bytes(bytes: &[u8]) -> String {
    hex_encode(&Sha256::digest(bytes))
}

/// Raw SHA-256 of raw bytes.
pub fn digest_raw(bytes: &[u8]) -> [u8; 32] {
    Sha256::digest(bytes).into()
}

/// True if `s` looks like a digest produced by this module.
pub fn is_hex_digest(s: &str) -> bool {
    s.len() == DIGEST_HEX_LEN && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = Map::with_capacity(entries.len());
            for (k, v) in entries {
                sorted.insert(k, sort_keys(v));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    const HEX_CHARS: &[u8; 16] = b"0123456789abcdef";
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        s.push(HEX_CHARS[(b >> 4) as usize] as char);
        s.push(HEX_CHARS[(b & 0x0f) as usize] as char);
    }
    s
}
