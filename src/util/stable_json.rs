//! Canonical JSON rendering for filter objects.
//!
//! Object keys are emitted in sorted order at every depth so that two filter
//! sets that are structurally equal always produce the same string, no matter
//! how their maps were built. Array order is significant and kept as-is.
//!
//! Fields a `Serialize` impl skips never reach the output. Explicit `null`
//! values are kept.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Number of digest bytes kept in a filter hash.
const FILTER_HASH_BYTES: usize = 16;

/// Serialize `value` into its canonical JSON form.
pub fn stable_stringify<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    let value = serde_json::to_value(value)?;
    Ok(canonicalize(&value))
}

/// Render an already-built JSON value canonically.
pub fn canonicalize(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

/// Short, process-independent digest of a filter object.
///
/// Hex of the leading bytes of SHA-256 over the canonical rendering.
pub fn filter_hash<T: Serialize + ?Sized>(filters: &T) -> Result<String, serde_json::Error> {
    let canonical = stable_stringify(filters)?;
    Ok(hash_canonical(&canonical))
}

pub fn hash_canonical(canonical: &str) -> String {
    let digest = Sha256::digest(canonical.as_bytes());
    hex::encode(&digest[..FILTER_HASH_BYTES])
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.as_bytes().cmp(b.as_bytes()));

            out.push('{');
            for (index, (key, member)) in entries.into_iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_string(out, key);
                out.push(':');
                write_value(out, member);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::String(text) => write_string(out, text),
        Value::Number(number) => out.push_str(&number.to_string()),
        Value::Bool(flag) => out.push_str(if *flag { "true" } else { "false" }),
        Value::Null => out.push_str("null"),
    }
}

fn write_string(out: &mut String, text: &str) {
    // A `Value::String` always serializes.
    match serde_json::to_string(text) {
        Ok(escaped) => out.push_str(&escaped),
        Err(_) => out.push_str("\"\""),
    }
}
