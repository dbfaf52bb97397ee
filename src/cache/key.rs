//! Deterministic cache keys
//!
//! A key is derived from the operation name and its arguments. Arguments are
//! serialized to JSON and canonicalized before hashing: object members are
//! sorted by name at every depth and `null` members are dropped, so logically
//! equal argument sets always produce the same key.

use std::fmt::{self, Write as _};

use serde::Serialize;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

use super::CacheError;

/// Prefix shared by every key this service writes
const KEY_PREFIX: &str = "cache:";

/// A cache key for one operation invocation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    operation: String,
    key: String,
}

impl CacheKey {
    /// Builds the key for `operation` invoked with `args`
    ///
    /// # Returns
    /// * `Ok(CacheKey)` - `cache:` followed by the hex SHA-256 of the canonical form
    /// * `Err(CacheError::Serialization)` - If `args` cannot be serialized
    pub fn new<A: Serialize + ?Sized>(operation: &str, args: &A) -> Result<Self, CacheError> {
        let args = canonicalize(serde_json::to_value(args)?);
        let canonical = json!({ "op": operation, "args": args });
        let text = serde_json::to_string(&canonical)?;

        Ok(Self {
            operation: operation.to_string(),
            key: format!("{}{}", KEY_PREFIX, sha256_hex(&text)),
        })
    }

    /// The operation this key belongs to
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// The backend key string
    pub fn as_str(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

/// Rewrites a JSON value into canonical form
///
/// Object members are re-inserted in sorted order and members whose value is
/// `null` are removed. Array order is preserved since it is significant.
pub fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map
                .into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, canonicalize(v)))
                .collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));

            let mut sorted = Map::new();
            for (k, v) in entries {
                sorted.insert(k, v);
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

fn sha256_hex(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest.iter() {
        let _ = write!(&mut out, "{byte:02x}");
    }
    out
}
