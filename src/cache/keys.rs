//! List cache key derivation.
//!
//! Keys have the shape `list:<baseKey>:<filterHash>`. Two pipelines using the
//! same base key and equal filters share one entry.

use serde::Serialize;

use crate::util::stable_json::filter_hash;

/// Namespace prefix of every list cache key.
pub const LIST_KEY_PREFIX: &str = "list";

/// Join a base key and a filter hash into a storage key.
pub fn build_list_cache_key(base_key: &str, filter_hash: &str) -> String {
    format!("{LIST_KEY_PREFIX}:{base_key}:{filter_hash}")
}

/// Derive the storage key for `filters` under `base_key`.
pub fn list_storage_key<F: Serialize + ?Sized>(
    base_key: &str,
    filters: &F,
) -> Result<String, serde_json::Error> {
    let hash = filter_hash(filters)?;
    Ok(build_list_cache_key(base_key, &hash))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn key_is_plain_concatenation() {
        assert_eq!(build_list_cache_key("items", "abc123"), "list:items:abc123");
        assert_eq!(build_list_cache_key("", ""), "list::");
    }

    #[test]
    fn equal_filters_share_a_key() {
        let one = list_storage_key("items", &json!({"status": "active", "page": 1}))
            .expect("serializable");
        let two = list_storage_key("items", &json!({"page": 1, "status": "active"}))
            .expect("serializable");
        assert_eq!(one, two);
        assert!(one.starts_with("list:items:"));
    }

    #[test]
    fn base_key_partitions_entries() {
        let filters = json!({"status": "active"});
        assert_ne!(
            list_storage_key("items", &filters).expect("serializable"),
            list_storage_key("schemes", &filters).expect("serializable")
        );
    }
}
