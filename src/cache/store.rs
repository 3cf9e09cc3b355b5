//! Two-tier list cache.
//!
//! Reads try the in-memory LRU tier first and fall back to the persistent
//! tier, promoting what they find. Writes go to both tiers; a failing
//! persistent write leaves the in-memory tier authoritative for the session.
//! Neither path ever returns an error to the caller.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use lru::LruCache;
use metrics::counter;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::util::clock::now_millis;

use super::config::CacheConfig;
use super::entry::CacheEntry;
use super::lock::{rw_read, rw_write};
use super::persist::KeyValueStore;

const SOURCE: &str = "cache::store";

const METRIC_HIT: &str = "sourcedeck_list_cache_hit_total";
const METRIC_MISS: &str = "sourcedeck_list_cache_miss_total";
const METRIC_PERSIST_ERROR: &str = "sourcedeck_list_cache_persist_error_total";

pub struct ListCache {
    memory: RwLock<LruCache<String, Value>>,
    persistent: Option<Arc<dyn KeyValueStore>>,
}

impl ListCache {
    /// Create a cache writing through to `persistent`.
    pub fn new(config: &CacheConfig, persistent: Arc<dyn KeyValueStore>) -> Self {
        Self {
            memory: RwLock::new(LruCache::new(config.memory_limit_non_zero())),
            persistent: Some(persistent),
        }
    }

    /// Create a cache with no persistent tier.
    pub fn memory_only(config: &CacheConfig) -> Self {
        Self {
            memory: RwLock::new(LruCache::new(config.memory_limit_non_zero())),
            persistent: None,
        }
    }

    /// Look up an entry; missing or undecodable entries read as `None`.
    pub fn get_entry<T: DeserializeOwned>(&self, key: &str) -> Option<CacheEntry<T>> {
        let cached = rw_write(&self.memory, SOURCE, "get_entry.memory")
            .get(key)
            .cloned();

        if let Some(value) = cached {
            return match serde_json::from_value(value) {
                Ok(entry) => {
                    counter!(METRIC_HIT, "tier" => "memory").increment(1);
                    Some(entry)
                }
                Err(err) => {
                    warn!(key, error = %err, "Discarding undecodable in-memory list entry");
                    rw_write(&self.memory, SOURCE, "get_entry.evict").pop(key);
                    counter!(METRIC_MISS).increment(1);
                    None
                }
            };
        }

        let Some(entry) = self.read_persistent(key) else {
            counter!(METRIC_MISS).increment(1);
            return None;
        };

        counter!(METRIC_HIT, "tier" => "persistent").increment(1);
        Some(entry)
    }

    fn read_persistent<T: DeserializeOwned>(&self, key: &str) -> Option<CacheEntry<T>> {
        let persistent = self.persistent.as_ref()?;

        let raw = match persistent.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                warn!(key, error = %err, "Persistent list cache read failed");
                return None;
            }
        };

        let value: Value = match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(err) => {
                debug!(key, error = %err, "Persistent list entry is not valid JSON");
                return None;
            }
        };

        match serde_json::from_value::<CacheEntry<T>>(value.clone()) {
            Ok(entry) => {
                rw_write(&self.memory, SOURCE, "get_entry.promote").put(key.to_string(), value);
                Some(entry)
            }
            Err(err) => {
                debug!(key, error = %err, "Persistent list entry has unexpected shape");
                None
            }
        }
    }

    /// Store an entry in both tiers. Persistent failures are logged and dropped.
    pub fn set_entry<T: Serialize>(&self, key: &str, entry: &CacheEntry<T>) {
        let value = match serde_json::to_value(entry) {
            Ok(value) => value,
            Err(err) => {
                warn!(key, error = %err, "List entry is not serializable; skipping cache write");
                return;
            }
        };

        let encoded = self.persistent.as_ref().map(|_| value.to_string());
        rw_write(&self.memory, SOURCE, "set_entry").put(key.to_string(), value);

        if let (Some(persistent), Some(encoded)) = (self.persistent.as_ref(), encoded) {
            if let Err(err) = persistent.set(key, &encoded) {
                counter!(METRIC_PERSIST_ERROR).increment(1);
                warn!(key, error = %err, "Persistent list cache write failed; keeping in-memory entry");
            }
        }
    }

    /// Drop every in-memory entry. The persistent tier is untouched.
    pub fn clear_memory(&self) {
        rw_write(&self.memory, SOURCE, "clear_memory").clear();
    }

    /// Number of entries in the in-memory tier.
    pub fn memory_len(&self) -> usize {
        rw_read(&self.memory, SOURCE, "memory_len").len()
    }
}

/// Whether `entry` exists and was written less than `ttl` ago.
pub fn is_fresh<T>(entry: Option<&CacheEntry<T>>, ttl: Duration) -> bool {
    is_fresh_at(entry, ttl, now_millis())
}

/// [`is_fresh`] evaluated against an explicit `now` in epoch milliseconds.
pub fn is_fresh_at<T>(entry: Option<&CacheEntry<T>>, ttl: Duration, now: i64) -> bool {
    let Some(entry) = entry else {
        return false;
    };
    let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
    now.saturating_sub(entry.timestamp) < ttl_ms
}
