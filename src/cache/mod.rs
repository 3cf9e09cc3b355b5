//! List cache.
//!
//! Two tiers keyed by `list:<baseKey>:<filterHash>`:
//!
//! - **Memory**: an LRU map of parsed entries, lifetime of the process
//! - **Persistent**: any [`KeyValueStore`], e.g. [`FileKvStore`]
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! memory_limit = 256
//! persist = true
//! # ... see config.rs for all options
//! ```

mod config;
mod entry;
mod keys;
pub(crate) mod lock;
mod persist;
mod store;

pub use config::CacheConfig;
pub use entry::{CacheEntry, ListPage, Pagination};
pub use keys::{LIST_KEY_PREFIX, build_list_cache_key, list_storage_key};
pub use persist::{FileKvStore, KeyValueStore, MemoryKvStore, StoreError};
pub use store::{ListCache, is_fresh, is_fresh_at};
