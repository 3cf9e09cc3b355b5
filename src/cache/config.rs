//! List cache configuration.
//!
//! Controls the in-memory tier and the persistent tier via `sourcedeck.toml`:
//!
//! ```toml
//! [cache]
//! memory_limit = 256
//! persist = true
//! directory = ".sourcedeck/cache"
//! quota_bytes = 5242880
//! ```

use std::num::NonZeroUsize;
use std::path::PathBuf;

use serde::Deserialize;

const DEFAULT_MEMORY_LIMIT: usize = 256;
const DEFAULT_DIRECTORY: &str = ".sourcedeck/cache";
// Mirrors the usual per-origin browser storage allowance.
const DEFAULT_QUOTA_BYTES: u64 = 5 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum entries held in the in-memory tier.
    pub memory_limit: usize,
    /// Write entries through to the persistent tier.
    pub persist: bool,
    /// Directory of the file-backed persistent tier.
    pub directory: PathBuf,
    /// Byte ceiling for the persistent tier; `None` disables the check.
    pub quota_bytes: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory_limit: DEFAULT_MEMORY_LIMIT,
            persist: true,
            directory: PathBuf::from(DEFAULT_DIRECTORY),
            quota_bytes: Some(DEFAULT_QUOTA_BYTES),
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            memory_limit: settings.memory_limit.get(),
            persist: settings.persist,
            directory: settings.directory.clone(),
            quota_bytes: settings.quota_bytes,
        }
    }
}

impl CacheConfig {
    /// Returns the memory limit as NonZeroUsize, clamping to 1 if zero.
    pub fn memory_limit_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.memory_limit).unwrap_or(NonZeroUsize::MIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert_eq!(config.memory_limit, 256);
        assert!(config.persist);
        assert_eq!(config.directory, PathBuf::from(".sourcedeck/cache"));
        assert_eq!(config.quota_bytes, Some(5 * 1024 * 1024));
    }

    #[test]
    fn non_zero_clamps_to_min() {
        let config = CacheConfig {
            memory_limit: 0,
            ..Default::default()
        };
        assert_eq!(config.memory_limit_non_zero().get(), 1);
    }
}
