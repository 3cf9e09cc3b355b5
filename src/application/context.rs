use std::sync::Arc;

use tracing::{debug, warn};

use crate::{
    cache::{CacheConfig, FileKvStore, ListCache},
    config::Settings,
    infra::http_source::HttpListSource,
    pipeline::PipelineOptions,
};

use super::error::AppError;

/// Everything a command needs: resolved settings and the shared list cache.
pub struct CommandContext {
    settings: Settings,
    cache: Arc<ListCache>,
}

impl CommandContext {
    pub fn new(settings: Settings, cache: Arc<ListCache>) -> Self {
        Self { settings, cache }
    }

    /// Open the list cache described by `settings`.
    ///
    /// A persistent directory that cannot be opened degrades to a memory-only
    /// cache for this run.
    pub fn from_settings(settings: Settings) -> Self {
        let config = CacheConfig::from(&settings.cache);
        let cache = if config.persist {
            match FileKvStore::open(&config.directory, config.quota_bytes) {
                Ok(store) => {
                    debug!(directory = %config.directory.display(), "Opened persistent list cache");
                    ListCache::new(&config, Arc::new(store))
                }
                Err(err) => {
                    warn!(
                        directory = %config.directory.display(),
                        error = %err,
                        "Persistent list cache unavailable; using memory only"
                    );
                    ListCache::memory_only(&config)
                }
            }
        } else {
            ListCache::memory_only(&config)
        };

        Self::new(settings, Arc::new(cache))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn cache(&self) -> &Arc<ListCache> {
        &self.cache
    }

    pub fn source(&self, path: &str) -> Result<HttpListSource, AppError> {
        let path = path.trim().trim_start_matches('/');
        if path.is_empty() {
            return Err(AppError::validation("list path must not be empty"));
        }
        Ok(HttpListSource::new(&self.settings.api, path)?)
    }

    /// Pipeline options for `path`, keyed by the path itself.
    pub fn pipeline_options<I>(&self, path: &str) -> PipelineOptions<I> {
        PipelineOptions::new(cache_base(path))
            .ttl(self.settings.pipeline.ttl)
            .page_size(self.settings.pipeline.page_size.get())
    }
}

/// Base cache key for a collection path.
pub fn cache_base(path: &str) -> String {
    path.trim().trim_matches('/').to_string()
}
