use serde::Serialize;
use serde_json::Value;

use crate::{
    cache::{CacheEntry, ListPage, is_fresh, list_storage_key},
    config::CacheShowArgs,
    infra::http_source::QueryFilters,
    util::clock::now_millis,
};

use super::{
    context::{CommandContext, cache_base},
    error::AppError,
};

#[derive(Debug, Serialize)]
pub struct CacheReport {
    pub key: String,
    pub present: bool,
    pub fresh: bool,
    /// Milliseconds since the entry was written.
    pub age_ms: Option<i64>,
    pub entry: Option<CacheEntry<ListPage<Value>>>,
}

/// Look up the cached first page for `path` and `filters` without fetching.
pub fn show_entry(
    ctx: &CommandContext,
    path: &str,
    filters: &QueryFilters,
) -> Result<CacheReport, AppError> {
    let base = cache_base(path);
    if base.is_empty() {
        return Err(AppError::validation("list path must not be empty"));
    }
    let key = list_storage_key(&base, filters)
        .map_err(|err| AppError::unexpected(format!("failed to derive cache key: {err}")))?;

    let entry = ctx.cache().get_entry::<ListPage<Value>>(&key);
    let fresh = is_fresh(entry.as_ref(), ctx.settings().pipeline.ttl);
    let age_ms = entry
        .as_ref()
        .map(|entry| now_millis().saturating_sub(entry.timestamp));

    Ok(CacheReport {
        key,
        present: entry.is_some(),
        fresh,
        age_ms,
        entry,
    })
}

pub fn show_entry_for(ctx: &CommandContext, args: &CacheShowArgs) -> Result<CacheReport, AppError> {
    let filters: QueryFilters = args.filters.iter().cloned().collect();
    show_entry(ctx, &args.path, &filters)
}
