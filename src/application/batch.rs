use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::{
    cache::{CacheEntry, list_storage_key},
    concurrency::{AsyncQueue, RetryPolicy, retry_with_backoff, run_queue_with_concurrency},
    infra::http_source::QueryFilters,
    pipeline::{FetchError, fetch_page},
};

use super::{
    context::{CommandContext, cache_base},
    error::AppError,
};

/// Outcome of fetching one path in a batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchItem {
    pub path: String,
    pub key: String,
    pub items: Option<usize>,
    pub has_more: Option<bool>,
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

impl BatchItem {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Fetch the unfiltered first page of every path and write it to the cache.
///
/// Paths are drained from an [`AsyncQueue`] by `batch.concurrency` workers.
/// Transient failures are retried with linear backoff; a path that still
/// fails is reported in its [`BatchItem`] without stopping the others.
pub async fn run_batch(ctx: &CommandContext, paths: Vec<String>) -> Result<Vec<BatchItem>, AppError> {
    let batch = &ctx.settings().batch;
    let policy = RetryPolicy::new(batch.retries).with_base_delay(batch.base_delay);
    let page_size = ctx.settings().pipeline.page_size.get();
    let filters = QueryFilters::new();

    let queue = AsyncQueue::new();
    for path in paths {
        queue.push(path);
    }
    queue.close();

    let results = Mutex::new(Vec::new());
    let results_ref = &results;
    let filters_ref = &filters;

    run_queue_with_concurrency(&queue, batch.concurrency.get(), |path: String| async move {
        let item = fetch_one(ctx, path, filters_ref, policy, page_size).await;
        results_ref
            .lock()
            .map_err(|_| AppError::unexpected("batch result lock poisoned"))?
            .push(item);
        Ok::<(), AppError>(())
    })
    .await?;

    let mut results = results
        .into_inner()
        .map_err(|_| AppError::unexpected("batch result lock poisoned"))?;
    results.sort_by(|a, b| a.path.cmp(&b.path));

    let failed = results.iter().filter(|item| !item.is_ok()).count();
    info!(
        paths = results.len(),
        failed,
        concurrency = batch.concurrency.get(),
        "Batch command completed"
    );

    Ok(results)
}

async fn fetch_one(
    ctx: &CommandContext,
    path: String,
    filters: &QueryFilters,
    policy: RetryPolicy,
    page_size: u64,
) -> BatchItem {
    let started = Instant::now();
    let failed = |path: String, key: String, error: String| {
        warn!(path = %path, error = %error, "Batch fetch failed");
        BatchItem {
            path,
            key,
            items: None,
            has_more: None,
            error: Some(error),
            elapsed_ms: started.elapsed().as_millis() as u64,
        }
    };

    let key = match list_storage_key(&cache_base(&path), filters) {
        Ok(key) => key,
        Err(err) => return failed(path, String::new(), format!("failed to derive cache key: {err}")),
    };
    let source = match ctx.source(&path) {
        Ok(source) => Arc::new(source),
        Err(err) => return failed(path, key, err.to_string()),
    };

    let fetched = retry_with_backoff(
        || fetch_page(source.as_ref(), filters, 0, page_size),
        policy,
        FetchError::is_transient,
    )
    .await;

    match fetched {
        Ok(page) => {
            let item = BatchItem {
                path,
                key: key.clone(),
                items: Some(page.items.len()),
                has_more: Some(page.pagination.has_more),
                error: None,
                elapsed_ms: started.elapsed().as_millis() as u64,
            };
            let filters = serde_json::to_value(filters).unwrap_or(Value::Null);
            ctx.cache().set_entry(&key, &CacheEntry::new(page, filters));
            item
        }
        Err(err) => failed(path, key, err.to_string()),
    }
}
