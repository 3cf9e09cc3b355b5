use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{
    config::ListArgs,
    infra::http_source::QueryFilters,
    pipeline::{ListPipeline, ListStatus, LoadMoreOutcome, RefreshOutcome},
};

use super::{context::CommandContext, error::AppError};

/// One list query as issued from the command line.
#[derive(Debug, Clone)]
pub struct ListRequest {
    pub path: String,
    pub filters: QueryFilters,
    /// Keep paging until the collection is exhausted.
    pub all: bool,
    /// Trust a fresh cached page instead of revalidating it.
    pub cached_only: bool,
}

impl From<&ListArgs> for ListRequest {
    fn from(args: &ListArgs) -> Self {
        Self {
            path: args.path.clone(),
            filters: args.filters.iter().cloned().collect(),
            all: args.all,
            cached_only: args.cached,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListReport {
    pub key: Option<String>,
    pub status: ListStatus,
    /// The first page came from the cache without a successful revalidation.
    pub served_from_cache: bool,
    /// Revalidation error when stale cached items were printed instead.
    pub error: Option<String>,
    pub pages: usize,
    pub has_more: bool,
    pub next_offset: u64,
    pub total: Option<u64>,
    pub items: Vec<Value>,
}

/// Sync one query through a [`ListPipeline`], optionally paging to the end.
///
/// A failed revalidation is tolerated when cached items are available; a
/// failed cold load or page append is returned as an error.
pub async fn run_list(ctx: &CommandContext, request: ListRequest) -> Result<ListReport, AppError> {
    let source = Arc::new(ctx.source(&request.path)?);
    let options = ctx
        .pipeline_options(&request.path)
        .skip_refresh_if_cached(request.cached_only);
    let pipeline = ListPipeline::new(source, Arc::clone(ctx.cache()), options, request.filters);

    let mut pages = 0;
    let mut served_from_cache = false;
    match pipeline.activate().await {
        RefreshOutcome::Committed { .. } => pages = 1,
        RefreshOutcome::ServedFromCache { .. } => {
            pages = 1;
            served_from_cache = true;
        }
        RefreshOutcome::Failed(err) => {
            if pipeline.items().is_empty() {
                return Err(err.into());
            }
            warn!(path = %request.path, error = %err, "Revalidation failed; printing cached items");
            pages = 1;
            served_from_cache = true;
        }
        outcome @ (RefreshOutcome::Unchanged
        | RefreshOutcome::Discarded
        | RefreshOutcome::Unmounted) => {
            return Err(AppError::unexpected(format!(
                "list pipeline did not sync: {outcome:?}"
            )));
        }
    }

    if request.all {
        loop {
            match pipeline.load_more().await {
                LoadMoreOutcome::Appended { added: 0 } => break,
                LoadMoreOutcome::Appended { added } => {
                    pages += 1;
                    debug!(path = %request.path, added, pages, "Appended page");
                }
                LoadMoreOutcome::Skipped | LoadMoreOutcome::Discarded => break,
                LoadMoreOutcome::Failed(err) => return Err(err.into()),
            }
        }
    }

    let snapshot = pipeline.snapshot();
    info!(
        path = %request.path,
        items = snapshot.items.len(),
        pages,
        served_from_cache,
        "List command completed"
    );

    Ok(ListReport {
        key: pipeline.storage_key(),
        status: snapshot.status,
        served_from_cache,
        error: snapshot.error,
        pages,
        has_more: snapshot.has_more,
        next_offset: snapshot.next_offset,
        total: snapshot.total,
        items: snapshot.items,
    })
}
