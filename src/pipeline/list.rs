use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, instrument, warn};

use crate::cache::lock::{mutex_lock, rw_read, rw_write};
use crate::cache::{CacheEntry, ListCache, ListPage, Pagination, is_fresh, list_storage_key};

use super::messages::{DEFAULT_LOAD_ERROR, describe_fetch_error};
use super::source::{FetchError, ListSource, fetch_page};
use super::state::{ListSnapshot, ListStatus, LoadMoreOutcome, RefreshOutcome};

const SOURCE: &str = "pipeline::list";

const METRIC_DISCARDED: &str = "sourcedeck_pipeline_discarded_total";
const METRIC_FETCH_MS: &str = "sourcedeck_pipeline_fetch_ms";

const DEFAULT_TTL: Duration = Duration::from_secs(60);
const DEFAULT_PAGE_SIZE: u64 = 20;

/// Called with the cached entry whenever a fresh cache hit is rendered.
pub type CacheHitHook<I> = Arc<dyn Fn(&CacheEntry<ListPage<I>>) + Send + Sync>;

/// Turns a fetch failure and a fallback into the message stored in `error`.
pub type ErrorMessageFn = Arc<dyn Fn(&FetchError, &str) -> String + Send + Sync>;

/// Per-pipeline settings supplied by the caller.
pub struct PipelineOptions<I> {
    /// Base key; entries live under `list:<cache_key>:<filter hash>`.
    pub cache_key: String,
    pub ttl: Duration,
    pub page_size: u64,
    /// Serve a fresh cache hit without revalidating it.
    pub skip_refresh_if_cached: bool,
    pub on_cache_hit: Option<CacheHitHook<I>>,
    pub error_message: ErrorMessageFn,
}

impl<I> PipelineOptions<I> {
    pub fn new(cache_key: impl Into<String>) -> Self {
        Self {
            cache_key: cache_key.into(),
            ttl: DEFAULT_TTL,
            page_size: DEFAULT_PAGE_SIZE,
            skip_refresh_if_cached: false,
            on_cache_hit: None,
            error_message: Arc::new(describe_fetch_error),
        }
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Page size, clamped to at least 1.
    pub fn page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn skip_refresh_if_cached(mut self, skip: bool) -> Self {
        self.skip_refresh_if_cached = skip;
        self
    }

    pub fn on_cache_hit(mut self, hook: CacheHitHook<I>) -> Self {
        self.on_cache_hit = Some(hook);
        self
    }

    pub fn error_message(mut self, mapper: ErrorMessageFn) -> Self {
        self.error_message = mapper;
        self
    }
}

impl<I> fmt::Debug for PipelineOptions<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineOptions")
            .field("cache_key", &self.cache_key)
            .field("ttl", &self.ttl)
            .field("page_size", &self.page_size)
            .field("skip_refresh_if_cached", &self.skip_refresh_if_cached)
            .field("on_cache_hit", &self.on_cache_hit.is_some())
            .finish_non_exhaustive()
    }
}

struct PipelineState<I, F> {
    filters: F,
    items: Vec<I>,
    status: ListStatus,
    error: Option<String>,
    pagination: Pagination,
    total: Option<u64>,
    load_more_error: Option<String>,
    /// Storage key of the last query the pipeline synced to.
    synced_key: Option<String>,
}

impl<I, F> PipelineState<I, F> {
    fn apply_page(&mut self, page: ListPage<I>) {
        self.items = page.items;
        self.pagination = page.pagination;
        self.total = page.total;
    }

    fn clear_items(&mut self) {
        self.items.clear();
        self.pagination = Pagination::default();
        self.total = None;
    }
}

struct Inner<S: ListSource> {
    source: RwLock<Arc<S>>,
    cache: Arc<ListCache>,
    options: PipelineOptions<S::Item>,
    state: Mutex<PipelineState<S::Item, S::Filters>>,
    generation: AtomicU64,
    mounted: AtomicBool,
    loading_more: AtomicBool,
    snapshots: watch::Sender<ListSnapshot<S::Item, S::Filters>>,
}

/// Stateful, cache-aware view over one paginated collection.
///
/// Cloning yields another handle to the same pipeline.
pub struct ListPipeline<S: ListSource> {
    inner: Arc<Inner<S>>,
}

impl<S: ListSource> Clone for ListPipeline<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: ListSource> ListPipeline<S> {
    /// Create an idle pipeline. Nothing is read or fetched until
    /// [`activate`](Self::activate).
    pub fn new(
        source: Arc<S>,
        cache: Arc<ListCache>,
        options: PipelineOptions<S::Item>,
        initial_filters: S::Filters,
    ) -> Self {
        let state = PipelineState {
            filters: initial_filters,
            items: Vec::new(),
            status: ListStatus::Idle,
            error: None,
            pagination: Pagination::default(),
            total: None,
            load_more_error: None,
            synced_key: None,
        };
        let initial = snapshot_of(&state, false);
        let (snapshots, _) = watch::channel(initial);

        Self {
            inner: Arc::new(Inner {
                source: RwLock::new(source),
                cache,
                options,
                state: Mutex::new(state),
                generation: AtomicU64::new(0),
                mounted: AtomicBool::new(true),
                loading_more: AtomicBool::new(false),
                snapshots,
            }),
        }
    }

    /// Sync to the current filters: serve a fresh cache entry if there is one,
    /// then fetch the first page unless configured to trust the cache.
    ///
    /// Does nothing when the storage key is the one already synced, so calling
    /// it repeatedly with unchanged filters never fetches twice.
    #[instrument(skip(self), fields(cache_key = %self.inner.options.cache_key))]
    pub async fn activate(&self) -> RefreshOutcome {
        if !self.is_mounted() {
            return RefreshOutcome::Unmounted;
        }

        let key = {
            let mut state = self.lock_state("activate");
            let key = match list_storage_key(&self.inner.options.cache_key, &state.filters) {
                Ok(key) => key,
                Err(err) => {
                    drop(state);
                    return self.fail_unhashable(err);
                }
            };
            if state.synced_key.as_deref() == Some(key.as_str()) {
                return RefreshOutcome::Unchanged;
            }
            state.synced_key = Some(key.clone());
            // A new query supersedes any page still in flight for the old one.
            self.inner.generation.fetch_add(1, Ordering::SeqCst);
            state.status = ListStatus::Warmup;
            key
        };
        self.publish();

        let cached = self
            .inner
            .cache
            .get_entry::<ListPage<S::Item>>(&key)
            .filter(|entry| is_fresh(Some(entry), self.inner.options.ttl));

        let skip_refresh = self.inner.options.skip_refresh_if_cached;
        match cached {
            Some(entry) => {
                let items = entry.data.items.len();
                {
                    let mut state = self.lock_state("activate.cache_hit");
                    if state.synced_key.as_deref() != Some(key.as_str()) {
                        return RefreshOutcome::Discarded;
                    }
                    state.apply_page(entry.data.clone());
                    state.error = None;
                    state.status = if skip_refresh {
                        ListStatus::Ready
                    } else {
                        ListStatus::Refreshing
                    };
                }
                self.publish();
                debug!(key = %key, items, "Rendered list from cache");

                if let Some(hook) = self.inner.options.on_cache_hit.as_ref() {
                    hook(&entry);
                }
                if skip_refresh {
                    return RefreshOutcome::ServedFromCache { items };
                }
            }
            None => {
                {
                    let mut state = self.lock_state("activate.cache_miss");
                    if state.synced_key.as_deref() != Some(key.as_str()) {
                        return RefreshOutcome::Discarded;
                    }
                    state.clear_items();
                    state.error = None;
                    state.status = ListStatus::Loading;
                }
                self.publish();
            }
        }

        self.refresh().await
    }

    /// Replace the filters wholesale and sync to the new query.
    pub async fn set_filters(&self, filters: S::Filters) -> RefreshOutcome {
        self.lock_state("set_filters").filters = filters;
        self.publish();
        self.activate().await
    }

    /// Fetch the first page for the current filters and commit it if no newer
    /// request has started in the meantime.
    #[instrument(skip(self), fields(cache_key = %self.inner.options.cache_key))]
    pub async fn refresh(&self) -> RefreshOutcome {
        if !self.is_mounted() {
            return RefreshOutcome::Unmounted;
        }

        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let filters = {
            let mut state = self.lock_state("refresh");
            state.status = match state.status {
                ListStatus::Idle | ListStatus::Warmup | ListStatus::Loading => ListStatus::Loading,
                ListStatus::Refreshing | ListStatus::Ready | ListStatus::Error => {
                    ListStatus::Refreshing
                }
            };
            if let Ok(key) = list_storage_key(&self.inner.options.cache_key, &state.filters) {
                state.synced_key = Some(key);
            }
            state.filters.clone()
        };
        self.publish();

        let source = self.current_source();
        let started = Instant::now();
        let result = fetch_page(source.as_ref(), &filters, 0, self.inner.options.page_size).await;
        histogram!(METRIC_FETCH_MS).record(started.elapsed().as_secs_f64() * 1000.0);

        match result {
            Ok(page) => {
                let items = page.items.len();
                {
                    let mut state = self.lock_state("refresh.commit");
                    if !self.is_current(generation) {
                        drop(state);
                        return self.discard(generation, "refresh");
                    }
                    state.apply_page(page.clone());
                    state.error = None;
                    state.load_more_error = None;
                    state.status = ListStatus::Ready;
                }
                self.write_through(&filters, page);
                self.publish();
                RefreshOutcome::Committed { items }
            }
            Err(err) => {
                {
                    let mut state = self.lock_state("refresh.fail");
                    if !self.is_current(generation) {
                        drop(state);
                        return self.discard(generation, "refresh");
                    }
                    state.status = ListStatus::Error;
                    state.error = Some((self.inner.options.error_message)(&err, DEFAULT_LOAD_ERROR));
                }
                self.publish();
                warn!(error = %err, "List refresh failed");
                RefreshOutcome::Failed(err)
            }
        }
    }

    /// Fetch the page after the current cursor and append it to the visible
    /// items. Failures land in `load_more_error` and leave `status` alone.
    #[instrument(skip(self), fields(cache_key = %self.inner.options.cache_key))]
    pub async fn load_more(&self) -> LoadMoreOutcome {
        if !self.is_mounted() {
            return LoadMoreOutcome::Skipped;
        }
        if self.inner.loading_more.swap(true, Ordering::SeqCst) {
            return LoadMoreOutcome::Skipped;
        }
        let _loading = LoadingMoreGuard { pipeline: self };

        let generation = self.inner.generation.load(Ordering::SeqCst);
        let (filters, offset) = {
            let mut state = self.lock_state("load_more");
            if !state.pagination.has_more {
                return LoadMoreOutcome::Skipped;
            }
            state.load_more_error = None;
            (state.filters.clone(), state.pagination.next_offset)
        };
        self.publish();

        let source = self.current_source();
        let started = Instant::now();
        let result = fetch_page(
            source.as_ref(),
            &filters,
            offset,
            self.inner.options.page_size,
        )
        .await;
        histogram!(METRIC_FETCH_MS).record(started.elapsed().as_secs_f64() * 1000.0);

        match result {
            Ok(page) => {
                let added = page.items.len();
                let merged = {
                    let mut state = self.lock_state("load_more.commit");
                    if !self.is_current(generation) {
                        drop(state);
                        counter!(METRIC_DISCARDED, "op" => "load_more").increment(1);
                        debug!(generation, "Discarded superseded load_more result");
                        return LoadMoreOutcome::Discarded;
                    }
                    state.items.extend(page.items);
                    state.pagination = page.pagination;
                    if page.total.is_some() {
                        state.total = page.total;
                    }
                    ListPage {
                        items: state.items.clone(),
                        pagination: state.pagination,
                        total: state.total,
                    }
                };
                self.write_through(&filters, merged);
                self.publish();
                LoadMoreOutcome::Appended { added }
            }
            Err(err) => {
                {
                    let mut state = self.lock_state("load_more.fail");
                    if !self.is_current(generation) {
                        return LoadMoreOutcome::Discarded;
                    }
                    state.load_more_error =
                        Some((self.inner.options.error_message)(&err, DEFAULT_LOAD_ERROR));
                }
                warn!(error = %err, offset, "Loading more items failed");
                LoadMoreOutcome::Failed(err)
            }
        }
    }

    /// Overwrite the visible items without touching the cache or pagination.
    pub fn set_items(&self, items: Vec<S::Item>) {
        self.lock_state("set_items").items = items;
        self.publish();
    }

    /// Swap the source used by requests started from now on.
    ///
    /// Requests already in flight finish with the source they started with.
    pub fn replace_source(&self, source: Arc<S>) {
        *rw_write(&self.inner.source, SOURCE, "replace_source") = source;
    }

    /// Stop committing results. In-flight requests still complete, but their
    /// results are dropped.
    pub fn unmount(&self) {
        self.inner.mounted.store(false, Ordering::SeqCst);
    }

    pub fn is_mounted(&self) -> bool {
        self.inner.mounted.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> ListSnapshot<S::Item, S::Filters> {
        let state = self.lock_state("snapshot");
        snapshot_of(&state, self.inner.loading_more.load(Ordering::SeqCst))
    }

    /// Receive every published snapshot from now on.
    pub fn subscribe(&self) -> watch::Receiver<ListSnapshot<S::Item, S::Filters>> {
        self.inner.snapshots.subscribe()
    }

    pub fn items(&self) -> Vec<S::Item> {
        self.lock_state("items").items.clone()
    }

    pub fn status(&self) -> ListStatus {
        self.lock_state("status").status
    }

    pub fn error(&self) -> Option<String> {
        self.lock_state("error").error.clone()
    }

    pub fn filters(&self) -> S::Filters {
        self.lock_state("filters").filters.clone()
    }

    pub fn has_more(&self) -> bool {
        self.lock_state("has_more").pagination.has_more
    }

    pub fn is_loading_more(&self) -> bool {
        self.inner.loading_more.load(Ordering::SeqCst)
    }

    /// Storage key the pipeline last synced to, if any.
    pub fn storage_key(&self) -> Option<String> {
        self.lock_state("storage_key").synced_key.clone()
    }

    fn lock_state(
        &self,
        op: &'static str,
    ) -> std::sync::MutexGuard<'_, PipelineState<S::Item, S::Filters>> {
        mutex_lock(&self.inner.state, SOURCE, op)
    }

    fn current_source(&self) -> Arc<S> {
        Arc::clone(&rw_read(&self.inner.source, SOURCE, "current_source"))
    }

    fn is_current(&self, generation: u64) -> bool {
        self.is_mounted() && self.inner.generation.load(Ordering::SeqCst) == generation
    }

    fn discard(&self, generation: u64, op: &'static str) -> RefreshOutcome {
        counter!(METRIC_DISCARDED, "op" => op).increment(1);
        debug!(
            generation,
            current = self.inner.generation.load(Ordering::SeqCst),
            mounted = self.is_mounted(),
            "Discarded superseded {op} result"
        );
        RefreshOutcome::Discarded
    }

    fn fail_unhashable(&self, err: serde_json::Error) -> RefreshOutcome {
        let err = FetchError::Other(format!("filters are not serializable: {err}"));
        {
            let mut state = self.lock_state("activate.unhashable");
            state.status = ListStatus::Error;
            state.error = Some((self.inner.options.error_message)(&err, DEFAULT_LOAD_ERROR));
        }
        self.publish();
        warn!(error = %err, "Cannot derive list cache key");
        RefreshOutcome::Failed(err)
    }

    fn write_through(&self, filters: &S::Filters, page: ListPage<S::Item>) {
        let key = match list_storage_key(&self.inner.options.cache_key, filters) {
            Ok(key) => key,
            Err(err) => {
                warn!(error = %err, "Skipping cache write for unhashable filters");
                return;
            }
        };
        let filters = serde_json::to_value(filters).unwrap_or(Value::Null);
        self.inner.cache.set_entry(&key, &CacheEntry::new(page, filters));
    }

    fn publish(&self) {
        let snapshot = self.snapshot();
        self.inner.snapshots.send_replace(snapshot);
    }
}

struct LoadingMoreGuard<'a, S: ListSource> {
    pipeline: &'a ListPipeline<S>,
}

impl<S: ListSource> Drop for LoadingMoreGuard<'_, S> {
    fn drop(&mut self) {
        self.pipeline
            .inner
            .loading_more
            .store(false, Ordering::SeqCst);
        self.pipeline.publish();
    }
}

fn snapshot_of<I: Clone, F: Clone>(
    state: &PipelineState<I, F>,
    is_loading_more: bool,
) -> ListSnapshot<I, F> {
    ListSnapshot {
        items: state.items.clone(),
        status: state.status,
        error: state.error.clone(),
        filters: state.filters.clone(),
        has_more: state.pagination.has_more,
        next_offset: state.pagination.next_offset,
        total: state.total,
        is_loading_more,
        load_more_error: state.load_more_error.clone(),
    }
}
