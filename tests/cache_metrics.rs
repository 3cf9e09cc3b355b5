use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use metrics_util::debugging::DebuggingRecorder;
use serde_json::Value;
use sourcedeck::cache::{CacheConfig, CacheEntry, ListCache, ListPage, MemoryKvStore, Pagination};
use sourcedeck::concurrency::{RetryPolicy, retry_with_backoff};
use sourcedeck::infra::telemetry::describe_metrics;
use sourcedeck::pipeline::{FetchError, ListPipeline, ListSource, PipelineOptions};

struct OnePage;

#[async_trait]
impl ListSource for OnePage {
    type Filters = Value;
    type Item = u32;
    type Response = ListPage<u32>;

    async fn fetch(&self, _: &Value, _: u64, _: u64) -> Result<ListPage<u32>, FetchError> {
        Ok(ListPage::new(vec![1, 2], Pagination {
            has_more: false,
            next_offset: 2,
        }))
    }

    fn map_response(&self, response: ListPage<u32>) -> Result<ListPage<u32>, FetchError> {
        Ok(response)
    }
}

#[tokio::test(start_paused = true)]
async fn cache_and_pipeline_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");
    describe_metrics();

    // Cache hit, miss and failed persistent write.
    let cache = ListCache::new(&CacheConfig::default(), Arc::new(MemoryKvStore::with_quota(0)));
    assert!(cache.get_entry::<ListPage<u32>>("list:items:none").is_none());
    cache.set_entry("list:items:k", &CacheEntry::new(vec![1u32], Value::Null));
    assert!(cache.get_entry::<Vec<u32>>("list:items:k").is_some());

    // Pipeline fetch latency.
    let pipeline = ListPipeline::new(
        Arc::new(OnePage),
        Arc::new(cache),
        PipelineOptions::new("items"),
        Value::Null,
    );
    assert!(pipeline.activate().await.is_committed());

    // One scheduled retry.
    let mut attempts = 0;
    let _: Result<(), &str> = retry_with_backoff(
        || {
            attempts += 1;
            let attempt = attempts;
            async move { if attempt == 1 { Err("busy") } else { Ok(()) } }
        },
        RetryPolicy::new(1),
        |_| true,
    )
    .await;

    let metric_names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        "sourcedeck_list_cache_hit_total",
        "sourcedeck_list_cache_miss_total",
        "sourcedeck_list_cache_persist_error_total",
        "sourcedeck_pipeline_fetch_ms",
        "sourcedeck_retry_attempt_total",
    ];
    for name in expected {
        assert!(metric_names.contains(name), "missing metric key: {name}");
    }
}
