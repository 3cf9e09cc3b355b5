use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::{Value, json};
use sourcedeck::cache::{
    CacheConfig, CacheEntry, FileKvStore, KeyValueStore, ListCache, ListPage, Pagination,
    is_fresh, is_fresh_at, list_storage_key,
};
use sourcedeck::util::stable_json::stable_stringify;
use tempfile::TempDir;

#[derive(Serialize)]
struct SearchFilters<'a> {
    status: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    supplier: Option<&'a str>,
    tags: Vec<&'a str>,
}

fn page(items: &[&str], has_more: bool) -> ListPage<String> {
    ListPage::new(
        items.iter().map(|item| item.to_string()).collect(),
        Pagination {
            has_more,
            next_offset: items.len() as u64,
        },
    )
}

fn file_cache(dir: &TempDir, quota: Option<u64>) -> (ListCache, Arc<FileKvStore>) {
    let store = Arc::new(FileKvStore::open(dir.path(), quota).expect("open store"));
    let cache = ListCache::new(&CacheConfig::default(), store.clone());
    (cache, store)
}

#[test]
fn insertion_order_does_not_change_the_key() {
    let a = json!({"b": 2, "a": 1});
    let b: Value = serde_json::from_str(r#"{"a": 1, "b": 2}"#).expect("json");

    assert_eq!(stable_stringify(&a).expect("a"), r#"{"a":1,"b":2}"#);
    assert_eq!(
        list_storage_key("items", &a).expect("a"),
        list_storage_key("items", &b).expect("b")
    );
}

#[test]
fn struct_filters_and_equivalent_maps_share_a_key() {
    let typed = SearchFilters {
        status: "active",
        supplier: None,
        tags: vec!["b", "a"],
    };
    let loose = json!({"tags": ["b", "a"], "status": "active"});

    assert_eq!(
        list_storage_key("items", &typed).expect("typed"),
        list_storage_key("items", &loose).expect("loose")
    );

    // Array order is significant.
    let reordered = json!({"tags": ["a", "b"], "status": "active"});
    assert_ne!(
        list_storage_key("items", &typed).expect("typed"),
        list_storage_key("items", &reordered).expect("reordered")
    );
}

#[test]
fn entries_survive_a_restart() {
    let dir = TempDir::new().expect("tempdir");
    let key = list_storage_key("items", &json!({"status": "active"})).expect("key");

    {
        let (cache, _) = file_cache(&dir, None);
        cache.set_entry(&key, &CacheEntry::new(page(&["a", "b"], true), json!({"status": "active"})));
    }

    let (cache, _) = file_cache(&dir, None);
    let entry: CacheEntry<ListPage<String>> = cache.get_entry(&key).expect("persisted");
    assert_eq!(entry.data.items, vec!["a", "b"]);
    assert!(entry.data.pagination.has_more);
    assert!(is_fresh(Some(&entry), Duration::from_secs(60)));
    assert_eq!(cache.memory_len(), 1);
}

#[test]
fn clearing_memory_falls_back_to_disk() {
    let dir = TempDir::new().expect("tempdir");
    let (cache, _) = file_cache(&dir, None);
    cache.set_entry("list:items:k", &CacheEntry::new(page(&["a"], false), Value::Null));

    cache.clear_memory();
    assert_eq!(cache.memory_len(), 0);
    assert!(cache.get_entry::<ListPage<String>>("list:items:k").is_some());
}

#[test]
fn quota_exhaustion_keeps_the_session_working() {
    let dir = TempDir::new().expect("tempdir");
    let (cache, store) = file_cache(&dir, Some(16));

    cache.set_entry("list:items:big", &CacheEntry::new(page(&["a", "b", "c"], false), Value::Null));

    assert!(store.get("list:items:big").expect("get").is_none());
    let entry: CacheEntry<ListPage<String>> =
        cache.get_entry("list:items:big").expect("memory tier still serves");
    assert_eq!(entry.data.items.len(), 3);
}

#[test]
fn corrupt_file_reads_as_a_miss() {
    let dir = TempDir::new().expect("tempdir");
    let (cache, store) = file_cache(&dir, None);
    store.set("list:items:bad", "{\"data\": ").expect("write garbage");

    assert!(cache.get_entry::<ListPage<String>>("list:items:bad").is_none());
}

#[test]
fn freshness_boundary() {
    let now = 1_700_000_000_000;
    let ttl = Duration::from_millis(1000);

    let young = CacheEntry::at((), Value::Null, now - 999);
    let old = CacheEntry::at((), Value::Null, now - 1001);

    assert!(is_fresh_at(Some(&young), ttl, now));
    assert!(!is_fresh_at(Some(&old), ttl, now));
}
