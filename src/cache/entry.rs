//! Cached list payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::util::clock::now_millis;

/// One cached result, addressed by its list cache key.
///
/// `filters` records the query that produced `data`; equality of queries is
/// decided by the key, never by this field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub data: T,
    /// Epoch milliseconds at write time.
    pub timestamp: i64,
    #[serde(default)]
    pub filters: Value,
}

impl<T> CacheEntry<T> {
    /// Stamp `data` with the current time.
    pub fn new(data: T, filters: Value) -> Self {
        Self::at(data, filters, now_millis())
    }

    pub fn at(data: T, filters: Value, timestamp: i64) -> Self {
        Self {
            data,
            timestamp,
            filters,
        }
    }
}

/// Pagination cursor returned with every page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub has_more: bool,
    pub next_offset: u64,
}

/// A mapped page of items as stored in the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListPage<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

impl<T> ListPage<T> {
    pub fn new(items: Vec<T>, pagination: Pagination) -> Self {
        Self {
            items,
            pagination,
            total: None,
        }
    }

    pub fn with_total(mut self, total: u64) -> Self {
        self.total = Some(total);
        self
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn page_uses_camel_case_pagination() {
        let page = ListPage::new(vec![1, 2], Pagination {
            has_more: true,
            next_offset: 2,
        })
        .with_total(9);

        let value = serde_json::to_value(&page).expect("serializable");
        assert_eq!(
            value,
            json!({"items": [1, 2], "pagination": {"hasMore": true, "nextOffset": 2}, "total": 9})
        );
    }

    #[test]
    fn entry_without_filters_still_decodes() {
        let raw = r#"{"data": {"items": [], "pagination": {"hasMore": false, "nextOffset": 0}}, "timestamp": 5}"#;
        let entry: CacheEntry<ListPage<u32>> = serde_json::from_str(raw).expect("decodes");
        assert_eq!(entry.timestamp, 5);
        assert_eq!(entry.filters, Value::Null);
        assert_eq!(entry.data.total, None);
    }
}
