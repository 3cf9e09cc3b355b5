use serde::Serialize;

use super::source::FetchError;

/// Lifecycle of a list view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ListStatus {
    /// Created, not yet activated.
    Idle,
    /// Looking up the cache for the current query.
    Warmup,
    /// Fetching with nothing to show yet.
    Loading,
    /// Fetching while cached or previous items stay visible.
    Refreshing,
    Ready,
    Error,
}

impl ListStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Warmup => "warmup",
            Self::Loading => "loading",
            Self::Refreshing => "refreshing",
            Self::Ready => "ready",
            Self::Error => "error",
        }
    }

    pub fn is_fetching(&self) -> bool {
        matches!(self, Self::Loading | Self::Refreshing)
    }
}

/// Point-in-time view of a pipeline, as published to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListSnapshot<I, F> {
    pub items: Vec<I>,
    pub status: ListStatus,
    pub error: Option<String>,
    pub filters: F,
    pub has_more: bool,
    pub next_offset: u64,
    pub total: Option<u64>,
    pub is_loading_more: bool,
    pub load_more_error: Option<String>,
}

/// What a call to `activate`, `set_filters` or `refresh` ended up doing.
#[derive(Debug, Clone)]
pub enum RefreshOutcome {
    /// First page fetched and committed.
    Committed { items: usize },
    /// Fresh cache entry served and no revalidation configured.
    ServedFromCache { items: usize },
    /// Storage key unchanged since the last sync; nothing to do.
    Unchanged,
    /// A newer request or an unmount made this result irrelevant.
    Discarded,
    /// The pipeline is unmounted.
    Unmounted,
    /// The fetch failed; status is now `error`.
    Failed(FetchError),
}

impl RefreshOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed { .. })
    }
}

/// What a call to `load_more` ended up doing.
#[derive(Debug, Clone)]
pub enum LoadMoreOutcome {
    /// Next page appended.
    Appended { added: usize },
    /// Already loading, nothing more to load, or unmounted.
    Skipped,
    /// The query changed while the page was in flight.
    Discarded,
    /// The fetch failed; only `load_more_error` is set.
    Failed(FetchError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetching_states() {
        assert!(ListStatus::Loading.is_fetching());
        assert!(ListStatus::Refreshing.is_fetching());
        assert!(!ListStatus::Warmup.is_fetching());
        assert!(!ListStatus::Ready.is_fetching());
    }

    #[test]
    fn status_serializes_snake_case() {
        let value = serde_json::to_value(ListStatus::Refreshing).expect("serializable");
        assert_eq!(value, serde_json::json!("refreshing"));
        assert_eq!(ListStatus::Refreshing.as_str(), "refreshing");
    }
}
