//! Cache-aware paginated list pipeline.
//!
//! A [`ListPipeline`] owns the query filters of one collection view, serves a
//! fresh cached first page immediately, revalidates it in the background and
//! appends further pages on demand. Results of superseded requests are
//! discarded by generation, so the last request issued always wins.
//!
//! Status transitions:
//!
//! ```text
//! idle -> warmup -> loading | refreshing -> ready | error
//! ready | error -> loading | refreshing      (refresh or filter change)
//! ```

mod list;
mod messages;
mod source;
mod state;

pub use list::{CacheHitHook, ErrorMessageFn, ListPipeline, PipelineOptions};
pub use messages::{DEFAULT_LOAD_ERROR, describe_fetch_error};
pub use source::{FetchError, ListSource, fetch_page};
pub use state::{ListSnapshot, ListStatus, LoadMoreOutcome, RefreshOutcome};
