use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::cache::ListPage;

/// Failure to obtain or interpret a page.
///
/// Transport problems, non-success statuses and malformed bodies all take the
/// same path through the pipeline.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("server responded with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to decode response: {0}")]
    Decode(String),
    #[error("failed to map response: {0}")]
    Mapping(String),
    #[error("{0}")]
    Other(String),
}

impl FetchError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Rate limiting, server errors and transport failures are worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status { status, .. } => *status == 429 || (500..=599).contains(status),
            _ => false,
        }
    }
}

/// Where a pipeline gets its pages from.
///
/// `fetch` performs the request for one window of the collection and
/// `map_response` turns the raw response into items plus pagination.
#[async_trait]
pub trait ListSource: Send + Sync + 'static {
    type Filters: Serialize + Clone + Send + Sync + 'static;
    type Item: Serialize + DeserializeOwned + Clone + Send + Sync + 'static;
    type Response: Send;

    async fn fetch(
        &self,
        filters: &Self::Filters,
        offset: u64,
        limit: u64,
    ) -> Result<Self::Response, FetchError>;

    fn map_response(&self, response: Self::Response) -> Result<ListPage<Self::Item>, FetchError>;
}

/// Fetch and map one page.
pub async fn fetch_page<S: ListSource + ?Sized>(
    source: &S,
    filters: &S::Filters,
    offset: u64,
    limit: u64,
) -> Result<ListPage<S::Item>, FetchError> {
    let response = source.fetch(filters, offset, limit).await?;
    source.map_response(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(FetchError::Transport("reset".into()).is_transient());
        assert!(
            FetchError::Status {
                status: 429,
                body: String::new()
            }
            .is_transient()
        );
        assert!(
            FetchError::Status {
                status: 503,
                body: String::new()
            }
            .is_transient()
        );
        assert!(
            !FetchError::Status {
                status: 404,
                body: String::new()
            }
            .is_transient()
        );
        assert!(!FetchError::Decode("eof".into()).is_transient());
    }
}
