//! `ListSource` backed by a JSON list endpoint.
//!
//! `GET <base>/<path>?offset=<n>&limit=<n>&<filters>` is expected to answer
//! with `{"items": [...], "pagination": {"hasMore": bool, "nextOffset": n}, "total": n}`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::cache::{ListPage, Pagination};
use crate::config::ApiSettings;
use crate::pipeline::{FetchError, ListSource};

use super::error::InfraError;

/// Query-string filters, kept sorted so requests and cache keys are stable.
pub type QueryFilters = BTreeMap<String, String>;

#[derive(Clone, Debug)]
pub struct HttpListSource {
    client: Client,
    base: Url,
    path: String,
    api_key: Option<String>,
}

impl HttpListSource {
    /// Build a source for `path` beneath the configured API base URL.
    pub fn new(settings: &ApiSettings, path: impl Into<String>) -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(Self::user_agent())
            .timeout(settings.timeout)
            .build()
            .map_err(|err| InfraError::configuration(format!("failed to build http client: {err}")))?;

        Ok(Self::with_client(
            client,
            settings.base_url.clone(),
            path,
            settings.api_key.clone(),
        ))
    }

    pub fn with_client(
        client: Client,
        base: Url,
        path: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            client,
            base,
            path: path.into().trim_start_matches('/').to_string(),
            api_key,
        }
    }

    pub fn user_agent() -> &'static str {
        concat!("sourcedeck/", env!("CARGO_PKG_VERSION"))
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Absolute URL for one page of this collection.
    pub fn page_url(
        &self,
        filters: &QueryFilters,
        offset: u64,
        limit: u64,
    ) -> Result<Url, FetchError> {
        let mut url = self
            .base
            .join(&self.path)
            .map_err(|err| FetchError::Other(format!("invalid list path `{}`: {err}", self.path)))?;
        url.set_query(None);
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("offset", &offset.to_string());
            query.append_pair("limit", &limit.to_string());
            for (key, value) in filters {
                query.append_pair(key, value);
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl ListSource for HttpListSource {
    type Filters = QueryFilters;
    type Item = Value;
    type Response = Value;

    async fn fetch(
        &self,
        filters: &QueryFilters,
        offset: u64,
        limit: u64,
    ) -> Result<Value, FetchError> {
        let url = self.page_url(filters, offset, limit)?;
        debug!(%url, "Fetching list page");

        let mut request = self.client.get(url);
        if let Some(key) = self.api_key.as_deref() {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|err| FetchError::Transport(err.to_string()))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| FetchError::Transport(err.to_string()))?;

        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        serde_json::from_slice(&bytes).map_err(|err| FetchError::Decode(err.to_string()))
    }

    fn map_response(&self, response: Value) -> Result<ListPage<Value>, FetchError> {
        let body: ListBody =
            serde_json::from_value(response).map_err(|err| FetchError::Mapping(err.to_string()))?;

        let pagination = body.pagination.unwrap_or(Pagination {
            has_more: false,
            next_offset: body.items.len() as u64,
        });

        Ok(ListPage {
            items: body.items,
            pagination,
            total: body.total,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ListBody {
    items: Vec<Value>,
    #[serde(default)]
    pagination: Option<Pagination>,
    #[serde(default)]
    total: Option<u64>,
}
