//! Elasticsearch search index
//!
//! This module mirrors stored documents into a full-text index and serves
//! ranked queries from it:
//! - Connectivity checks and index creation with the document mapping
//! - Document upserts keyed by `doc_{numero}`
//! - Bool searches with filters, highlights and aggregations
//! - Fuzzy title suggestions
//!
//! The index is a derived projection of the document store; nothing here
//! decides whether a document exists.

mod query;

pub use query::{
    index_mapping, parse_search_response, parse_suggestions, suggestion_body, Aggregations,
    Bucket, EngineHit, EngineQuery, EngineResponse, HIGHLIGHT_FIELDS, SEARCH_FIELDS,
};

use crate::config::SearchConfig;
use crate::document::Document;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Errors returned by the search index
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Search index is not configured")]
    Disabled,

    #[error("Search index returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Search index request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Unexpected search index response: {0}")]
    Response(String),

    #[error("Invalid API key header")]
    ApiKey,
}

/// Result type for index operations
pub type IndexResult<T> = Result<T, IndexError>;

/// REST client for one Elasticsearch index
#[derive(Debug, Clone)]
pub struct ElasticIndex {
    client: Client,
    base_url: String,
    index_name: String,
}

impl ElasticIndex {
    /// Creates a client from the search configuration
    ///
    /// # Returns
    ///
    /// * `Ok(Some(ElasticIndex))` - The engine is configured
    /// * `Ok(None)` - No engine URL is set; searches use the store only
    /// * `Err(IndexError)` - The HTTP client could not be built
    pub fn from_config(config: &SearchConfig) -> IndexResult<Option<Self>> {
        if !config.engine_enabled() {
            return Ok(None);
        }

        let mut headers = HeaderMap::new();
        let key = config.api_key.trim();
        if !key.is_empty() {
            let value = HeaderValue::from_str(&format!("ApiKey {}", key))
                .map_err(|_| IndexError::ApiKey)?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;

        Ok(Some(Self::with_client(
            client,
            &config.elasticsearch_url,
            &config.index_name,
        )))
    }

    /// Creates a client with an explicit HTTP client
    pub fn with_client(client: Client, base_url: &str, index_name: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            index_name: index_name.to_string(),
        }
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/{}", self.base_url, path.trim_start_matches('/')))
    }

    async fn send_json(&self, builder: RequestBuilder) -> IndexResult<Value> {
        let response = builder.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IndexError::Http {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| IndexError::Response(e.to_string()))
    }

    /// Checks that the cluster answers
    pub async fn ping(&self) -> bool {
        match self.request(Method::GET, "/").send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!("Search index ping failed: {}", e);
                false
            }
        }
    }

    /// Creates the index with the document mapping unless it already exists
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - The index was created
    /// * `Ok(false)` - The index already existed
    pub async fn ensure_index(&self) -> IndexResult<bool> {
        let response = self.request(Method::HEAD, &self.index_name).send().await?;

        match response.status() {
            StatusCode::OK => Ok(false),
            StatusCode::NOT_FOUND => {
                self.send_json(
                    self.request(Method::PUT, &self.index_name)
                        .json(&index_mapping()),
                )
                .await?;
                tracing::info!("Created search index '{}'", self.index_name);
                Ok(true)
            }
            status => Err(IndexError::Http {
                status: status.as_u16(),
                body: String::new(),
            }),
        }
    }

    /// Indexes a document under `doc_{numero}`, replacing any previous version
    pub async fn upsert(&self, document: &Document) -> IndexResult<()> {
        let path = format!("{}/_doc/{}", self.index_name, document.index_id());
        self.send_json(self.request(Method::PUT, &path).json(document))
            .await?;
        tracing::debug!("Indexed document {}", document.id);
        Ok(())
    }

    /// Makes recent writes visible to searches
    pub async fn refresh(&self) -> IndexResult<()> {
        let path = format!("{}/_refresh", self.index_name);
        self.send_json(self.request(Method::POST, &path)).await?;
        Ok(())
    }

    /// Runs a search
    pub async fn search(&self, query: &EngineQuery) -> IndexResult<EngineResponse> {
        let path = format!("{}/_search", self.index_name);
        let body = self
            .send_json(self.request(Method::POST, &path).json(&query.to_body()))
            .await?;

        parse_search_response(body).map_err(|e| IndexError::Response(e.to_string()))
    }

    /// Distinct titles fuzzily matching `prefix`, at most `limit`
    pub async fn suggest_titles(&self, prefix: &str, limit: usize) -> IndexResult<Vec<String>> {
        let path = format!("{}/_search", self.index_name);
        let body = self
            .send_json(
                self.request(Method::POST, &path)
                    .json(&suggestion_body(prefix, limit)),
            )
            .await?;

        Ok(parse_suggestions(&body, limit))
    }
}
