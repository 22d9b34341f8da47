//! Dual-backend document search
//!
//! Searches go to the Elasticsearch index first when there is free text to
//! rank, and fall back to the document store when the index is absent,
//! failing or too slow. Both paths produce the same [`SearchResult`] shape,
//! tagged with the backend that served it.

mod snippet;

pub use snippet::{make_snippet, SNIPPET_CHARS};

use crate::config::SearchConfig;
use crate::document::Document;
use crate::index::{Aggregations, ElasticIndex, EngineQuery};
use crate::storage::{lock, DocumentFilter, SharedStore, SortOrder, StorageError, StoreStatistics};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub const MAX_PER_PAGE: i64 = 100;
pub const DEFAULT_PER_PAGE: i64 = 10;

/// Recent documents listed in statistics
pub const RECENT_DOCUMENTS: usize = 10;

/// Minimum prefix length for suggestions
pub const MIN_SUGGESTION_CHARS: usize = 2;

/// Errors surfaced by the search service
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Document store unavailable: {0}")]
    Store(#[from] StorageError),

    #[error("Invalid search request: {0}")]
    InvalidQuery(String),
}

/// Backend that produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    Elasticsearch,
    Mongodb,
}

impl Engine {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Elasticsearch => "elasticsearch",
            Self::Mongodb => "mongodb",
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A search request
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchQuery {
    #[serde(rename = "query", default)]
    pub text: String,

    #[serde(rename = "categoria", default)]
    pub category: String,

    #[serde(rename = "tipo", default)]
    pub file_type: String,

    #[serde(rename = "orden", default)]
    pub sort: SortOrder,

    #[serde(rename = "pagina", default = "default_page")]
    pub page: i64,

    #[serde(rename = "por_pagina", default = "default_per_page")]
    pub per_page: i64,
}

fn default_page() -> i64 {
    1
}

fn default_per_page() -> i64 {
    DEFAULT_PER_PAGE
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            text: String::new(),
            category: String::new(),
            file_type: String::new(),
            sort: SortOrder::default(),
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

impl SearchQuery {
    /// Creates a free-text query with default paging
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// Clamps paging: page ≥ 1 and 1 ≤ per_page ≤ 100
    pub fn normalized(&self) -> Self {
        Self {
            page: self.page.max(1),
            per_page: self.per_page.clamp(1, MAX_PER_PAGE),
            ..self.clone()
        }
    }

    /// Offset of the first result, saturating for very large pages
    fn skip(&self) -> usize {
        let offset = self
            .page
            .saturating_sub(1)
            .max(0)
            .saturating_mul(self.per_page.max(0));
        usize::try_from(offset).unwrap_or(usize::MAX)
    }

    fn filter(&self) -> DocumentFilter {
        DocumentFilter::new(&self.text, &self.category, &self.file_type)
    }

    fn engine_query(&self, aggregation_size: Option<usize>) -> EngineQuery {
        let filter = self.filter();
        EngineQuery {
            text: self.text.trim().to_string(),
            category: filter.category,
            file_type: filter.file_type,
            sort: self.sort,
            from: self.skip(),
            size: self.per_page as usize,
            aggregation_size,
        }
    }
}

/// One document in a result page
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    #[serde(flatten)]
    pub document: Document,

    #[serde(rename = "_score", skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,

    #[serde(rename = "_highlight", skip_serializing_if = "Option::is_none")]
    pub highlight: Option<HashMap<String, Vec<String>>>,

    /// Plain-text context around the match (store results only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

/// A page of search results
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    #[serde(rename = "documentos")]
    pub documents: Vec<SearchHit>,

    pub total: u64,

    #[serde(rename = "pagina")]
    pub page: i64,

    #[serde(rename = "por_pagina")]
    pub per_page: i64,

    #[serde(rename = "total_paginas")]
    pub total_pages: u64,

    /// The query text, echoed back
    pub query: String,

    #[serde(rename = "motor")]
    pub engine: Engine,

    #[serde(rename = "agregaciones", skip_serializing_if = "Option::is_none")]
    pub aggregations: Option<Aggregations>,
}

/// `ceil(total / per_page)`
pub fn total_pages(total: u64, per_page: i64) -> u64 {
    let per_page = per_page.max(1) as u64;
    total.div_ceil(per_page)
}

/// Outcome of trying the primary engine
#[derive(Debug)]
pub enum EngineAttempt {
    Served(SearchResult),
    Fallback(String),
}

/// Search over the index with the document store as fallback
///
/// The store is the system of record; the index only ranks.
pub struct SearchService {
    store: SharedStore,
    index: Option<ElasticIndex>,
    deadline: Duration,
    aggregation_size: usize,
    suggestion_limit: usize,
}

impl SearchService {
    /// Creates a search service
    ///
    /// # Arguments
    ///
    /// * `store` - The document store
    /// * `index` - The search index, if one is configured
    /// * `config` - Deadline, aggregation and suggestion settings
    pub fn new(store: SharedStore, index: Option<ElasticIndex>, config: &SearchConfig) -> Self {
        Self {
            store,
            index,
            deadline: Duration::from_millis(config.engine_deadline_ms),
            aggregation_size: config.aggregation_size,
            suggestion_limit: config.suggestion_limit,
        }
    }

    pub fn has_engine(&self) -> bool {
        self.index.is_some()
    }

    pub fn suggestion_limit(&self) -> usize {
        self.suggestion_limit
    }

    /// Runs a search
    pub async fn search(&self, query: &SearchQuery) -> Result<SearchResult, SearchError> {
        self.run(query, None).await
    }

    /// Runs a search and adds category, type and year buckets
    ///
    /// Buckets come from the index only; a store-served result carries
    /// empty buckets.
    pub async fn aggregate(&self, query: &SearchQuery) -> Result<SearchResult, SearchError> {
        self.run(query, Some(self.aggregation_size)).await
    }

    async fn run(
        &self,
        query: &SearchQuery,
        aggregation_size: Option<usize>,
    ) -> Result<SearchResult, SearchError> {
        let query = query.normalized();

        if !query.text.trim().is_empty() {
            if let Some(index) = &self.index {
                match self.attempt_engine(index, &query, aggregation_size).await {
                    EngineAttempt::Served(result) => return Ok(result),
                    EngineAttempt::Fallback(reason) => {
                        tracing::warn!("Search index unavailable, using document store: {}", reason)
                    }
                }
            }
        }

        let mut result = self.search_store(&query)?;
        if aggregation_size.is_some() {
            result.aggregations = Some(Aggregations::default());
        }
        Ok(result)
    }

    /// Tries the index within the configured deadline
    pub async fn attempt_engine(
        &self,
        index: &ElasticIndex,
        query: &SearchQuery,
        aggregation_size: Option<usize>,
    ) -> EngineAttempt {
        let engine_query = query.engine_query(aggregation_size);

        let response = match tokio::time::timeout(self.deadline, index.search(&engine_query)).await
        {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return EngineAttempt::Fallback(e.to_string()),
            Err(_) => {
                return EngineAttempt::Fallback(format!(
                    "no answer within {} ms",
                    self.deadline.as_millis()
                ))
            }
        };

        tracing::debug!(
            "Search index served '{}' ({} hits)",
            query.text,
            response.total
        );

        let documents = response
            .hits
            .into_iter()
            .map(|hit| SearchHit {
                document: hit.document,
                score: hit.score,
                highlight: hit.highlight,
                snippet: None,
            })
            .collect();

        EngineAttempt::Served(SearchResult {
            documents,
            total: response.total,
            page: query.page,
            per_page: query.per_page,
            total_pages: total_pages(response.total, query.per_page),
            query: query.text.clone(),
            engine: Engine::Elasticsearch,
            aggregations: response.aggregations,
        })
    }

    fn search_store(&self, query: &SearchQuery) -> Result<SearchResult, SearchError> {
        let filter = query.filter();
        let (total, documents) = {
            let store = lock(&self.store)?;
            let total = store.count_documents(&filter)?;
            let documents =
                store.query_documents(&filter, query.sort, query.skip(), query.per_page as usize)?;
            (total, documents)
        };

        let needle = query.text.trim();
        let documents = documents
            .into_iter()
            .map(|document| {
                let snippet = (!needle.is_empty())
                    .then(|| make_snippet(&document.text, needle, SNIPPET_CHARS))
                    .filter(|s| !s.is_empty());
                SearchHit {
                    document,
                    score: None,
                    highlight: None,
                    snippet,
                }
            })
            .collect();

        Ok(SearchResult {
            documents,
            total,
            page: query.page,
            per_page: query.per_page,
            total_pages: total_pages(total, query.per_page),
            query: query.text.clone(),
            engine: Engine::Mongodb,
            aggregations: None,
        })
    }

    /// Titles matching a typed prefix, at most `limit`
    ///
    /// Prefixes shorter than two characters and any backend failure yield
    /// an empty list.
    pub async fn suggest(&self, prefix: &str, limit: usize) -> Vec<String> {
        let prefix = prefix.trim();
        if prefix.chars().count() < MIN_SUGGESTION_CHARS || limit == 0 {
            return Vec::new();
        }

        if let Some(index) = &self.index {
            match tokio::time::timeout(self.deadline, index.suggest_titles(prefix, limit)).await {
                Ok(Ok(titles)) => return titles,
                Ok(Err(e)) => tracing::warn!("Title suggestions from index failed: {}", e),
                Err(_) => tracing::warn!("Title suggestions from index timed out"),
            }
        }

        match lock(&self.store).and_then(|store| store.scan_titles(prefix, limit)) {
            Ok(titles) => titles,
            Err(e) => {
                tracing::warn!("Title suggestions from store failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Looks a document up by identifier in the store
    pub fn get_document(&self, numero: i64) -> Result<Option<Document>, SearchError> {
        Ok(lock(&self.store)?.get_document(numero)?)
    }

    /// Store-side aggregates with the most recent documents
    pub fn statistics(&self) -> Result<StoreStatistics, SearchError> {
        Ok(lock(&self.store)?.statistics(RECENT_DOCUMENTS)?)
    }
}
