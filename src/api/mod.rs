//! Transport-agnostic API envelopes
//!
//! An HTTP layer (or the CLI) hands raw request values to these functions
//! and sends back the returned status and JSON body unchanged. This is the
//! only place where unrecovered errors become `{exito: false, error, mensaje}`
//! bodies.

use crate::search::{SearchError, SearchQuery, SearchService, DEFAULT_PER_PAGE};
use crate::storage::SortOrder;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// A JSON response with its HTTP status
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    fn failure(status: u16, error: &str, message: impl ToString) -> Self {
        Self {
            status,
            body: json!({
                "exito": false,
                "error": error,
                "mensaje": message.to_string(),
            }),
        }
    }

    fn from_search_error(error: SearchError) -> Self {
        match error {
            SearchError::InvalidQuery(message) => Self::failure(400, "Invalid request", message),
            other => {
                tracing::error!("Search request failed: {}", other);
                Self::failure(500, "Search failed", other)
            }
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Raw search parameters as received from a client
///
/// Paging values arrive as text and are validated here.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: String,

    #[serde(default)]
    pub categoria: String,

    #[serde(default)]
    pub tipo: String,

    #[serde(default)]
    pub pagina: Option<String>,

    #[serde(default)]
    pub por_pagina: Option<String>,

    #[serde(default)]
    pub orden: Option<String>,
}

impl SearchRequest {
    /// Validates the request into a search query
    ///
    /// # Returns
    ///
    /// * `Ok(SearchQuery)` - Paging is not yet clamped; the service does that
    /// * `Err(SearchError::InvalidQuery)` - Unknown order or non-integer paging
    pub fn to_query(&self) -> Result<SearchQuery, SearchError> {
        let sort = match self.orden.as_deref() {
            None => SortOrder::default(),
            Some(raw) => raw.trim().parse().map_err(SearchError::InvalidQuery)?,
        };

        Ok(SearchQuery {
            text: self.query.clone(),
            category: self.categoria.clone(),
            file_type: self.tipo.clone(),
            sort,
            page: parse_integer("pagina", self.pagina.as_deref(), 1)?,
            per_page: parse_integer("por_pagina", self.por_pagina.as_deref(), DEFAULT_PER_PAGE)?,
        })
    }
}

fn parse_integer(name: &str, raw: Option<&str>, default: i64) -> Result<i64, SearchError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(default),
        Some(value) => value.parse().map_err(|_| {
            SearchError::InvalidQuery(format!("'{}' must be an integer, got '{}'", name, value))
        }),
    }
}

/// Runs a search and wraps the result
///
/// # Arguments
///
/// * `service` - The search service
/// * `request` - Raw request parameters
/// * `with_aggregations` - Whether to add category/type/year buckets
pub async fn search(
    service: &SearchService,
    request: &SearchRequest,
    with_aggregations: bool,
) -> ApiResponse {
    let query = match request.to_query() {
        Ok(query) => query,
        Err(e) => return ApiResponse::from_search_error(e),
    };

    let result = if with_aggregations {
        service.aggregate(&query).await
    } else {
        service.search(&query).await
    };

    match result.map(|r| serde_json::to_value(&r)) {
        Ok(Ok(mut body)) => {
            body["exito"] = json!(true);
            ApiResponse::ok(body)
        }
        Ok(Err(e)) => ApiResponse::failure(500, "Search failed", e),
        Err(e) => ApiResponse::from_search_error(e),
    }
}

/// Looks up one document
pub fn document_detail(service: &SearchService, numero: i64) -> ApiResponse {
    match service.get_document(numero) {
        Ok(Some(document)) => ApiResponse::ok(json!({
            "exito": true,
            "documento": document,
        })),
        Ok(None) => ApiResponse {
            status: 404,
            body: json!({
                "error": "Document not found",
                "numero": numero,
            }),
        },
        Err(e) => ApiResponse::from_search_error(e),
    }
}

/// Store-side statistics
pub fn statistics(service: &SearchService) -> ApiResponse {
    match service.statistics() {
        Ok(stats) => {
            let total_gb = (stats.total_size_mb / 1024.0 * 100.0).round() / 100.0;
            match serde_json::to_value(&stats) {
                Ok(mut body) => {
                    body["exito"] = json!(true);
                    body["tamano_total_gb"] = json!(total_gb);
                    ApiResponse::ok(body)
                }
                Err(e) => ApiResponse::failure(500, "Statistics failed", e),
            }
        }
        Err(e) => ApiResponse::from_search_error(e),
    }
}

/// Title suggestions for a typed prefix
///
/// Never fails; backend problems produce an empty list.
pub async fn suggestions(service: &SearchService, prefix: &str, limit: Option<usize>) -> ApiResponse {
    let limit = limit.unwrap_or_else(|| service.suggestion_limit());
    let titles = service.suggest(prefix, limit).await;

    ApiResponse::ok(json!({
        "exito": true,
        "sugerencias": titles,
    }))
}
