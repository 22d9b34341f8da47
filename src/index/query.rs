//! Request bodies and response shapes for the Elasticsearch search API

use crate::document::Document;
use crate::storage::SortOrder;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;

/// Fields searched by free text, with boosts
pub const SEARCH_FIELDS: [&str; 4] = ["titulo^3", "tipo^2", "texto_contenido", "metadatos.categoria"];

/// Fields returned with highlight fragments
pub const HIGHLIGHT_FIELDS: [&str; 2] = ["titulo", "texto_contenido"];

/// A search against the index
#[derive(Debug, Clone, Default)]
pub struct EngineQuery {
    pub text: String,
    pub category: Option<String>,
    pub file_type: Option<String>,
    pub sort: SortOrder,
    pub from: usize,
    pub size: usize,
    /// Buckets per aggregation; `None` requests no aggregations
    pub aggregation_size: Option<usize>,
}

impl EngineQuery {
    /// Builds the `_search` request body
    pub fn to_body(&self) -> Value {
        let must = if self.text.trim().is_empty() {
            json!([{ "match_all": {} }])
        } else {
            json!([{
                "multi_match": {
                    "query": self.text,
                    "fields": SEARCH_FIELDS,
                    "fuzziness": "AUTO",
                    "operator": "or"
                }
            }])
        };

        let mut filter = Vec::new();
        if let Some(category) = &self.category {
            filter.push(json!({ "term": { "metadatos.categoria": category } }));
        }
        if let Some(file_type) = &self.file_type {
            filter.push(json!({ "term": { "tipo": file_type } }));
        }

        let highlight_fields: serde_json::Map<String, Value> = HIGHLIGHT_FIELDS
            .iter()
            .map(|field| (field.to_string(), json!({})))
            .collect();

        let mut body = json!({
            "query": { "bool": { "must": must, "filter": filter } },
            "from": self.from,
            "size": self.size,
            "sort": sort_clause(self.sort),
            "highlight": { "fields": highlight_fields },
            "track_total_hits": true
        });

        if let Some(size) = self.aggregation_size {
            body["aggs"] = aggregations_clause(size);
        }

        body
    }
}

fn sort_clause(sort: SortOrder) -> Value {
    match sort {
        SortOrder::DateDesc => json!([{ "fecha_descarga": { "order": "desc" } }]),
        SortOrder::DateAsc => json!([{ "fecha_descarga": { "order": "asc" } }]),
        SortOrder::Title => json!([{ "titulo.keyword": { "order": "asc" } }]),
        SortOrder::Relevance => json!(["_score"]),
    }
}

fn aggregations_clause(size: usize) -> Value {
    json!({
        "categorias": { "terms": { "field": "metadatos.categoria", "size": size } },
        "tipos": { "terms": { "field": "tipo", "size": size } },
        "años": { "terms": { "field": "metadatos.año", "size": size, "order": { "_key": "desc" } } }
    })
}

/// Body of a fuzzy title search used for suggestions
pub fn suggestion_body(prefix: &str, limit: usize) -> Value {
    json!({
        "size": limit.saturating_mul(2),
        "_source": ["titulo"],
        "query": {
            "match": {
                "titulo": { "query": prefix, "fuzziness": "AUTO" }
            }
        }
    })
}

/// Index mapping for documents
pub fn index_mapping() -> Value {
    json!({
        "mappings": {
            "properties": {
                "numero": { "type": "integer" },
                "titulo": {
                    "type": "text",
                    "analyzer": "spanish",
                    "fields": { "keyword": { "type": "keyword", "ignore_above": 512 } }
                },
                "texto_contenido": { "type": "text", "analyzer": "spanish" },
                "tipo": { "type": "keyword" },
                "url_original": { "type": "keyword" },
                "archivo_local": { "type": "keyword" },
                "ruta_completa": { "type": "keyword" },
                "tamano_bytes": { "type": "long" },
                "tamano_mb": { "type": "float" },
                "fecha_descarga": { "type": "date", "format": "yyyy-MM-dd HH:mm:ss" },
                "fuente": { "type": "text" },
                "archivo_existe": { "type": "boolean" },
                "estado": { "type": "keyword" },
                "metadatos": {
                    "properties": {
                        "categoria": { "type": "keyword" },
                        "año": { "type": "integer" },
                        "extension": { "type": "keyword" }
                    }
                }
            }
        },
        "settings": {
            "number_of_shards": 1,
            "number_of_replicas": 1
        }
    })
}

/// One aggregation bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    pub key: Value,
    pub doc_count: u64,
}

#[derive(Debug, Deserialize)]
struct BucketList {
    #[serde(default)]
    buckets: Vec<Bucket>,
}

/// Category, type and year buckets for a search
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Aggregations {
    pub categorias: Vec<Bucket>,
    pub tipos: Vec<Bucket>,
    #[serde(rename = "años")]
    pub anos: Vec<Bucket>,
}

/// A matching document with its engine annotations
#[derive(Debug, Clone)]
pub struct EngineHit {
    pub id: String,
    pub score: Option<f64>,
    pub document: Document,
    pub highlight: Option<HashMap<String, Vec<String>>>,
}

/// A parsed `_search` response
#[derive(Debug, Clone)]
pub struct EngineResponse {
    pub total: u64,
    pub hits: Vec<EngineHit>,
    pub aggregations: Option<Aggregations>,
}

#[derive(Debug, Deserialize)]
struct RawResponse {
    hits: RawHits,
    #[serde(default)]
    aggregations: Option<HashMap<String, BucketList>>,
}

#[derive(Debug, Deserialize)]
struct RawHits {
    total: RawTotal,
    #[serde(default)]
    hits: Vec<RawHit>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTotal {
    Object { value: u64 },
    Number(u64),
}

#[derive(Debug, Deserialize)]
struct RawHit {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_score", default)]
    score: Option<f64>,
    #[serde(rename = "_source")]
    source: Document,
    #[serde(default)]
    highlight: Option<HashMap<String, Vec<String>>>,
}

/// Parses a `_search` response body
pub fn parse_search_response(body: Value) -> Result<EngineResponse, serde_json::Error> {
    let raw: RawResponse = serde_json::from_value(body)?;

    let total = match raw.hits.total {
        RawTotal::Object { value } => value,
        RawTotal::Number(value) => value,
    };

    let hits = raw
        .hits
        .hits
        .into_iter()
        .map(|hit| EngineHit {
            id: hit.id,
            score: hit.score,
            document: hit.source,
            highlight: hit.highlight,
        })
        .collect();

    let aggregations = raw.aggregations.map(|mut aggs| {
        let mut take = |name: &str| aggs.remove(name).map(|b| b.buckets).unwrap_or_default();
        Aggregations {
            categorias: take("categorias"),
            tipos: take("tipos"),
            anos: take("años"),
        }
    });

    Ok(EngineResponse {
        total,
        hits,
        aggregations,
    })
}

/// Extracts distinct titles from a suggestion response, keeping engine order
pub fn parse_suggestions(body: &Value, limit: usize) -> Vec<String> {
    let mut titles: Vec<String> = Vec::new();

    if let Some(hits) = body["hits"]["hits"].as_array() {
        for hit in hits {
            if let Some(title) = hit["_source"]["titulo"].as_str() {
                if !titles.iter().any(|t| t == title) {
                    titles.push(title.to_string());
                }
            }
            if titles.len() >= limit {
                break;
            }
        }
    }

    titles
}
