//! Integration tests for dual-backend search
//!
//! A wiremock server stands in for Elasticsearch; the document store is a
//! SQLite file in a temporary directory.

use chrono::NaiveDate;
use docharvest::api::{self, SearchRequest};
use docharvest::config::SearchConfig;
use docharvest::document::{Category, Document, DocumentDraft};
use docharvest::index::ElasticIndex;
use docharvest::search::{Engine, SearchQuery, SearchService};
use docharvest::storage::{open_store, shared, DocumentStore, SharedStore, SortOrder};
use serde_json::{json, Value};
use std::path::Path;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn create_test_document(id: i64, title: &str, text: &str, day: u32) -> Document {
    Document::from_draft(DocumentDraft {
        id,
        title: title.to_string(),
        file_type: "PDF".to_string(),
        source_url: format!("https://portal.example.gov/docs/{}.pdf", id),
        file_name: format!("{:03}_doc.pdf", id),
        local_path: format!("/data/{:03}_doc.pdf", id),
        size_bytes: 512 * 1024,
        downloaded_at: NaiveDate::from_ymd_opt(2024, 4, day)
            .unwrap()
            .and_hms_opt(15, 30, 0)
            .unwrap(),
        source: "Procuraduría General de la Nación".to_string(),
        text: text.to_string(),
        file_exists: true,
    })
}

fn seeded_store(dir: &Path) -> SharedStore {
    let mut store = open_store(&dir.join("docs.db")).unwrap();
    let documents = [
        create_test_document(1, "Manual de funciones", "funciones del cargo", 1),
        create_test_document(2, "Manual de contratación", "procesos de contratación", 2),
        create_test_document(3, "Resolución 2024 sobre vigilancia", "ver manual anexo", 3),
        create_test_document(4, "Boletín Procurando", "noticias", 4),
    ];
    for document in &documents {
        store.insert_document(document).unwrap();
    }
    shared(store)
}

fn engine_hit(document: &Document, score: f64) -> Value {
    json!({
        "_id": document.index_id(),
        "_score": score,
        "_source": document,
        "highlight": { "titulo": [format!("<em>{}</em>", document.title)] }
    })
}

#[tokio::test]
async fn test_engine_serves_ranked_date_sorted_results() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let store = seeded_store(dir.path());

    let hits = vec![
        engine_hit(&create_test_document(3, "Resolución 2024 sobre vigilancia", "ver manual anexo", 3), 0.8),
        engine_hit(&create_test_document(2, "Manual de contratación", "procesos de contratación", 2), 2.1),
        engine_hit(&create_test_document(1, "Manual de funciones", "funciones del cargo", 1), 2.3),
    ];
    Mock::given(method("POST"))
        .and(path("/procuraduria_documentos/_search"))
        .and(body_partial_json(json!({
            "sort": [{ "fecha_descarga": { "order": "desc" } }],
            "from": 0,
            "size": 10
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "hits": { "total": { "value": 3, "relation": "eq" }, "hits": hits }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = SearchConfig {
        elasticsearch_url: server.uri(),
        ..Default::default()
    };
    let index = ElasticIndex::from_config(&config).unwrap();
    let service = SearchService::new(store, index, &config);

    let query = SearchQuery {
        text: "manual".to_string(),
        sort: SortOrder::DateDesc,
        ..Default::default()
    };
    let result = service.search(&query).await.unwrap();

    assert_eq!(result.engine, Engine::Elasticsearch);
    assert_eq!(result.total, 3);
    assert_eq!(result.total_pages, 1);
    let dates: Vec<_> = result.documents.iter().map(|h| h.document.downloaded_at).collect();
    assert!(dates.windows(2).all(|w| w[0] >= w[1]));
    assert!(result.documents.iter().all(|h| h.score.is_some() && h.highlight.is_some()));
}

#[tokio::test]
async fn test_unreachable_engine_falls_back_to_store() {
    let dir = tempfile::tempdir().unwrap();
    let config = SearchConfig {
        elasticsearch_url: "http://127.0.0.1:1".to_string(),
        ..Default::default()
    };
    let index = ElasticIndex::from_config(&config).unwrap();
    let service = SearchService::new(seeded_store(dir.path()), index, &config);

    let request = SearchRequest {
        query: "manual".to_string(),
        orden: Some("fecha_desc".to_string()),
        ..Default::default()
    };
    let response = api::search(&service, &request, false).await;

    assert_eq!(response.status, 200);
    assert_eq!(response.body["motor"], "mongodb");
    // two titles plus one body text mention "manual"
    assert_eq!(response.body["total"], 3);
    let documents = response.body["documentos"].as_array().unwrap();
    assert_eq!(documents[0]["numero"], 3);
    assert!(documents.iter().all(|d| d.get("_highlight").is_none() && d.get("_score").is_none()));
}

#[tokio::test]
async fn test_engine_error_status_falls_back() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("cluster unavailable"))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = SearchConfig {
        elasticsearch_url: server.uri(),
        ..Default::default()
    };
    let service = SearchService::new(
        seeded_store(dir.path()),
        ElasticIndex::from_config(&config).unwrap(),
        &config,
    );

    let result = service.aggregate(&SearchQuery::text("boletín")).await.unwrap();
    assert_eq!(result.engine, Engine::Mongodb);
    assert_eq!(result.total, 1);
    assert!(result.aggregations.unwrap().categorias.is_empty());
}

#[tokio::test]
async fn test_paging_is_clamped() {
    let dir = tempfile::tempdir().unwrap();
    let service = SearchService::new(seeded_store(dir.path()), None, &SearchConfig::default());

    let request = SearchRequest {
        pagina: Some("0".to_string()),
        por_pagina: Some("1000".to_string()),
        ..Default::default()
    };
    let response = api::search(&service, &request, false).await;
    assert_eq!(response.body["pagina"], 1);
    assert_eq!(response.body["por_pagina"], 100);
    assert_eq!(response.body["total_paginas"], 1);

    let query = SearchQuery {
        page: 2,
        per_page: 3,
        ..Default::default()
    };
    let result = service.search(&query).await.unwrap();
    assert_eq!(result.total, 4);
    assert_eq!(result.total_pages, 2);
    assert_eq!(result.documents.len(), 1);
}

#[tokio::test]
async fn test_page_beyond_any_offset_returns_empty_page() {
    let dir = tempfile::tempdir().unwrap();
    let service = SearchService::new(seeded_store(dir.path()), None, &SearchConfig::default());

    let request = SearchRequest {
        query: "manual".to_string(),
        pagina: Some(i64::MAX.to_string()),
        por_pagina: Some("10".to_string()),
        ..Default::default()
    };
    let response = api::search(&service, &request, false).await;

    assert_eq!(response.status, 200);
    assert_eq!(response.body["pagina"], i64::MAX);
    assert_eq!(response.body["total"], 3);
    assert!(response.body["documentos"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_store_round_trip_and_lookup() {
    let dir = tempfile::tempdir().unwrap();
    let store = seeded_store(dir.path());
    let service = SearchService::new(store, None, &SearchConfig::default());

    let document = service.get_document(3).unwrap().unwrap();
    assert_eq!(document.metadata.category, Category::Resolutions);
    assert_eq!(document.metadata.year, Some(2024));
    assert_eq!(document, create_test_document(3, "Resolución 2024 sobre vigilancia", "ver manual anexo", 3));

    let no_year = service.get_document(1).unwrap().unwrap();
    assert_eq!(no_year.metadata.year, None);

    let detail = api::document_detail(&service, 99);
    assert_eq!(detail.status, 404);
    assert_eq!(detail.body["error"], "Document not found");
}

#[tokio::test]
async fn test_statistics_and_suggestions() {
    let dir = tempfile::tempdir().unwrap();
    let service = SearchService::new(seeded_store(dir.path()), None, &SearchConfig::default());

    let stats = api::statistics(&service);
    assert_eq!(stats.body["exito"], true);
    assert_eq!(stats.body["total_documentos"], 4);
    assert_eq!(stats.body["tipos"][0]["nombre"], "PDF");
    assert_eq!(stats.body["años"][0]["año"], 2024);

    let suggestions = api::suggestions(&service, "manual", Some(1)).await;
    assert_eq!(suggestions.body["sugerencias"].as_array().unwrap().len(), 1);
}
