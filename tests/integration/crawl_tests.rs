//! Integration tests for the crawler and materializer
//!
//! These tests use wiremock to create mock portals and run the crawl,
//! download and report cycle end-to-end.

use chrono::Local;
use docharvest::config::{Config, CrawlerConfig, OutputConfig, SearchConfig, UserAgentConfig};
use docharvest::crawler::crawl;
use docharvest::document::DocumentStatus;
use docharvest::materializer::Materializer;
use docharvest::report::CrawlReport;
use docharvest::storage::{lock, open_store, shared};
use std::path::Path;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration pointing at the mock portal
fn create_test_config(base_url: &str, sections: &[&str], work_dir: &Path) -> Config {
    Config {
        crawler: CrawlerConfig {
            base_url: base_url.to_string(),
            sections: sections.iter().map(|s| s.to_string()).collect(),
            target_documents: 10,
            max_pages: 20,
            request_delay_ms: 10, // Very short for testing
            max_retries: 0,
            retry_backoff_ms: 10,
            child_links_per_page: 5,
            link_keywords: vec!["normativ".to_string(), "documento".to_string()],
            max_downloads: 0,
        },
        user_agent: UserAgentConfig {
            name: "TestHarvester".to_string(),
            purpose: Some("Integration tests".to_string()),
            contact_email: None,
        },
        output: OutputConfig {
            database_path: work_dir.join("docs.db").to_string_lossy().into_owned(),
            download_dir: work_dir.join("downloads").to_string_lossy().into_owned(),
            report_dir: work_dir.join("reports").to_string_lossy().into_owned(),
            source_label: "Portal de prueba".to_string(),
        },
        search: SearchConfig::default(),
    }
}

async fn mount_page(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(format!("<html><head><title>{}</title></head><body>{}</body></html>", route, body))
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

async fn mount_file(server: &MockServer, route: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status).set_body_bytes(b"PK\x03\x04 test".to_vec()))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_duplicate_document_links_discovered_once() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/seccion",
        r#"<a href="/docs/informe.pdf">Informe anual</a>
           <a href="/docs/informe.pdf">Descargar</a>
           <a href="/normatividad">Normatividad</a>"#,
    )
    .await;
    mount_page(
        &server,
        "/normatividad",
        r#"<a href="/docs/informe.pdf">Otro título</a><a href="/docs/circular.docx">Circular</a>"#,
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&server.uri(), &["/seccion"], dir.path());
    let (outcome, _) = crawl(&config).await.unwrap();

    let informe: Vec<_> = outcome
        .documents
        .iter()
        .filter(|d| d.url.ends_with("/docs/informe.pdf"))
        .collect();
    assert_eq!(informe.len(), 1);
    assert_eq!(informe[0].title, "Informe anual");
    assert_eq!(informe[0].file_type, "PDF");
    assert_eq!(outcome.documents.len(), 2);
    assert_eq!(outcome.sections[0].documents_found, 2);
}

#[tokio::test]
async fn test_page_cap_bounds_visits() {
    let server = MockServer::start().await;
    let links: String = (1..=8)
        .map(|n| format!(r#"<a href="/p{}">{}</a>"#, n, n))
        .collect();
    mount_page(&server, "/", &links).await;
    for n in 1..=8 {
        mount_page(&server, &format!("/p{}", n), &links).await;
    }

    let dir = tempfile::tempdir().unwrap();
    let mut config = create_test_config(&server.uri(), &[], dir.path());
    config.crawler.max_pages = 4;

    let (outcome, _) = crawl(&config).await.unwrap();

    assert!(outcome.pages_visited <= 4);
    assert!(outcome.pages.len() <= 4);
    assert!(!outcome.target_reached);

    let mut urls: Vec<_> = outcome.pages.iter().map(|p| p.url.clone()).collect();
    urls.sort();
    urls.dedup();
    assert_eq!(urls.len(), outcome.pages.len());
}

#[tokio::test]
async fn test_robots_disallowed_pages_never_fetched() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /privado\n"))
        .mount(&server)
        .await;
    mount_page(
        &server,
        "/seccion",
        r#"<a href="/privado/normativa">Privado</a><a href="/publico/normativa">Público</a>"#,
    )
    .await;
    mount_page(&server, "/publico/normativa", r#"<a href="/docs/ley.pdf">Ley</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/privado/normativa"))
        .respond_with(ResponseTemplate::new(200).set_body_string("secret"))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&server.uri(), &["/seccion"], dir.path());
    let (outcome, _) = crawl(&config).await.unwrap();

    assert!(outcome.robots.is_found());
    assert!(outcome.robots_skipped >= 1);
    assert_eq!(outcome.documents.len(), 1);
    assert!(outcome.pages.iter().all(|p| !p.url.contains("/privado")));
}

#[tokio::test]
async fn test_failed_download_continues_batch() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/seccion",
        r#"<a href="/files/uno.zip">Resolución 2023 uno</a>
           <a href="/files/dos.zip">Manual dos</a>
           <a href="/files/tres.zip">Boletín tres</a>"#,
    )
    .await;
    mount_file(&server, "/files/uno.zip", 200).await;
    mount_file(&server, "/files/dos.zip", 404).await;
    mount_file(&server, "/files/tres.zip", 200).await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = create_test_config(&server.uri(), &["/seccion"], dir.path());
    config.crawler.target_documents = 3;

    let (outcome, mut fetcher) = crawl(&config).await.unwrap();
    assert!(outcome.target_reached);

    let store = shared(open_store(Path::new(&config.output.database_path)).unwrap());
    let materializer = Materializer::from_config(&config, store.clone(), None);
    let batch = materializer
        .materialize_batch(&mut fetcher, &outcome.documents, 1)
        .await;

    assert_eq!(batch.documents.len(), 3);
    assert_eq!(batch.downloaded, 2);
    assert_eq!(batch.errors.len(), 1);
    assert_eq!(batch.errors[0].numero, 2);

    {
        let guard = lock(&store).unwrap();
        let failed = guard.get_document(2).unwrap().unwrap();
        assert_eq!(failed.status, DocumentStatus::Error);
        assert!(!failed.file_exists);

        let first = guard.get_document(1).unwrap().unwrap();
        assert_eq!(first.status, DocumentStatus::Available);
        assert_eq!(first.metadata.year, Some(2023));
        assert!(Path::new(&first.local_path).exists());
        assert!(first.file_name.starts_with("001_Resolución 2023 uno_"));

        assert_eq!(guard.next_id().unwrap(), 4);
    }

    let report = CrawlReport::new(&config, "hash", Local::now(), &outcome, Some(&batch));
    let written = report
        .write_to(Path::new(&config.output.report_dir))
        .unwrap();
    assert!(written.exists());
    assert_eq!(report.summary.documents_downloaded, 2);
    assert_eq!(report.summary.download_errors, 1);
}
