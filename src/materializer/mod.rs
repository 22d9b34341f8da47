//! Document materialization
//!
//! This module turns discovered document links into stored documents:
//! - Downloading each file under a deterministic local name
//! - Deriving size, category and year
//! - Extracting text from PDF and DOCX files
//! - Persisting into the document store and mirroring into the search index
//! - A later pass that fills in missing text for stored documents
//!
//! A single failed document never stops a batch; its error is recorded and
//! an `error` document is stored in its place.

mod naming;
mod text;

pub use naming::{local_file_name, sanitize_title};
pub use text::{extract_text, extract_text_or_empty, ExtractError};

use crate::config::{Config, CrawlerConfig};
use crate::crawler::{DiscoveredDocument, RateLimitedFetcher};
use crate::document::{Document, DocumentDraft};
use crate::index::ElasticIndex;
use crate::storage::{lock, SharedStore, StorageResult};
use chrono::Local;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Stored documents with less text than this are reprocessed
pub const MIN_TEXT_CHARS: usize = 100;

/// Result of materializing one discovered document
#[derive(Debug, Clone)]
pub struct MaterializeOutcome {
    pub document: Document,

    /// Download failure, if any
    pub error: Option<String>,
}

/// Step of a batch at which a document failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStage {
    Download,
    Store,
    Index,
}

impl BatchStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Download => "download",
            Self::Store => "store",
            Self::Index => "index",
        }
    }
}

impl fmt::Display for BatchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure recorded during a batch
#[derive(Debug, Clone, Serialize)]
pub struct BatchError {
    pub numero: i64,
    pub url: String,
    pub title: String,
    pub stage: BatchStage,
    pub message: String,
}

/// Summary of a materialization batch
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub documents: Vec<Document>,
    pub downloaded: usize,
    pub errors: Vec<BatchError>,
}

/// Counts from a text reprocessing pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReprocessSummary {
    pub processed: usize,
    pub updated: usize,
    pub failed: usize,
}

/// Number of documents to download from `found` discovered ones
///
/// An explicit `max-downloads` wins; otherwise the crawl target caps it.
pub fn download_limit(crawler: &CrawlerConfig, found: usize) -> usize {
    if crawler.max_downloads > 0 {
        crawler.max_downloads.min(found)
    } else {
        crawler.target_documents.min(found)
    }
}

/// Downloads documents and writes them to the store and index
pub struct Materializer {
    download_dir: PathBuf,
    source_label: String,
    store: SharedStore,
    index: Option<ElasticIndex>,
}

impl Materializer {
    pub fn new(
        download_dir: impl Into<PathBuf>,
        source_label: impl Into<String>,
        store: SharedStore,
        index: Option<ElasticIndex>,
    ) -> Self {
        Self {
            download_dir: download_dir.into(),
            source_label: source_label.into(),
            store,
            index,
        }
    }

    /// Creates a materializer from the output configuration
    pub fn from_config(config: &Config, store: SharedStore, index: Option<ElasticIndex>) -> Self {
        Self::new(
            &config.output.download_dir,
            &config.output.source_label,
            store,
            index,
        )
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Downloads one document and builds its record
    ///
    /// Never fails: a download error yields an `error` document and is
    /// returned alongside it.
    ///
    /// # Arguments
    ///
    /// * `fetcher` - The crawl's fetcher, so downloads share its politeness clock
    /// * `discovered` - The document link to materialize
    /// * `numero` - Identifier to assign
    pub async fn materialize(
        &self,
        fetcher: &mut RateLimitedFetcher,
        discovered: &DiscoveredDocument,
        numero: i64,
    ) -> MaterializeOutcome {
        let downloaded_at = Local::now().naive_local();
        let extension = discovered.file_type.to_lowercase();
        let file_name = local_file_name(numero, &discovered.title, &extension, downloaded_at);
        let local_path = self.download_dir.join(&file_name);

        let (file_exists, size_bytes, text, error) =
            match fetcher.download(&discovered.url, &local_path).await {
                Ok(size) => {
                    let text = extract_in_background(local_path.clone(), extension).await;
                    (true, size, text, None)
                }
                Err(e) => {
                    tracing::error!("Failed to download {}: {}", discovered.url, e);
                    (false, 0, String::new(), Some(e.to_string()))
                }
            };

        let document = Document::from_draft(DocumentDraft {
            id: numero,
            title: discovered.title.clone(),
            file_type: discovered.file_type.clone(),
            source_url: discovered.url.clone(),
            file_name,
            local_path: local_path.to_string_lossy().into_owned(),
            size_bytes,
            downloaded_at,
            source: self.source_label.clone(),
            text,
            file_exists,
        });

        MaterializeOutcome { document, error }
    }

    /// Materializes documents with sequential identifiers starting at `start`
    ///
    /// Every document is written to the store, including failed downloads.
    /// Store and index failures are recorded in the report and do not stop
    /// the batch.
    pub async fn materialize_batch(
        &self,
        fetcher: &mut RateLimitedFetcher,
        documents: &[DiscoveredDocument],
        start: i64,
    ) -> BatchReport {
        let mut report = BatchReport::default();
        let total = documents.len();

        for (offset, discovered) in documents.iter().enumerate() {
            let numero = start + offset as i64;
            tracing::info!(
                "[{}/{}] Materializing document {}: {}",
                offset + 1,
                total,
                numero,
                discovered.title
            );

            let outcome = self.materialize(fetcher, discovered, numero).await;
            let mut record_error = |stage: BatchStage, message: String| {
                report.errors.push(BatchError {
                    numero,
                    url: discovered.url.clone(),
                    title: discovered.title.clone(),
                    stage,
                    message,
                });
            };

            match outcome.error {
                Some(message) => record_error(BatchStage::Download, message),
                None => report.downloaded += 1,
            }

            if let Err(e) = self.persist(&outcome.document) {
                tracing::error!("Failed to store document {}: {}", numero, e);
                record_error(BatchStage::Store, e.to_string());
                continue;
            }

            if let Err(message) = self.mirror(&outcome.document).await {
                record_error(BatchStage::Index, message);
            }

            report.documents.push(outcome.document);
        }

        self.refresh_index().await;

        tracing::info!(
            "Materialized {} documents ({} downloaded, {} errors)",
            report.documents.len(),
            report.downloaded,
            report.errors.len()
        );

        report
    }

    /// Fills in text for stored documents that have little or none
    ///
    /// Missing files are downloaded again from their original URL. Documents
    /// that end up with text are rewritten in the store and re-indexed.
    pub async fn reprocess_text(
        &self,
        fetcher: &mut RateLimitedFetcher,
    ) -> StorageResult<ReprocessSummary> {
        let pending = lock(&self.store)?.documents_needing_text(MIN_TEXT_CHARS)?;
        let mut summary = ReprocessSummary::default();
        tracing::info!("{} documents need text extraction", pending.len());

        for mut document in pending {
            summary.processed += 1;
            let path = PathBuf::from(&document.local_path);

            if !path.exists() {
                tracing::warn!("File missing for document {}, downloading again", document.id);
                if let Err(e) = fetcher.download(&document.source_url, &path).await {
                    tracing::error!("Could not re-download document {}: {}", document.id, e);
                    summary.failed += 1;
                    continue;
                }
            }

            let size_bytes = match tokio::fs::metadata(&path).await {
                Ok(meta) => meta.len(),
                Err(e) => {
                    tracing::error!("Cannot stat {}: {}", path.display(), e);
                    summary.failed += 1;
                    continue;
                }
            };

            let text = extract_in_background(path, document.metadata.extension.clone()).await;
            if text.is_empty() {
                summary.failed += 1;
                continue;
            }

            document.set_file_state(true, size_bytes, text);
            lock(&self.store)?.upsert_document(&document)?;
            if self.mirror(&document).await.is_ok() {
                tracing::debug!("Re-indexed document {}", document.id);
            }

            tracing::info!(
                "Extracted {} characters for document {}",
                document.text.chars().count(),
                document.id
            );
            summary.updated += 1;
        }

        self.refresh_index().await;
        Ok(summary)
    }

    /// Writes every stored document into the index
    ///
    /// # Returns
    ///
    /// The number of documents indexed
    pub async fn reindex_all(&self) -> crate::Result<usize> {
        let Some(index) = &self.index else {
            return Err(crate::index::IndexError::Disabled.into());
        };

        index.ensure_index().await?;
        let documents = lock(&self.store)?.all_documents()?;

        let mut indexed = 0;
        for document in &documents {
            match index.upsert(document).await {
                Ok(()) => indexed += 1,
                Err(e) => tracing::warn!("Failed to index document {}: {}", document.id, e),
            }
        }

        index.refresh().await?;
        tracing::info!("Indexed {}/{} documents", indexed, documents.len());
        Ok(indexed)
    }

    fn persist(&self, document: &Document) -> StorageResult<()> {
        lock(&self.store)?.insert_document(document)
    }

    async fn mirror(&self, document: &Document) -> Result<(), String> {
        let Some(index) = &self.index else {
            return Ok(());
        };

        index.upsert(document).await.map_err(|e| {
            tracing::warn!("Failed to index document {}: {}", document.id, e);
            e.to_string()
        })
    }

    async fn refresh_index(&self) {
        if let Some(index) = &self.index {
            if let Err(e) = index.refresh().await {
                tracing::warn!("Failed to refresh search index: {}", e);
            }
        }
    }
}

async fn extract_in_background(path: PathBuf, extension: String) -> String {
    let label = path.display().to_string();
    match tokio::task::spawn_blocking(move || extract_text_or_empty(&path, &extension)).await {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!("Text extraction task for {} failed: {}", label, e);
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentStatus;
    use crate::storage::{shared, SqliteStore};
    use chrono::Utc;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_fetcher() -> RateLimitedFetcher {
        RateLimitedFetcher::with_client(
            reqwest::Client::new(),
            Duration::from_millis(1),
            0,
            Duration::from_millis(1),
        )
    }

    fn discovered(url: String, title: &str, file_type: &str) -> DiscoveredDocument {
        DiscoveredDocument {
            url,
            title: title.to_string(),
            file_type: file_type.to_string(),
            found_on: "https://portal.example.gov/".to_string(),
            discovered_at: Utc::now(),
        }
    }

    fn create_test_materializer(dir: &Path) -> (Materializer, SharedStore) {
        let store = shared(SqliteStore::open_in_memory().unwrap());
        let materializer = Materializer::new(dir, "Fuente de prueba", store.clone(), None);
        (materializer, store)
    }

    #[test]
    fn test_download_limit() {
        let mut crawler = crate::config::CrawlerConfig {
            base_url: "https://portal.example.gov".to_string(),
            sections: Vec::new(),
            target_documents: 10,
            max_pages: 20,
            request_delay_ms: 100,
            max_retries: 0,
            retry_backoff_ms: 10,
            child_links_per_page: 5,
            link_keywords: Vec::new(),
            max_downloads: 0,
        };
        assert_eq!(download_limit(&crawler, 25), 10);
        assert_eq!(download_limit(&crawler, 4), 4);

        crawler.max_downloads = 15;
        assert_eq!(download_limit(&crawler, 25), 15);
    }

    #[tokio::test]
    async fn test_materialize_unsupported_type() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/docs/anexo.xlsx"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 2048]))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let (materializer, _) = create_test_materializer(dir.path());
        let link = discovered(format!("{}/docs/anexo.xlsx", server.uri()), "Informe de gestión 2023", "XLSX");

        let outcome = materializer.materialize(&mut test_fetcher(), &link, 3).await;
        let doc = outcome.document;

        assert!(outcome.error.is_none());
        assert!(doc.file_exists);
        assert_eq!(doc.status, DocumentStatus::Available);
        assert_eq!(doc.size_bytes, 2048);
        assert_eq!(doc.text, "");
        assert_eq!(doc.metadata.extension, "xlsx");
        assert_eq!(doc.metadata.year, Some(2023));
        assert!(doc.file_name.starts_with("003_Informe de gestión 2023_"));
        assert!(doc.file_name.ends_with(".xlsx"));
        assert!(Path::new(&doc.local_path).exists());
        assert_eq!(doc.source, "Fuente de prueba");
    }

    #[tokio::test]
    async fn test_materialize_failed_download() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let (materializer, _) = create_test_materializer(dir.path());
        let link = discovered(format!("{}/missing.pdf", server.uri()), "Resolución 10", "PDF");

        let outcome = materializer.materialize(&mut test_fetcher(), &link, 1).await;

        assert!(outcome.error.is_some());
        assert!(!outcome.document.file_exists);
        assert_eq!(outcome.document.status, DocumentStatus::Error);
        assert_eq!(outcome.document.size_bytes, 0);
        assert!(outcome.document.check_invariants().is_ok());
    }

    #[tokio::test]
    async fn test_batch_numbers_sequentially_and_persists() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"PK".to_vec()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/b.zip"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let (materializer, store) = create_test_materializer(dir.path());
        let links = vec![
            discovered(format!("{}/a.zip", server.uri()), "Paquete A", "ZIP"),
            discovered(format!("{}/b.zip", server.uri()), "Paquete B", "ZIP"),
        ];

        let report = materializer
            .materialize_batch(&mut test_fetcher(), &links, 5)
            .await;

        assert_eq!(report.documents.len(), 2);
        assert_eq!(report.downloaded, 1);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].numero, 6);
        assert_eq!(report.errors[0].stage, BatchStage::Download);

        let guard = lock(&store).unwrap();
        assert_eq!(guard.get_document(5).unwrap().unwrap().status, DocumentStatus::Available);
        assert_eq!(guard.get_document(6).unwrap().unwrap().status, DocumentStatus::Error);
        assert_eq!(guard.next_id().unwrap(), 7);
    }

    #[tokio::test]
    async fn test_batch_records_store_conflicts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"x".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let (materializer, _) = create_test_materializer(dir.path());
        let first = vec![discovered(format!("{}/a.rar", server.uri()), "A", "RAR")];
        let second = vec![discovered(format!("{}/b.rar", server.uri()), "B", "RAR")];

        materializer.materialize_batch(&mut test_fetcher(), &first, 1).await;
        let report = materializer
            .materialize_batch(&mut test_fetcher(), &second, 1)
            .await;

        assert!(report.documents.is_empty());
        assert_eq!(report.errors[0].stage, BatchStage::Store);
    }

    #[tokio::test]
    async fn test_reprocess_counts_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let (materializer, store) = create_test_materializer(dir.path());
        let link = discovered(format!("{}/gone.pdf", server.uri()), "Manual", "PDF");
        materializer
            .materialize_batch(&mut test_fetcher(), &[link], 1)
            .await;

        let summary = materializer
            .reprocess_text(&mut test_fetcher())
            .await
            .unwrap();

        assert_eq!(summary, ReprocessSummary { processed: 1, updated: 0, failed: 1 });
        let guard = lock(&store).unwrap();
        assert_eq!(guard.get_document(1).unwrap().unwrap().status, DocumentStatus::Error);
    }

    #[tokio::test]
    async fn test_reindex_requires_engine() {
        let dir = tempfile::tempdir().unwrap();
        let (materializer, _) = create_test_materializer(dir.path());
        assert!(materializer.reindex_all().await.is_err());
    }
}
