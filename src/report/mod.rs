//! Crawl reports
//!
//! This module records what a harvesting run did:
//! - The run configuration and its hash
//! - Per-section and per-page crawl statistics
//! - Discovered and downloaded documents, and batch errors
//! - Summary counts, printed to stdout and written as JSON once per run

mod stats;

pub use stats::{print_crawl_summary, print_statistics};

use crate::config::Config;
use crate::crawler::{DiscoveredDocument, PageVisit, SectionStats, SessionOutcome};
use crate::document::Document;
use crate::materializer::{BatchError, BatchReport, BatchStage};
use crate::HarvestError;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Settings the run was started with
#[derive(Debug, Clone, Serialize)]
pub struct RunConfiguration {
    pub base_url: String,
    pub target_documents: usize,
    pub max_pages: usize,
    pub request_delay_ms: u64,
    pub user_agent: String,
    pub config_hash: String,
}

/// Counts extracted from one visited page
#[derive(Debug, Clone, Serialize)]
pub struct PageStats {
    pub url: String,
    pub title: String,
    pub texts: usize,
    pub links: usize,
    pub tables: usize,
    pub documents: usize,
}

impl From<&PageVisit> for PageStats {
    fn from(visit: &PageVisit) -> Self {
        Self {
            url: visit.url.clone(),
            title: visit.title.clone(),
            texts: visit.texts.len(),
            links: visit.links.len(),
            tables: visit.tables.len(),
            documents: visit.documents.len(),
        }
    }
}

/// Headline numbers for a run
#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub pages_visited: usize,
    pub documents_found: usize,
    pub documents_downloaded: usize,
    pub download_errors: usize,

    /// Discovered documents per type label
    pub documents_by_type: BTreeMap<String, usize>,
    pub robots_skipped: usize,
    pub target_reached: bool,
}

/// Everything written to the JSON report
#[derive(Debug, Clone, Serialize)]
pub struct CrawlReport {
    pub configuration: RunConfiguration,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub robots_txt_found: bool,
    pub sections: Vec<SectionStats>,
    pub pages: Vec<PageStats>,
    pub discovered: Vec<DiscoveredDocument>,
    pub downloaded: Vec<Document>,
    pub errors: Vec<BatchError>,
    pub summary: ReportSummary,
}

impl CrawlReport {
    /// Assembles the report for a finished run
    ///
    /// # Arguments
    ///
    /// * `config` - The run configuration
    /// * `config_hash` - SHA-256 of the configuration file
    /// * `started_at` - When the run began
    /// * `outcome` - The crawl session's outcome
    /// * `batch` - The materialization batch, absent for crawl-only runs
    pub fn new(
        config: &Config,
        config_hash: &str,
        started_at: DateTime<Local>,
        outcome: &SessionOutcome,
        batch: Option<&BatchReport>,
    ) -> Self {
        let mut documents_by_type = BTreeMap::new();
        for document in &outcome.documents {
            *documents_by_type
                .entry(document.file_type.clone())
                .or_insert(0) += 1;
        }

        let (downloaded, errors, documents_downloaded) = match batch {
            Some(batch) => (batch.documents.clone(), batch.errors.clone(), batch.downloaded),
            None => (Vec::new(), Vec::new(), 0),
        };
        let download_errors = errors.iter().filter(|e| e.stage == BatchStage::Download).count();

        Self {
            configuration: RunConfiguration {
                base_url: config.crawler.base_url.clone(),
                target_documents: config.crawler.target_documents,
                max_pages: config.crawler.max_pages,
                request_delay_ms: config.crawler.request_delay_ms,
                user_agent: config.user_agent.header_value(),
                config_hash: config_hash.to_string(),
            },
            started_at,
            finished_at: Local::now(),
            robots_txt_found: outcome.robots.is_found(),
            sections: outcome.sections.clone(),
            pages: outcome.pages.iter().map(PageStats::from).collect(),
            discovered: outcome.documents.clone(),
            downloaded,
            errors,
            summary: ReportSummary {
                pages_visited: outcome.pages_visited,
                documents_found: outcome.documents.len(),
                documents_downloaded,
                download_errors,
                documents_by_type,
                robots_skipped: outcome.robots_skipped,
                target_reached: outcome.target_reached,
            },
        }
    }

    /// Writes the report as pretty JSON into `dir`
    ///
    /// # Returns
    ///
    /// * `Ok(PathBuf)` - Path of the written file
    /// * `Err(HarvestError)` - Serialization or IO failure
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf, HarvestError> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!(
            "crawl_report_{}.json",
            self.finished_at.format("%Y%m%d_%H%M%S")
        ));

        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;

        tracing::info!("Crawl report written to {}", path.display());
        Ok(path)
    }
}
