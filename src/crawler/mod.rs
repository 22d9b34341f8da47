//! Crawler module for document discovery
//!
//! This module contains the crawling logic, including:
//! - Rate-limited HTTP fetching with retry logic
//! - HTML extraction of texts, links, tables and document links
//! - Frontier management and duplicate suppression
//! - Session coordination (section-driven and breadth-first strategies)

mod extractor;
mod fetcher;
mod frontier;
mod session;

pub use extractor::{
    document_extension, extract_document_links, extract_links, extract_tables, extract_texts,
    extract_title, DiscoveredDocument, PageVisit, DOCUMENT_EXTENSIONS,
};
pub use fetcher::{build_http_client, FetchError, FetchedPage, RateLimitedFetcher};
pub use frontier::Frontier;
pub use session::{CrawlSession, SectionStats, SessionOutcome};

use crate::config::Config;
use crate::HarvestError;

/// Runs a discovery crawl with the given configuration
///
/// # Arguments
///
/// * `config` - The full configuration
///
/// # Returns
///
/// * `Ok((SessionOutcome, RateLimitedFetcher))` - The crawl outcome and the fetcher, for downloads
/// * `Err(HarvestError)` - The fetcher or session could not be built
pub async fn crawl(config: &Config) -> Result<(SessionOutcome, RateLimitedFetcher), HarvestError> {
    let fetcher = RateLimitedFetcher::new(&config.crawler, &config.user_agent)?;
    let session = CrawlSession::new(config.crawler.clone(), &config.user_agent.name, fetcher)?;
    Ok(session.run().await)
}
