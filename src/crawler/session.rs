//! Crawl session coordination
//!
//! A session drives the fetcher over the portal in two passes:
//! 1. Section-driven exploration of the configured section pages, following
//!    a few keyword-matching child links per page
//! 2. A breadth-first sweep from the portal root when the first pass
//!    under-shoots the document target
//!
//! Robots.txt is checked once per session and consulted before every fetch.

use crate::config::CrawlerConfig;
use crate::crawler::extractor::{document_extension, DiscoveredDocument, PageVisit};
use crate::crawler::fetcher::RateLimitedFetcher;
use crate::crawler::frontier::Frontier;
use crate::robots::{RobotsPolicy, RobotsTxt};
use crate::HarvestError;
use serde::Serialize;
use std::time::Instant;
use url::Url;

/// Documents found while exploring one configured section
#[derive(Debug, Clone, Serialize)]
pub struct SectionStats {
    pub section: String,
    pub url: String,
    pub documents_found: usize,
}

/// Everything a finished session produced
#[derive(Debug)]
pub struct SessionOutcome {
    pub robots: RobotsTxt,
    pub sections: Vec<SectionStats>,
    pub pages: Vec<PageVisit>,
    pub documents: Vec<DiscoveredDocument>,
    pub pages_visited: usize,
    pub robots_skipped: usize,
    pub target_reached: bool,
}

/// Drives one crawl over the portal
pub struct CrawlSession {
    config: CrawlerConfig,
    base: Url,
    base_prefix: String,
    agent_name: String,
    fetcher: RateLimitedFetcher,
    frontier: Frontier,
    robots: RobotsPolicy,
    robots_txt: RobotsTxt,
    pages: Vec<PageVisit>,
    sections: Vec<SectionStats>,
    started: Instant,
}

impl CrawlSession {
    /// Creates a session
    ///
    /// # Arguments
    ///
    /// * `config` - Crawler configuration (base URL, sections, limits)
    /// * `agent_name` - User agent name used for robots.txt group matching
    /// * `fetcher` - The rate-limited fetcher the session owns for its lifetime
    pub fn new(
        config: CrawlerConfig,
        agent_name: &str,
        fetcher: RateLimitedFetcher,
    ) -> Result<Self, HarvestError> {
        let base = Url::parse(&config.base_url)?;
        let base_prefix = config.base_url.trim_end_matches('/').to_string();
        let frontier = Frontier::new(config.max_pages, config.target_documents);

        Ok(Self {
            config,
            base,
            base_prefix,
            agent_name: agent_name.to_string(),
            fetcher,
            frontier,
            robots: RobotsPolicy::allow_all(),
            robots_txt: RobotsTxt::Unavailable("robots.txt not checked".to_string()),
            pages: Vec::new(),
            sections: Vec::new(),
            started: Instant::now(),
        })
    }

    /// Fetches robots.txt and installs the resulting policy
    ///
    /// A `Crawl-delay` longer than the configured delay raises the fetcher delay.
    pub async fn load_robots(&mut self) -> &RobotsTxt {
        let robots_txt = self.fetcher.check_robots_txt(self.base.as_str()).await;
        self.robots = RobotsPolicy::from_robots_txt(&robots_txt, &self.agent_name);

        if let Some(delay) = self.robots.crawl_delay() {
            if delay > self.fetcher.delay() {
                tracing::info!(
                    "robots.txt Crawl-delay {:?} exceeds configured delay, using it",
                    delay
                );
                self.fetcher.set_delay(delay);
            }
        }

        self.robots_txt = robots_txt;
        &self.robots_txt
    }

    /// Runs both strategies and returns the outcome together with the fetcher
    ///
    /// The fetcher is handed back so downloads keep the same request clock.
    pub async fn run(mut self) -> (SessionOutcome, RateLimitedFetcher) {
        tracing::info!(
            "Starting crawl of {} (target: {} documents, page cap: {})",
            self.base,
            self.config.target_documents,
            self.config.max_pages
        );

        self.load_robots().await;
        self.explore_sections().await;

        if !self.frontier.target_reached() {
            tracing::warn!(
                "Target not reached after sections ({}/{}), starting deep search",
                self.frontier.discovered_count(),
                self.config.target_documents
            );
            self.deep_search().await;
        }

        tracing::info!(
            "Crawl completed: {} pages visited, {} documents found in {:?}",
            self.frontier.visited_count(),
            self.frontier.discovered_count(),
            self.started.elapsed()
        );

        self.finish()
    }

    /// Explores the configured section pages in order
    ///
    /// Each section page is a root of a depth-first walk over keyword-matching
    /// child links, at most `child-links-per-page` per page, driven by an
    /// explicit work stack.
    pub async fn explore_sections(&mut self) {
        let sections = self.config.sections.clone();

        for section in sections {
            if self.frontier.target_reached() {
                tracing::info!(
                    "Target reached: {} documents",
                    self.frontier.discovered_count()
                );
                break;
            }

            let url = format!("{}{}", self.base_prefix, section);
            tracing::info!("Section: {}", section);

            let before = self.frontier.discovered_count();
            self.explore_from(&url).await;
            let found = self.frontier.discovered_count() - before;

            tracing::info!(
                "Documents found in section: {} (total: {})",
                found,
                self.frontier.discovered_count()
            );
            self.sections.push(SectionStats {
                section,
                url,
                documents_found: found,
            });
        }
    }

    async fn explore_from(&mut self, root: &str) {
        let mut stack = vec![root.to_string()];

        while let Some(url) = stack.pop() {
            if self.frontier.target_reached() {
                break;
            }

            let Some(links) = self.visit(&url).await else {
                continue;
            };

            if self.frontier.target_reached() {
                break;
            }

            let children: Vec<String> = links
                .into_iter()
                .filter(|link| !self.frontier.is_visited(link) && self.is_promising(link))
                .take(self.config.child_links_per_page)
                .collect();

            // reversed so the first child is explored first
            stack.extend(children.into_iter().rev());
        }
    }

    /// Breadth-first sweep from the portal root following every same-origin link
    pub async fn deep_search(&mut self) {
        let root = self.base.to_string();

        if self.frontier.is_visited(&root) {
            // the root was already seen; reuse its links
            let links: Vec<String> = self
                .pages
                .iter()
                .find(|p| p.url == root)
                .map(|p| p.links.clone())
                .unwrap_or_default();
            for link in links.iter().filter(|link| !is_document_url(link)) {
                self.frontier.enqueue(link);
            }
        } else {
            self.frontier.enqueue(&root);
        }

        while let Some(url) = self.frontier.next_url() {
            if self.frontier.target_reached() || self.frontier.cap_reached() {
                break;
            }

            if let Some(links) = self.visit(&url).await {
                for link in links {
                    self.frontier.enqueue(&link);
                }
            }
        }
    }

    /// Visits one page: robots check, fetch, extraction, document recording
    ///
    /// # Returns
    ///
    /// * `Some(links)` - Same-origin links found on the page
    /// * `None` - Already visited, over the cap, disallowed, or the fetch failed
    async fn visit(&mut self, url: &str) -> Option<Vec<String>> {
        if !self.frontier.should_visit(url) {
            return None;
        }

        if !self.robots.is_allowed(url) {
            tracing::info!("URL {} disallowed by robots.txt", url);
            self.frontier.exclude(url);
            return None;
        }

        self.frontier.mark_visited(url);
        self.report_progress();

        let page = self.fetcher.fetch_page(url).await?;
        let mut visit = PageVisit::extract(&page.url, &page.body, Some(&self.base));
        visit.url = url.to_string();

        for document in self.frontier.record_documents(visit.documents.clone()) {
            tracing::info!("Document found: {} [{}]", document.title, document.file_type);
        }

        // document links are downloads, not pages
        let links: Vec<String> = visit
            .links
            .iter()
            .filter(|link| !is_document_url(link))
            .cloned()
            .collect();
        self.pages.push(visit);
        Some(links)
    }

    fn is_promising(&self, link: &str) -> bool {
        let lowered = link.to_lowercase();
        self.config
            .link_keywords
            .iter()
            .any(|keyword| lowered.contains(keyword.as_str()))
    }

    fn report_progress(&self) {
        let visited = self.frontier.visited_count();
        if visited % 10 == 0 {
            let rate = visited as f64 / self.started.elapsed().as_secs_f64().max(f64::EPSILON);
            tracing::info!(
                "Progress: {} pages visited, {} documents found, {} queued, {:.2} pages/sec",
                visited,
                self.frontier.discovered_count(),
                self.frontier.queue_len(),
                rate
            );
        }
    }

    /// Number of documents discovered so far
    pub fn discovered_count(&self) -> usize {
        self.frontier.discovered_count()
    }

    /// Ends the session
    pub fn finish(self) -> (SessionOutcome, RateLimitedFetcher) {
        let outcome = SessionOutcome {
            robots: self.robots_txt,
            sections: self.sections,
            pages: self.pages,
            pages_visited: self.frontier.visited_count(),
            robots_skipped: self.frontier.excluded_count(),
            target_reached: self.frontier.target_reached(),
            documents: self.frontier.into_discovered(),
        };
        (outcome, self.fetcher)
    }
}

fn is_document_url(link: &str) -> bool {
    Url::parse(link)
        .map(|url| document_extension(&url).is_some())
        .unwrap_or(false)
}
