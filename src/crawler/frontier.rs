//! Crawl frontier and duplicate suppression
//!
//! This module tracks:
//! - Pages already visited and pages waiting in the FIFO queue
//! - Pages excluded by robots.txt
//! - The ordered set of discovered documents (first occurrence wins)
//! - The page cap and document target that end a crawl

use crate::crawler::extractor::DiscoveredDocument;
use std::collections::{HashSet, VecDeque};

/// Frontier state for one crawl session
#[derive(Debug)]
pub struct Frontier {
    page_cap: usize,
    target_documents: usize,
    queue: VecDeque<String>,
    queued: HashSet<String>,
    visited: HashSet<String>,
    excluded: HashSet<String>,
    discovered: Vec<DiscoveredDocument>,
    discovered_urls: HashSet<String>,
}

impl Frontier {
    /// Creates an empty frontier
    ///
    /// # Arguments
    ///
    /// * `page_cap` - Maximum number of pages visited in the session
    /// * `target_documents` - Discovery stops once this many documents are known
    pub fn new(page_cap: usize, target_documents: usize) -> Self {
        Self {
            page_cap,
            target_documents,
            queue: VecDeque::new(),
            queued: HashSet::new(),
            visited: HashSet::new(),
            excluded: HashSet::new(),
            discovered: Vec::new(),
            discovered_urls: HashSet::new(),
        }
    }

    /// Returns true if the URL has not been seen and the page cap allows another visit
    pub fn should_visit(&self, url: &str) -> bool {
        !self.visited.contains(url)
            && !self.excluded.contains(url)
            && self.visited.len() < self.page_cap
    }

    /// Marks a URL as visited
    ///
    /// Returns false if it was already visited.
    pub fn mark_visited(&mut self, url: &str) -> bool {
        self.queued.remove(url);
        self.visited.insert(url.to_string())
    }

    /// Marks a URL as never to be fetched (e.g. disallowed by robots.txt)
    ///
    /// Returns false if it was already excluded.
    pub fn exclude(&mut self, url: &str) -> bool {
        self.queued.remove(url);
        self.excluded.insert(url.to_string())
    }

    /// Adds a URL to the back of the queue
    ///
    /// Only accepted while `visited + queued` stays under the page cap, and
    /// never for URLs already visited, queued or excluded.
    pub fn enqueue(&mut self, url: &str) -> bool {
        if self.visited.contains(url) || self.queued.contains(url) || self.excluded.contains(url) {
            return false;
        }

        if self.visited.len() + self.queued.len() >= self.page_cap {
            return false;
        }

        self.queued.insert(url.to_string());
        self.queue.push_back(url.to_string());
        true
    }

    /// Pops the next queued URL
    pub fn next_url(&mut self) -> Option<String> {
        while let Some(url) = self.queue.pop_front() {
            // exclusion or a visit may have happened while it waited
            if self.queued.remove(&url) {
                return Some(url);
            }
        }
        None
    }

    /// Records discovered documents; URLs already known keep their first record
    ///
    /// # Returns
    ///
    /// The newly recorded documents, in input order
    pub fn record_documents<I>(&mut self, documents: I) -> Vec<DiscoveredDocument>
    where
        I: IntoIterator<Item = DiscoveredDocument>,
    {
        let mut added = Vec::new();
        for document in documents {
            if self.discovered_urls.insert(document.url.clone()) {
                self.discovered.push(document.clone());
                added.push(document);
            }
        }
        added
    }

    /// Returns true once the document target is met
    pub fn target_reached(&self) -> bool {
        self.discovered.len() >= self.target_documents
    }

    /// Returns true once the page cap is used up
    pub fn cap_reached(&self) -> bool {
        self.visited.len() >= self.page_cap
    }

    /// Returns true when nothing is left to do
    pub fn is_exhausted(&self) -> bool {
        self.queued.is_empty() || self.target_reached() || self.cap_reached()
    }

    pub fn is_visited(&self, url: &str) -> bool {
        self.visited.contains(url)
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    pub fn excluded_count(&self) -> usize {
        self.excluded.len()
    }

    pub fn queue_len(&self) -> usize {
        self.queued.len()
    }

    pub fn discovered(&self) -> &[DiscoveredDocument] {
        &self.discovered
    }

    pub fn discovered_count(&self) -> usize {
        self.discovered.len()
    }

    /// Consumes the frontier, returning the discovered documents in discovery order
    pub fn into_discovered(self) -> Vec<DiscoveredDocument> {
        self.discovered
    }
}
