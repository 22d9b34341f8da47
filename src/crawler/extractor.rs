//! HTML extraction for crawled pages
//!
//! This module pulls out of a fetched page:
//! - Text blocks (paragraphs and headings, or a caller-supplied selector)
//! - Links to follow, optionally restricted to the crawl origin
//! - Table contents
//! - Links to downloadable documents
//! - The page title
//!
//! Extraction never fails: anything unparseable yields an empty collection.

use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use std::collections::HashSet;
use url::Url;

/// File extensions treated as downloadable documents
pub const DOCUMENT_EXTENSIONS: &[&str] = &["pdf", "docx", "doc", "xlsx", "xls", "zip", "rar"];

const DEFAULT_TEXT_SELECTOR: &str = "p, h1, h2, h3, h4, h5, h6";
const UNTITLED: &str = "Untitled";

/// A document link found while crawling
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscoveredDocument {
    /// Absolute document URL (dedup key)
    pub url: String,

    /// Anchor text, or "Untitled"
    pub title: String,

    /// Upper-cased extension label
    pub file_type: String,

    /// Page the link was found on
    pub found_on: String,

    pub discovered_at: DateTime<Utc>,
}

/// Everything extracted from one visited page
#[derive(Debug, Clone, Serialize)]
pub struct PageVisit {
    pub url: String,
    pub title: String,
    pub texts: Vec<String>,
    pub links: Vec<String>,
    pub tables: Vec<Vec<Vec<String>>>,
    pub documents: Vec<DiscoveredDocument>,
    pub visited_at: DateTime<Utc>,
}

impl PageVisit {
    /// Parses a page body and runs every extractor over it
    ///
    /// # Arguments
    ///
    /// * `page_url` - URL the body was served from; relative links resolve against it
    /// * `body` - Raw HTML
    /// * `crawl_base` - When set, only links sharing this origin are kept
    pub fn extract(page_url: &str, body: &str, crawl_base: Option<&Url>) -> Self {
        let visited_at = Utc::now();
        let Ok(base) = Url::parse(page_url) else {
            tracing::debug!("Unparseable page URL {}, nothing extracted", page_url);
            return Self::empty(page_url, visited_at);
        };

        let document = Html::parse_document(body);

        Self {
            url: page_url.to_string(),
            title: extract_title(&document),
            texts: extract_texts(&document, None),
            links: extract_links(&document, &base, crawl_base),
            tables: extract_tables(&document),
            documents: extract_document_links(&document, &base),
            visited_at,
        }
    }

    fn empty(page_url: &str, visited_at: DateTime<Utc>) -> Self {
        Self {
            url: page_url.to_string(),
            title: UNTITLED.to_string(),
            texts: Vec::new(),
            links: Vec::new(),
            tables: Vec::new(),
            documents: Vec::new(),
            visited_at,
        }
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Extracts non-empty text blocks
///
/// With no selector, paragraphs and headings are used. An invalid selector
/// yields nothing.
pub fn extract_texts(document: &Html, selector: Option<&str>) -> Vec<String> {
    let Ok(selector) = Selector::parse(selector.unwrap_or(DEFAULT_TEXT_SELECTOR)) else {
        tracing::debug!("Invalid text selector {:?}", selector);
        return Vec::new();
    };

    document
        .select(&selector)
        .map(element_text)
        .filter(|text| !text.is_empty())
        .collect()
}

/// Extracts the unique absolute links of a page, in document order
///
/// # Arguments
///
/// * `document` - The parsed page
/// * `page_url` - The page URL for resolving relative links
/// * `same_origin_as` - When set, drop links whose origin differs from this URL's
pub fn extract_links(document: &Html, page_url: &Url, same_origin_as: Option<&Url>) -> Vec<String> {
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let origin = same_origin_as.map(|u| u.origin().ascii_serialization());
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(&selector) {
        let Some(resolved) = element.value().attr("href").and_then(|h| resolve_link(h, page_url))
        else {
            continue;
        };

        if let Some(origin) = &origin {
            if &resolved.origin().ascii_serialization() != origin {
                continue;
            }
        }

        let resolved = resolved.to_string();
        if seen.insert(resolved.clone()) {
            links.push(resolved);
        }
    }

    links
}

/// Extracts tables as rows of cell texts
///
/// Rows without cells and tables without rows are skipped.
pub fn extract_tables(document: &Html) -> Vec<Vec<Vec<String>>> {
    let (Ok(table_sel), Ok(row_sel), Ok(cell_sel)) = (
        Selector::parse("table"),
        Selector::parse("tr"),
        Selector::parse("td, th"),
    ) else {
        return Vec::new();
    };

    document
        .select(&table_sel)
        .map(|table| {
            table
                .select(&row_sel)
                .map(|row| row.select(&cell_sel).map(element_text).collect::<Vec<_>>())
                .filter(|cells| !cells.is_empty())
                .collect::<Vec<_>>()
        })
        .filter(|rows| !rows.is_empty())
        .collect()
}

/// Extracts anchors pointing at downloadable documents
pub fn extract_document_links(document: &Html, page_url: &Url) -> Vec<DiscoveredDocument> {
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    let discovered_at = Utc::now();

    document
        .select(&selector)
        .filter_map(|element| {
            let url = resolve_link(element.value().attr("href")?, page_url)?;
            let extension = document_extension(&url)?;
            let text = element_text(element);

            Some(DiscoveredDocument {
                url: url.to_string(),
                title: if text.is_empty() {
                    UNTITLED.to_string()
                } else {
                    text
                },
                file_type: extension.to_uppercase(),
                found_on: page_url.to_string(),
                discovered_at,
            })
        })
        .collect()
}

/// Extracts the page title, or "Untitled"
pub fn extract_title(document: &Html) -> String {
    Selector::parse("title")
        .ok()
        .and_then(|selector| document.select(&selector).next().map(element_text))
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| UNTITLED.to_string())
}

/// Returns the lower-cased document extension of a URL path, if it has one
pub fn document_extension(url: &Url) -> Option<String> {
    let path = url.path().to_lowercase();
    DOCUMENT_EXTENSIONS
        .iter()
        .find(|ext| path.ends_with(&format!(".{}", ext)))
        .map(|ext| ext.to_string())
}

/// Resolves an href to an absolute http(s) URL without fragment
///
/// Returns None for `javascript:`, `mailto:`, `tel:` and `data:` links,
/// same-page anchors, and anything that does not resolve.
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lowered.starts_with(scheme))
    {
        return None;
    }

    let mut url = base_url.join(href).ok()?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }
    url.set_fragment(None);
    Some(url)
}
