//! Storage traits and error types
//!
//! This module defines the trait interface for document store backends and
//! associated error types.

use crate::document::Document;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Document not found: {0}")]
    DocumentNotFound(i64),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Result ordering accepted by searches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortOrder {
    /// Engine score; the store has none and falls back to newest first
    #[default]
    #[serde(rename = "relevancia")]
    Relevance,

    #[serde(rename = "fecha_desc")]
    DateDesc,

    #[serde(rename = "fecha_asc")]
    DateAsc,

    #[serde(rename = "titulo")]
    Title,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Relevance => "relevancia",
            Self::DateDesc => "fecha_desc",
            Self::DateAsc => "fecha_asc",
            Self::Title => "titulo",
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "relevancia" => Ok(Self::Relevance),
            "fecha_desc" => Ok(Self::DateDesc),
            "fecha_asc" => Ok(Self::DateAsc),
            "titulo" => Ok(Self::Title),
            other => Err(format!(
                "unknown sort order '{}' (expected relevancia, fecha_desc, fecha_asc or titulo)",
                other
            )),
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Filter applied by store queries
///
/// Empty strings are treated like `None`.
#[derive(Debug, Clone, Default)]
pub struct DocumentFilter {
    /// Case-insensitive substring matched against title, text, type and category
    pub text: Option<String>,

    /// Exact category label
    pub category: Option<String>,

    /// Exact type label
    pub file_type: Option<String>,
}

impl DocumentFilter {
    /// Builds a filter, dropping blank fields
    pub fn new(text: &str, category: &str, file_type: &str) -> Self {
        fn non_blank(s: &str) -> Option<String> {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }

        Self {
            text: non_blank(text),
            category: non_blank(category),
            file_type: non_blank(file_type),
        }
    }
}

/// Per-category totals
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryStats {
    #[serde(rename = "nombre")]
    pub name: String,

    #[serde(rename = "cantidad")]
    pub count: u64,

    #[serde(rename = "tamano_total_mb")]
    pub size_mb: f64,
}

/// A named counter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountBucket {
    #[serde(rename = "nombre")]
    pub name: String,

    #[serde(rename = "cantidad")]
    pub count: u64,
}

/// Documents per year
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearCount {
    #[serde(rename = "año")]
    pub year: i32,

    #[serde(rename = "cantidad")]
    pub count: u64,
}

/// Store-side aggregates
#[derive(Debug, Clone, Serialize)]
pub struct StoreStatistics {
    #[serde(rename = "total_documentos")]
    pub total_documents: u64,

    #[serde(rename = "tamano_total_mb")]
    pub total_size_mb: f64,

    /// Sorted by count, descending
    #[serde(rename = "categorias")]
    pub categories: Vec<CategoryStats>,

    /// Sorted by count, descending
    #[serde(rename = "tipos")]
    pub types: Vec<CountBucket>,

    /// Sorted by year, descending; documents without a year are left out
    #[serde(rename = "años")]
    pub years: Vec<YearCount>,

    /// Most recently downloaded documents
    #[serde(rename = "recientes")]
    pub recent: Vec<Document>,
}

/// Trait for document store implementations
///
/// The store is the system of record: it decides which documents exist.
pub trait DocumentStore {
    /// Inserts a new document
    ///
    /// Fails with `ConstraintViolation` if the identifier is taken and with
    /// `InvalidDocument` if the record breaks a document invariant.
    fn insert_document(&mut self, document: &Document) -> StorageResult<()>;

    /// Inserts or replaces a document by identifier
    fn upsert_document(&mut self, document: &Document) -> StorageResult<()>;

    /// Gets a document by identifier
    fn get_document(&self, id: i64) -> StorageResult<Option<Document>>;

    /// Returns a page of documents matching the filter
    ///
    /// # Arguments
    ///
    /// * `filter` - Text/category/type filter
    /// * `sort` - Ordering; `Relevance` is served as newest first
    /// * `skip` - Number of matches to skip
    /// * `limit` - Maximum number of documents returned
    fn query_documents(
        &self,
        filter: &DocumentFilter,
        sort: SortOrder,
        skip: usize,
        limit: usize,
    ) -> StorageResult<Vec<Document>>;

    /// Counts documents matching the filter
    fn count_documents(&self, filter: &DocumentFilter) -> StorageResult<u64>;

    /// Next free identifier (max + 1, or 1 for an empty store)
    fn next_id(&self) -> StorageResult<i64>;

    /// Replaces the extracted text of a document
    fn update_text(&mut self, id: i64, text: &str) -> StorageResult<()>;

    /// Computes the aggregates behind the statistics endpoint
    ///
    /// # Arguments
    ///
    /// * `recent_limit` - How many recent documents to include
    fn statistics(&self, recent_limit: usize) -> StorageResult<StoreStatistics>;

    /// Distinct titles containing `needle` (case-insensitive), at most `limit`
    fn scan_titles(&self, needle: &str, limit: usize) -> StorageResult<Vec<String>>;

    /// Documents whose text is shorter than `min_chars` characters
    fn documents_needing_text(&self, min_chars: usize) -> StorageResult<Vec<Document>>;

    /// Every document, in identifier order
    fn all_documents(&self) -> StorageResult<Vec<Document>>;
}
