//! docharvest: a polite document harvester with dual-backend search
//!
//! This crate crawls a portal for downloadable documents, materializes them
//! into a SQLite document store, mirrors them into an Elasticsearch index and
//! serves searches that fall back from the index to the store.

pub mod api;
pub mod config;
pub mod crawler;
pub mod document;
pub mod index;
pub mod materializer;
pub mod report;
pub mod robots;
pub mod search;
pub mod storage;

use thiserror::Error;

/// Main error type for docharvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] crawler::FetchError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Search index error: {0}")]
    Index(#[from] index::IndexError),

    #[error("Search error: {0}")]
    Search(#[from] search::SearchError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Report serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for docharvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use document::{Category, Document, DocumentStatus};
pub use search::{SearchQuery, SearchResult, SearchService};
