//! Configuration module for docharvest
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use docharvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("docharvest.toml")).unwrap();
//! println!("Crawling {} with a {}ms delay", config.crawler.base_url, config.crawler.request_delay_ms);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    delay_presets, Config, CrawlerConfig, OutputConfig, SearchConfig, UserAgentConfig,
    DEFAULT_LINK_KEYWORDS, DEFAULT_SECTIONS,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config, API_KEY_ENV};
