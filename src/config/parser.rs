use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Environment variable that overrides `search.api-key`
pub const API_KEY_ENV: &str = "ELASTIC_API_KEY";

/// Loads and parses a configuration file from the given path
///
/// The Elasticsearch API key may be supplied through `ELASTIC_API_KEY`
/// instead of the file; the environment wins when both are set.
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use docharvest::config::load_config;
///
/// let config = load_config(Path::new("docharvest.toml")).unwrap();
/// println!("Target: {} documents", config.crawler.target_documents);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut config = parse_config(&content)?;

    if let Ok(key) = std::env::var(API_KEY_ENV) {
        if !key.trim().is_empty() {
            config.search.api_key = key;
        }
    }

    Ok(config)
}

/// Parses and validates configuration text
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Recorded in crawl reports so runs can be traced to the settings they used.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&content);
    Ok(hex::encode(hasher.finalize()))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    const MINIMAL: &str = r#"
[crawler]
base-url = "https://www.procuraduria.gov.co"

[user-agent]
name = "Universidad Central - Proyecto Big Data"
purpose = "Investigación Académica"

[output]
database-path = "./test.db"
download-dir = "./uploads/documentos"
report-dir = "./uploads"
"#;

    #[test]
    fn test_load_minimal_config_applies_defaults() {
        let file = create_temp_config(MINIMAL);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.crawler.target_documents, 100);
        assert_eq!(config.crawler.request_delay_ms, 2_000);
        assert_eq!(config.crawler.child_links_per_page, 5);
        assert_eq!(config.crawler.sections.len(), 17);
        assert_eq!(config.crawler.link_keywords[0], "normativ");
        assert_eq!(config.search.index_name, "procuraduria_documentos");
        assert_eq!(
            config.output.source_label,
            "Procuraduría General de la Nación"
        );
    }

    #[test]
    fn test_load_full_config() {
        let content = r#"
[crawler]
base-url = "https://portal.example.gov"
sections = ["/docs", "/normas"]
target-documents = 20
max-pages = 15
request-delay-ms = 3000
max-retries = 2
retry-backoff-ms = 500
child-links-per-page = 3
link-keywords = ["docs"]
max-downloads = 4

[user-agent]
name = "TestHarvester"

[output]
database-path = "./test.db"
download-dir = "./dl"
report-dir = "./reports"
source-label = "Example Portal"

[search]
elasticsearch-url = "http://localhost:9200"
api-key = "secret"
index-name = "docs"
request-timeout-ms = 1000
engine-deadline-ms = 1500
suggestion-limit = 5
aggregation-size = 3
"#;
        let config = parse_config(content).unwrap();

        assert_eq!(config.crawler.sections, vec!["/docs", "/normas"]);
        assert_eq!(config.crawler.max_pages, 15);
        assert_eq!(config.crawler.max_downloads, 4);
        assert!(config.search.engine_enabled());
        assert_eq!(config.search.aggregation_size, 3);
        assert_eq!(config.output.source_label, "Example Portal");
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        let result = load_config(file.path());
        assert!(matches!(result.unwrap_err(), ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let content = MINIMAL.replace(
            "base-url = \"https://www.procuraduria.gov.co\"",
            "base-url = \"https://www.procuraduria.gov.co\"\nrequest-delay-ms = 10",
        );
        let result = parse_config(&content);
        assert!(matches!(result.unwrap_err(), ConfigError::Validation(_)));
    }

    #[test]
    fn test_compute_config_hash() {
        let file = create_temp_config("test content");

        let hash1 = compute_config_hash(file.path()).unwrap();
        let hash2 = compute_config_hash(file.path()).unwrap();

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_different_content_different_hash() {
        let file1 = create_temp_config("content 1");
        let file2 = create_temp_config("content 2");

        let hash1 = compute_config_hash(file1.path()).unwrap();
        let hash2 = compute_config_hash(file2.path()).unwrap();

        assert_ne!(hash1, hash2);
    }
}
