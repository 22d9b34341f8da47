use serde::Deserialize;

/// Main configuration structure for docharvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Portal root; section paths are appended to it
    pub base_url: String,

    /// Known section paths explored first, in order
    #[serde(default = "default_sections")]
    pub sections: Vec<String>,

    /// Stop once this many documents have been discovered
    #[serde(default = "default_target_documents")]
    pub target_documents: usize,

    /// Upper bound on pages fetched in one session
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// Minimum time between two requests (milliseconds)
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    /// Retries for 429/5xx responses
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base of the exponential retry backoff (milliseconds)
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Child links followed per section page
    #[serde(default = "default_child_links_per_page")]
    pub child_links_per_page: usize,

    /// URL stems that make a child link worth following
    #[serde(default = "default_link_keywords")]
    pub link_keywords: Vec<String>,

    /// Documents to download per run (0 = min(found, target))
    #[serde(default)]
    pub max_downloads: usize,
}

/// Delay presets used by the different crawl flavours
pub mod delay_presets {
    /// Generic ethical scraping
    pub const ETHICAL_MS: u64 = 1_000;
    /// Section-driven document crawler
    pub const CRAWLER_MS: u64 = 2_000;
    /// Whole-site polite exploration
    pub const POLITE_MS: u64 = 3_000;
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UserAgentConfig {
    /// Who is crawling
    pub name: String,

    /// Why (shown in parentheses)
    #[serde(default)]
    pub purpose: Option<String>,

    /// Address for crawler-related contact
    #[serde(default)]
    pub contact_email: Option<String>,
}

impl UserAgentConfig {
    /// Formats the identification header value
    ///
    /// Format: `Name (Purpose; Email)`, omitting absent parts
    pub fn header_value(&self) -> String {
        let details: Vec<&str> = [self.purpose.as_deref(), self.contact_email.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .collect();

        if details.is_empty() {
            self.name.clone()
        } else {
            format!("{} ({})", self.name, details.join("; "))
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Path to the SQLite document store
    pub database_path: String,

    /// Directory downloaded documents are written to
    pub download_dir: String,

    /// Directory crawl reports are written to
    pub report_dir: String,

    /// Attribution stored on every document
    #[serde(default = "default_source_label")]
    pub source_label: String,
}

/// Search index configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SearchConfig {
    /// Elasticsearch endpoint; empty disables the primary engine
    #[serde(default)]
    pub elasticsearch_url: String,

    /// API key sent as `Authorization: ApiKey ...`
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_index_name")]
    pub index_name: String,

    /// Client-level timeout for each index request (milliseconds)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Deadline wrapping a whole primary-engine attempt (milliseconds)
    #[serde(default = "default_engine_deadline_ms")]
    pub engine_deadline_ms: u64,

    #[serde(default = "default_suggestion_limit")]
    pub suggestion_limit: usize,

    /// Buckets returned per aggregation
    #[serde(default = "default_aggregation_size")]
    pub aggregation_size: usize,
}

impl SearchConfig {
    /// Returns true if an Elasticsearch endpoint is configured
    pub fn engine_enabled(&self) -> bool {
        !self.elasticsearch_url.trim().is_empty()
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            elasticsearch_url: String::new(),
            api_key: String::new(),
            index_name: default_index_name(),
            request_timeout_ms: default_request_timeout_ms(),
            engine_deadline_ms: default_engine_deadline_ms(),
            suggestion_limit: default_suggestion_limit(),
            aggregation_size: default_aggregation_size(),
        }
    }
}

pub const DEFAULT_SECTIONS: &[&str] = &[
    "/portal/Normatividad.page",
    "/portal/Transparencia-y-acceso-a-informacion-publica.page",
    "/portal/Informes-de-Gestion.page",
    "/portal/Rendicion-de-cuentas.page",
    "/portal/Manuales-y-Procedimientos.page",
    "/portal/Publicaciones.page",
    "/portal/Resoluciones.page",
    "/portal/Circulares.page",
    "/portal/Conceptos.page",
    "/portal/Decretos.page",
    "/Lists/Normativa/AllItems.aspx",
    "/Lists/Manuales/AllItems.aspx",
    "/Lists/Publicaciones/AllItems.aspx",
    "/Lists/Resoluciones/AllItems.aspx",
    "/sitepages/resoluciones.aspx",
    "/sitepages/circulares.aspx",
    "/sitepages/normatividad.aspx",
];

pub const DEFAULT_LINK_KEYWORDS: &[&str] = &[
    "normativ",
    "manual",
    "documento",
    "resolucion",
    "circular",
    "concepto",
    "decreto",
    "informe",
    "publicacion",
    "transparencia",
    "gestion",
];

fn default_sections() -> Vec<String> {
    DEFAULT_SECTIONS.iter().map(|s| s.to_string()).collect()
}

fn default_link_keywords() -> Vec<String> {
    DEFAULT_LINK_KEYWORDS.iter().map(|s| s.to_string()).collect()
}

fn default_target_documents() -> usize {
    100
}

fn default_max_pages() -> usize {
    200
}

fn default_request_delay_ms() -> u64 {
    delay_presets::CRAWLER_MS
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    1_000
}

fn default_child_links_per_page() -> usize {
    5
}

fn default_source_label() -> String {
    "Procuraduría General de la Nación".to_string()
}

fn default_index_name() -> String {
    "procuraduria_documentos".to_string()
}

fn default_request_timeout_ms() -> u64 {
    5_000
}

fn default_engine_deadline_ms() -> u64 {
    8_000
}

fn default_suggestion_limit() -> usize {
    8
}

fn default_aggregation_size() -> usize {
    10
}
