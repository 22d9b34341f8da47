//! Rate-limited HTTP fetcher
//!
//! This module handles all outbound HTTP requests for the crawler:
//! - Building the HTTP client with the identification user agent
//! - Enforcing a minimum delay between consecutive requests
//! - Retrying transient failures (timeouts, connection errors, 429 and
//!   selected 5xx) with exponential backoff
//! - Streaming document downloads to disk
//! - Retrieving robots.txt

use crate::config::{CrawlerConfig, UserAgentConfig};
use crate::robots::RobotsTxt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::{Client, Response, StatusCode};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::time::Instant;
use url::Url;

const PAGE_TIMEOUT: Duration = Duration::from_secs(10);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

const ACCEPT_VALUE: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const ACCEPT_LANGUAGE_VALUE: &str = "es-ES,es;q=0.9,en;q=0.8";

/// Statuses that are retried before giving up
const RETRYABLE_STATUSES: [StatusCode; 5] = [
    StatusCode::TOO_MANY_REQUESTS,
    StatusCode::INTERNAL_SERVER_ERROR,
    StatusCode::BAD_GATEWAY,
    StatusCode::SERVICE_UNAVAILABLE,
    StatusCode::GATEWAY_TIMEOUT,
];

/// Fetch-specific errors
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {status} for {url}")]
    Http { url: String, status: u16 },

    #[error("Request to {url} timed out")]
    Timeout { url: String },

    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Failed to write download: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl FetchError {
    fn from_reqwest(url: &str, error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
            }
        } else {
            Self::Request {
                url: url.to_string(),
                source: error,
            }
        }
    }
}

/// A successfully fetched HTML page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub url: String,

    /// HTTP status code
    pub status_code: u16,

    /// Page body content
    pub body: String,
}

/// Builds an HTTP client with the crawler's identification headers
///
/// # Arguments
///
/// * `config` - The user agent configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_VALUE));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(ACCEPT_LANGUAGE_VALUE));

    Client::builder()
        .user_agent(config.header_value())
        .default_headers(headers)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// HTTP fetcher that keeps a minimum delay between requests
///
/// Every method takes `&mut self`; the last-request clock belongs to one
/// fetcher and one crawl task.
pub struct RateLimitedFetcher {
    client: Client,
    delay: Duration,
    max_retries: u32,
    retry_backoff: Duration,
    last_request: Option<Instant>,
}

impl RateLimitedFetcher {
    /// Creates a fetcher from the crawler and user agent configuration
    pub fn new(crawler: &CrawlerConfig, user_agent: &UserAgentConfig) -> Result<Self, FetchError> {
        let client = build_http_client(user_agent).map_err(FetchError::Client)?;
        Ok(Self::with_client(
            client,
            Duration::from_millis(crawler.request_delay_ms),
            crawler.max_retries,
            Duration::from_millis(crawler.retry_backoff_ms),
        ))
    }

    /// Creates a fetcher around an existing client
    pub fn with_client(
        client: Client,
        delay: Duration,
        max_retries: u32,
        retry_backoff: Duration,
    ) -> Self {
        Self {
            client,
            delay,
            max_retries,
            retry_backoff,
            last_request: None,
        }
    }

    /// Current minimum delay between requests
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Replaces the minimum delay between requests
    pub fn set_delay(&mut self, delay: Duration) {
        self.delay = delay;
    }

    /// Sleeps until the configured delay has passed since the last request
    async fn wait_for_slot(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.delay {
                tokio::time::sleep(self.delay - elapsed).await;
            }
        }
    }

    /// Sends a GET request, retrying transient failures with exponential backoff
    ///
    /// Timeouts, connection errors and retryable statuses are retried up to
    /// `max_retries` times. The delay is honored before every attempt,
    /// retries included.
    async fn get_with_retry(&mut self, url: &str, timeout: Duration) -> Result<Response, FetchError> {
        let mut attempt: u32 = 0;

        loop {
            self.wait_for_slot().await;
            let result = self.client.get(url).timeout(timeout).send().await;
            self.last_request = Some(Instant::now());

            let error = match result {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let status = response.status();
                    let error = FetchError::Http {
                        url: url.to_string(),
                        status: status.as_u16(),
                    };
                    if !RETRYABLE_STATUSES.contains(&status) {
                        return Err(error);
                    }
                    error
                }
                Err(e) => {
                    let transient = e.is_timeout() || e.is_connect() || e.is_request();
                    let error = FetchError::from_reqwest(url, e);
                    if !transient {
                        return Err(error);
                    }
                    error
                }
            };

            if attempt >= self.max_retries {
                return Err(error);
            }

            let backoff = self.retry_backoff * 2u32.saturating_pow(attempt);
            tracing::debug!(
                "{}, retrying in {:?} (attempt {}/{})",
                error,
                backoff,
                attempt + 1,
                self.max_retries
            );
            tokio::time::sleep(backoff).await;
            attempt += 1;
        }
    }

    /// Fetches an HTML page
    ///
    /// # Arguments
    ///
    /// * `url` - The URL to fetch
    ///
    /// # Returns
    ///
    /// * `Some(FetchedPage)` - The page body
    /// * `None` - The request failed; the reason has been logged
    pub async fn fetch_page(&mut self, url: &str) -> Option<FetchedPage> {
        tracing::info!("Fetching: {}", url);

        let response = match self.get_with_retry(url, PAGE_TIMEOUT).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("{}", e);
                return None;
            }
        };

        let final_url = response.url().to_string();
        let status_code = response.status().as_u16();

        match response.text().await {
            Ok(body) => Some(FetchedPage {
                url: final_url,
                status_code,
                body,
            }),
            Err(e) => {
                tracing::error!("Failed to read body of {}: {}", url, e);
                None
            }
        }
    }

    /// Downloads a resource to `dest`, streaming the body in chunks
    ///
    /// # Returns
    ///
    /// * `Ok(u64)` - Size of the written file, read back from the file system
    /// * `Err(FetchError)` - Network, HTTP or write failure; no partial file is left behind
    pub async fn download(&mut self, url: &str, dest: &Path) -> Result<u64, FetchError> {
        tracing::info!("Downloading: {}", url);

        let mut response = self.get_with_retry(url, DOWNLOAD_TIMEOUT).await?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let written = stream_to_file(&mut response, url, dest).await;
        if let Err(e) = written {
            let _ = tokio::fs::remove_file(dest).await;
            return Err(e);
        }

        let size = tokio::fs::metadata(dest).await?.len();
        tracing::debug!("Saved {} ({} bytes)", dest.display(), size);
        Ok(size)
    }

    /// Retrieves `/robots.txt` for a site
    ///
    /// The fetcher only reports what it found; enforcement is the caller's job.
    pub async fn check_robots_txt(&mut self, base_url: &str) -> RobotsTxt {
        let robots_url = match Url::parse(base_url).and_then(|u| u.join("/robots.txt")) {
            Ok(url) => url,
            Err(e) => return RobotsTxt::Unavailable(format!("Error accessing robots.txt: {}", e)),
        };

        self.wait_for_slot().await;
        let result = self
            .client
            .get(robots_url.as_str())
            .timeout(PAGE_TIMEOUT)
            .send()
            .await;
        self.last_request = Some(Instant::now());

        match result {
            Ok(response) if response.status() == StatusCode::OK => match response.text().await {
                Ok(body) => RobotsTxt::Found(body),
                Err(e) => RobotsTxt::Unavailable(format!("Error accessing robots.txt: {}", e)),
            },
            Ok(response) => {
                let status = response.status().as_u16();
                tracing::warn!("robots.txt not found at {} (Status: {})", base_url, status);
                RobotsTxt::Unavailable(format!("robots.txt not found (Status: {})", status))
            }
            Err(e) => {
                tracing::error!("Error accessing robots.txt: {}", e);
                RobotsTxt::Unavailable(format!("Error accessing robots.txt: {}", e))
            }
        }
    }
}

async fn stream_to_file(response: &mut Response, url: &str, dest: &Path) -> Result<(), FetchError> {
    let mut file = tokio::fs::File::create(dest).await?;

    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| FetchError::from_reqwest(url, e))?
    {
        file.write_all(&chunk).await?;
    }

    file.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_test_config() -> UserAgentConfig {
        UserAgentConfig {
            name: "TestHarvester".to_string(),
            purpose: Some("Testing".to_string()),
            contact_email: None,
        }
    }

    fn test_fetcher(delay_ms: u64) -> RateLimitedFetcher {
        let client = build_http_client(&create_test_config()).unwrap();
        RateLimitedFetcher::with_client(
            client,
            Duration::from_millis(delay_ms),
            2,
            Duration::from_millis(10),
        )
    }

    #[test]
    fn test_build_http_client() {
        assert!(build_http_client(&create_test_config()).is_ok());
    }

    #[tokio::test]
    async fn test_fetch_page_sends_identification() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let mut fetcher = test_fetcher(100);
        let page = fetcher.fetch_page(&format!("{}/page", server.uri())).await;
        assert!(page.is_some());

        let requests = server.received_requests().await.unwrap();
        let headers = &requests[0].headers;
        assert_eq!(
            headers.get("user-agent").unwrap().to_str().unwrap(),
            "TestHarvester (Testing)"
        );
        assert!(headers.get("accept-language").is_some());
    }

    #[tokio::test]
    async fn test_fetch_page_not_found_returns_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let mut fetcher = test_fetcher(100);
        assert!(fetcher
            .fetch_page(&format!("{}/missing", server.uri()))
            .await
            .is_none());
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_retryable_status_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/busy"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let mut fetcher = test_fetcher(100);
        assert!(fetcher
            .fetch_page(&format!("{}/busy", server.uri()))
            .await
            .is_none());

        // one attempt plus two retries
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_dropped_connections_are_retried() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = accepted.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                drop(stream);
            }
        });

        let mut fetcher = test_fetcher(10);
        let page = fetcher.fetch_page(&format!("http://{}/page", addr)).await;

        assert!(page.is_none());
        assert_eq!(accepted.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_refused_connection_fails_after_retries() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut fetcher = test_fetcher(0);
        let start = Instant::now();
        let result = fetcher.get_with_retry(&format!("http://{}/", addr), PAGE_TIMEOUT).await;

        assert!(matches!(result, Err(FetchError::Request { .. })));
        // backoff of 10ms then 20ms before the final attempt
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn test_delay_between_requests() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let mut fetcher = test_fetcher(200);
        let start = std::time::Instant::now();
        fetcher.fetch_page(&format!("{}/a", server.uri())).await;
        fetcher.fetch_page(&format!("{}/b", server.uri())).await;

        assert!(start.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_download_reports_file_size() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/doc.pdf"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 20_000]))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("nested").join("doc.pdf");

        let mut fetcher = test_fetcher(100);
        let size = fetcher
            .download(&format!("{}/doc.pdf", server.uri()), &dest)
            .await
            .unwrap();

        assert_eq!(size, 20_000);
        assert_eq!(std::fs::metadata(&dest).unwrap().len(), 20_000);
    }

    #[tokio::test]
    async fn test_download_failure_leaves_no_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gone.pdf"))
            .respond_with(ResponseTemplate::new(410))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("gone.pdf");

        let mut fetcher = test_fetcher(100);
        let result = fetcher
            .download(&format!("{}/gone.pdf", server.uri()), &dest)
            .await;

        assert!(matches!(result, Err(FetchError::Http { status: 410, .. })));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_check_robots_txt() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /admin"))
            .mount(&server)
            .await;

        let mut fetcher = test_fetcher(100);
        let robots = fetcher.check_robots_txt(&server.uri()).await;
        assert_eq!(
            robots,
            RobotsTxt::Found("User-agent: *\nDisallow: /admin".to_string())
        );
    }

    #[tokio::test]
    async fn test_check_robots_txt_missing() {
        let server = MockServer::start().await;

        let mut fetcher = test_fetcher(100);
        let robots = fetcher.check_robots_txt(&server.uri()).await;
        assert_eq!(
            robots,
            RobotsTxt::Unavailable("robots.txt not found (Status: 404)".to_string())
        );
    }
}
