//! docharvest main entry point
//!
//! This is the command-line interface for crawling, materializing and
//! searching the document collection.

use anyhow::Context;
use chrono::Local;
use clap::Parser;
use docharvest::api::{self, ApiResponse, SearchRequest};
use docharvest::config::{load_config_with_hash, Config};
use docharvest::crawler::{crawl, RateLimitedFetcher};
use docharvest::index::ElasticIndex;
use docharvest::materializer::{download_limit, Materializer};
use docharvest::report::{print_crawl_summary, print_statistics, CrawlReport};
use docharvest::search::SearchService;
use docharvest::storage::{lock, open_store, shared, SharedStore};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// docharvest: a polite document harvester
///
/// Crawls a government portal for downloadable documents, stores them with
/// extracted text, and searches them through Elasticsearch with a SQLite
/// fallback.
#[derive(Parser, Debug)]
#[command(name = "docharvest")]
#[command(version = "1.0.0")]
#[command(about = "A polite document harvester with dual-backend search", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and check robots.txt without crawling
    #[arg(long, group = "mode")]
    dry_run: bool,

    /// Crawl and report without downloading
    #[arg(long, group = "mode")]
    crawl_only: bool,

    /// Extract text for stored documents that have little or none
    #[arg(long, group = "mode")]
    extract_text: bool,

    /// Write every stored document into the search index
    #[arg(long, group = "mode")]
    reindex: bool,

    /// Show document store statistics and exit
    #[arg(long, group = "mode")]
    stats: bool,

    /// Search the collection
    #[arg(long, value_name = "QUERY", group = "mode")]
    search: Option<String>,

    /// Category filter for --search
    #[arg(long, requires = "search")]
    categoria: Option<String>,

    /// Type filter for --search (e.g. PDF)
    #[arg(long, requires = "search")]
    tipo: Option<String>,

    /// Result page for --search
    #[arg(long, requires = "search")]
    pagina: Option<String>,

    /// Results per page for --search
    #[arg(long, requires = "search")]
    por_pagina: Option<String>,

    /// Ordering for --search: relevancia, fecha_desc, fecha_asc or titulo
    #[arg(long, requires = "search")]
    orden: Option<String>,

    /// Include category/type/year buckets with --search
    #[arg(long, requires = "search")]
    aggregations: bool,

    /// Suggest titles for a prefix
    #[arg(long, value_name = "PREFIX", group = "mode")]
    suggest: Option<String>,

    /// Show one document by number
    #[arg(long, value_name = "NUMERO", group = "mode")]
    document: Option<i64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.dry_run {
        handle_dry_run(&config).await?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else if cli.extract_text {
        handle_extract_text(&config).await?;
    } else if cli.reindex {
        handle_reindex(&config).await?;
    } else if let Some(query) = &cli.search {
        let request = SearchRequest {
            query: query.clone(),
            categoria: cli.categoria.clone().unwrap_or_default(),
            tipo: cli.tipo.clone().unwrap_or_default(),
            pagina: cli.pagina.clone(),
            por_pagina: cli.por_pagina.clone(),
            orden: cli.orden.clone(),
        };
        let service = open_search_service(&config).await?;
        print_response(&api::search(&service, &request, cli.aggregations).await)?;
    } else if let Some(prefix) = &cli.suggest {
        let service = open_search_service(&config).await?;
        print_response(&api::suggestions(&service, prefix, None).await)?;
    } else if let Some(numero) = cli.document {
        let service = open_search_service(&config).await?;
        print_response(&api::document_detail(&service, numero))?;
    } else {
        handle_harvest(&config, &config_hash, cli.crawl_only).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("docharvest=info,warn"),
            1 => EnvFilter::new("docharvest=debug,info"),
            2 => EnvFilter::new("docharvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn open_shared_store(config: &Config) -> anyhow::Result<SharedStore> {
    let path = Path::new(&config.output.database_path);
    let store = open_store(path)
        .with_context(|| format!("opening document store {}", path.display()))?;
    Ok(shared(store))
}

/// Builds the index client and checks that it answers
///
/// An unreachable engine is kept: searches fall back per request.
async fn open_index(config: &Config) -> anyhow::Result<Option<ElasticIndex>> {
    let Some(index) = ElasticIndex::from_config(&config.search)? else {
        tracing::info!("No search index configured; using the document store only");
        return Ok(None);
    };

    if index.ping().await {
        tracing::info!("Connected to search index '{}'", index.index_name());
    } else {
        tracing::warn!(
            "Search index at {} is not answering",
            config.search.elasticsearch_url
        );
    }

    Ok(Some(index))
}

async fn open_search_service(config: &Config) -> anyhow::Result<SearchService> {
    let store = open_shared_store(config)?;
    let index = open_index(config).await?;
    Ok(SearchService::new(store, index, &config.search))
}

fn print_response(response: &ApiResponse) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(&response.body)?);
    if !response.is_success() {
        anyhow::bail!("request failed with status {}", response.status);
    }
    Ok(())
}

/// Handles the --dry-run mode: validates config and checks robots.txt
async fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    println!("=== docharvest Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Base URL: {}", config.crawler.base_url);
    println!("  Target documents: {}", config.crawler.target_documents);
    println!("  Max pages: {}", config.crawler.max_pages);
    println!("  Request delay: {}ms", config.crawler.request_delay_ms);
    println!("  Max retries: {}", config.crawler.max_retries);
    println!("  Sections ({}):", config.crawler.sections.len());
    for section in &config.crawler.sections {
        println!("    * {}", section);
    }

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Downloads: {}", config.output.download_dir);
    println!("  Reports: {}", config.output.report_dir);

    println!("\nSearch:");
    if config.search.engine_enabled() {
        println!("  Elasticsearch: {}", config.search.elasticsearch_url);
        println!("  Index: {}", config.search.index_name);
    } else {
        println!("  Elasticsearch: disabled (document store only)");
    }

    let mut fetcher = RateLimitedFetcher::new(&config.crawler, &config.user_agent)?;
    let robots = fetcher.check_robots_txt(&config.crawler.base_url).await;
    println!("\nrobots.txt:");
    if robots.is_found() {
        for line in robots.as_text().lines().take(20) {
            println!("  {}", line);
        }
    } else {
        println!("  {}", robots);
    }

    println!("\n✓ Configuration is valid");
    Ok(())
}

/// Handles the --stats mode: shows statistics from the document store
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let store = open_shared_store(config)?;
    let stats = lock(&store)?.statistics(10)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --extract-text mode
async fn handle_extract_text(config: &Config) -> anyhow::Result<()> {
    let store = open_shared_store(config)?;
    let index = open_index(config).await?;
    let materializer = Materializer::from_config(config, store, index);
    let mut fetcher = RateLimitedFetcher::new(&config.crawler, &config.user_agent)?;

    let summary = materializer.reprocess_text(&mut fetcher).await?;
    println!(
        "✓ Processed {} documents: {} updated, {} failed",
        summary.processed, summary.updated, summary.failed
    );
    Ok(())
}

/// Handles the --reindex mode
async fn handle_reindex(config: &Config) -> anyhow::Result<()> {
    let store = open_shared_store(config)?;
    let index = open_index(config).await?;
    let materializer = Materializer::from_config(config, store, index);

    let indexed = materializer.reindex_all().await?;
    println!("✓ Indexed {} documents", indexed);
    Ok(())
}

/// Handles the default mode: crawl, download, store and report
async fn handle_harvest(config: &Config, config_hash: &str, crawl_only: bool) -> anyhow::Result<()> {
    let started_at = Local::now();
    tracing::info!(
        "Starting harvest of {} (target {} documents, at most {} pages)",
        config.crawler.base_url,
        config.crawler.target_documents,
        config.crawler.max_pages
    );

    let (outcome, mut fetcher) = crawl(config).await?;
    tracing::info!(
        "Crawl finished: {} pages visited, {} documents found",
        outcome.pages_visited,
        outcome.documents.len()
    );

    let batch = if crawl_only {
        None
    } else {
        let store = open_shared_store(config)?;
        let index = open_index(config).await?;
        if let Some(index) = &index {
            if let Err(e) = index.ensure_index().await {
                tracing::warn!("Could not prepare search index: {}", e);
            }
        }

        let limit = download_limit(&config.crawler, outcome.documents.len());
        let start = lock(&store)?.next_id()?;
        let materializer = Materializer::from_config(config, store, index);
        tracing::info!(
            "Downloading {} documents into {}",
            limit,
            materializer.download_dir().display()
        );

        Some(
            materializer
                .materialize_batch(&mut fetcher, &outcome.documents[..limit], start)
                .await,
        )
    };

    let report = CrawlReport::new(config, config_hash, started_at, &outcome, batch.as_ref());
    report.write_to(Path::new(&config.output.report_dir))?;
    print_crawl_summary(&report);

    Ok(())
}
