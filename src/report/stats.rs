//! Console output for crawl reports and store statistics

use crate::report::CrawlReport;
use crate::storage::StoreStatistics;

/// Prints the end-of-run summary to stdout
///
/// # Arguments
///
/// * `report` - The finished run's report
pub fn print_crawl_summary(report: &CrawlReport) {
    let summary = &report.summary;
    let elapsed = report.finished_at - report.started_at;

    println!("=== Harvest Summary ===\n");

    println!("Crawl:");
    println!("  Base URL: {}", report.configuration.base_url);
    println!("  Pages visited: {}", summary.pages_visited);
    println!("  Pages skipped by robots.txt: {}", summary.robots_skipped);
    println!(
        "  Documents found: {} (target {}{})",
        summary.documents_found,
        report.configuration.target_documents,
        if summary.target_reached { ", reached" } else { "" }
    );
    println!("  Elapsed: {}s", elapsed.num_seconds());
    println!();

    if !summary.documents_by_type.is_empty() {
        println!("Documents by Type:");
        for (file_type, count) in &summary.documents_by_type {
            println!("  {}: {}", file_type, count);
        }
        println!();
    }

    if !report.sections.is_empty() {
        println!("Sections:");
        for section in &report.sections {
            println!("  {}: {} documents", section.section, section.documents_found);
        }
        println!();
    }

    println!("Downloads:");
    println!("  Downloaded: {}", summary.documents_downloaded);
    println!("  Download errors: {}", summary.download_errors);

    if !report.errors.is_empty() {
        println!();
        println!("Errors ({}):", report.errors.len());
        for error in &report.errors {
            println!("  #{} [{}] {}: {}", error.numero, error.stage, error.title, error.message);
        }
    }
}

/// Prints store statistics to stdout
pub fn print_statistics(stats: &StoreStatistics) {
    println!("=== Document Store Statistics ===\n");

    println!("Overview:");
    println!("  Total documents: {}", stats.total_documents);
    println!(
        "  Total size: {:.2} MB ({:.2} GB)",
        stats.total_size_mb,
        stats.total_size_mb / 1024.0
    );
    println!();

    println!("Categories:");
    for category in &stats.categories {
        let percentage = if stats.total_documents > 0 {
            (category.count as f64 / stats.total_documents as f64) * 100.0
        } else {
            0.0
        };
        println!(
            "  {}: {} ({:.1}%, {:.2} MB)",
            category.name, category.count, percentage, category.size_mb
        );
    }
    println!();

    println!("Types:");
    for bucket in &stats.types {
        println!("  {}: {}", bucket.name, bucket.count);
    }
    println!();

    if !stats.years.is_empty() {
        println!("Years:");
        for year in &stats.years {
            println!("  {}: {}", year.year, year.count);
        }
        println!();
    }

    println!("Most Recent:");
    for document in &stats.recent {
        println!(
            "  #{} {} ({}, {})",
            document.id,
            document.title,
            document.file_type,
            document.downloaded_at_string()
        );
    }
}
