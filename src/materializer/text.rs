//! Text extraction from downloaded files
//!
//! PDF text comes from `pdf-extract`, one block per page. DOCX text is read
//! straight from `word/document.xml` inside the archive, one line per
//! paragraph. Other formats have no extractor.

use quick_xml::events::Event;
use quick_xml::Reader;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

/// Errors raised while extracting text
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("No text extractor for .{0} files")]
    Unsupported(String),

    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF extraction failed: {0}")]
    Pdf(String),

    #[error("Invalid DOCX archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Invalid DOCX markup: {0}")]
    Xml(String),
}

/// Extracts plain text from `path` based on its extension
pub fn extract_text(path: &Path, extension: &str) -> Result<String, ExtractError> {
    match extension.to_lowercase().as_str() {
        "pdf" => extract_pdf(path),
        "docx" => extract_docx(path),
        other => Err(ExtractError::Unsupported(other.to_string())),
    }
}

/// Like [`extract_text`], but logs failures and returns empty text instead
pub fn extract_text_or_empty(path: &Path, extension: &str) -> String {
    match extract_text(path, extension) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!("No text extracted from {}: {}", path.display(), e);
            String::new()
        }
    }
}

fn extract_pdf(path: &Path) -> Result<String, ExtractError> {
    let bytes = std::fs::read(path)?;

    // pdf-extract panics on some malformed inputs
    let extracted = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(&bytes))
        .map_err(|_| ExtractError::Pdf("extractor panicked".to_string()))?
        .map_err(|e| ExtractError::Pdf(e.to_string()))?;

    Ok(join_pages(&extracted))
}

/// Joins the non-empty pages of a form-feed separated dump with blank lines
fn join_pages(raw: &str) -> String {
    raw.split('\u{c}')
        .map(str::trim)
        .filter(|page| !page.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn extract_docx(path: &Path) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(File::open(path)?)?;
    let mut xml = String::new();
    archive.by_name("word/document.xml")?.read_to_string(&mut xml)?;

    docx_paragraphs(&xml).map(|paragraphs| paragraphs.join("\n"))
}

fn docx_paragraphs(xml: &str) -> Result<Vec<String>, ExtractError> {
    let mut reader = Reader::from_str(xml);
    let mut paragraphs = Vec::new();
    let mut current: Option<String> = None;
    let mut in_text_run = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"w:p" => current = Some(String::new()),
                b"w:t" => in_text_run = true,
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"w:p" => paragraphs.push(String::new()),
                b"w:tab" => current.get_or_insert_with(String::new).push('\t'),
                b"w:br" => current.get_or_insert_with(String::new).push('\n'),
                _ => {}
            },
            Ok(Event::Text(t)) if in_text_run => {
                let text = t.unescape().map_err(|e| ExtractError::Xml(e.to_string()))?;
                current.get_or_insert_with(String::new).push_str(&text);
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:t" => in_text_run = false,
                b"w:p" => paragraphs.extend(current.take()),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(ExtractError::Xml(e.to_string())),
        }
    }

    Ok(paragraphs)
}
