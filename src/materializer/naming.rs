//! Local file naming for downloaded documents

use chrono::NaiveDateTime;

const MAX_TITLE_CHARS: usize = 50;

/// Reduces a title to a file-system friendly stem
///
/// Keeps the first 50 characters, turns path separators into underscores and
/// drops everything except alphanumerics, spaces, `-` and `_`.
pub fn sanitize_title(title: &str) -> String {
    title
        .chars()
        .take(MAX_TITLE_CHARS)
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Builds `{numero:03}_{stem}_{YYYYmmdd_HHMMSS}.{ext}`
///
/// # Arguments
///
/// * `numero` - Document identifier
/// * `title` - Anchor title; an empty stem falls back to `documento_{numero}`
/// * `extension` - File extension, without the dot
/// * `at` - Download time
pub fn local_file_name(numero: i64, title: &str, extension: &str, at: NaiveDateTime) -> String {
    let mut stem = sanitize_title(title);
    if stem.is_empty() {
        stem = format!("documento_{}", numero);
    }

    format!(
        "{:03}_{}_{}.{}",
        numero,
        stem,
        at.format("%Y%m%d_%H%M%S"),
        extension.to_lowercase()
    )
}
