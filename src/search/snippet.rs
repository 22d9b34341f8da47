//! Plain-text context snippets for store results

/// Characters of context returned around a match
pub const SNIPPET_CHARS: usize = 200;

fn fold(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

/// Returns about `max_chars` characters of `text` around the first
/// case-insensitive occurrence of `query`
///
/// Cut ends are marked with `...`. When the query does not occur, the start
/// of the text is returned instead.
pub fn make_snippet(text: &str, query: &str, max_chars: usize) -> String {
    let query = query.trim();
    if text.is_empty() || query.is_empty() {
        return String::new();
    }

    let chars: Vec<char> = text.chars().collect();
    let folded: Vec<char> = chars.iter().copied().map(fold).collect();
    let needle: Vec<char> = query.chars().map(fold).collect();

    let Some(start) = folded
        .windows(needle.len())
        .position(|window| window == needle.as_slice())
    else {
        if chars.len() > max_chars {
            return format!("{}...", chars[..max_chars].iter().collect::<String>());
        }
        return text.to_string();
    };

    let context = max_chars / 2;
    let from = start.saturating_sub(context);
    let to = (start + needle.len() + context).min(chars.len());

    let mut snippet: String = chars[from..to].iter().collect();
    if from > 0 {
        snippet.insert_str(0, "...");
    }
    if to < chars.len() {
        snippet.push_str("...");
    }

    snippet.trim().to_string()
}
