//! Small string helpers shared by the scraper and the search client.

/// Longest prefix of `s` holding at most `max_chars` characters.
///
/// Never splits a UTF-8 sequence.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
