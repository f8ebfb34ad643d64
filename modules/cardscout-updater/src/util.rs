/// Truncate to at most `max_chars` characters, never splitting a char.
/// Content caps are counted in characters, not bytes, so multibyte pages
/// get the same budget as ASCII ones.
pub(crate) fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
